//! # Token Gating Tests
//!
//! File delivery and auto-filter planning driven through the in-memory store
//! and a recording document sender.

use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use autofilter::bot::delivery::{
    deliver_file, find_alert, plan_auto_reply, AutoReply, DeliveryOutcome, DocumentSender,
    FileChoice,
};
use autofilter::filter_parser::{parse_alert_callback, parse_text_reply, ButtonAction};
use autofilter::db::{FilterRecord, FilterStore, MemoryStore, TokenLedger};
use autofilter::file_id::FileIdParts;
use autofilter::media::{save_file, IncomingMedia};

#[derive(Default)]
struct RecordingSender {
    fail: bool,
    sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl DocumentSender for RecordingSender {
    async fn send_cached_document(
        &self,
        user_id: i64,
        tg_file_id: &str,
        _caption: &str,
    ) -> Result<()> {
        if self.fail {
            bail!("Forbidden: bot can't initiate conversation with a user");
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id, tg_file_id.to_string()));
        Ok(())
    }
}

const USER: i64 = 4242;
const CHAT: i64 = -1001234;

async fn store_with_file(default_tokens: i64) -> Result<(MemoryStore, String, String)> {
    let store = MemoryStore::new(default_tokens);
    let tg_file_id = FileIdParts {
        file_type: 5,
        dc_id: 2,
        media_id: 123456789,
        access_hash: 987654321,
        file_reference: Vec::new(),
    }
    .encode();
    let outcome = save_file(
        &store,
        IncomingMedia {
            tg_file_id: tg_file_id.clone(),
            file_name: Some("Avatar.2009.mkv".to_string()),
            file_size: Some(2048),
            file_type: Some("document".to_string()),
            ..Default::default()
        },
    )
    .await?;
    let media_id = outcome.file_id().expect("file saved").to_string();
    Ok((store, media_id, tg_file_id))
}

fn filter(keyword: &str, reply_text: &str, file_id: Option<&str>) -> FilterRecord {
    FilterRecord {
        chat_id: CHAT,
        keyword: keyword.to_string(),
        reply_text: reply_text.to_string(),
        buttons: Vec::new(),
        alerts: Vec::new(),
        file_id: file_id.map(str::to_string),
    }
}

#[tokio::test]
async fn test_delivery_consumes_one_token() -> Result<()> {
    let (store, media_id, tg_file_id) = store_with_file(2).await?;
    let sender = RecordingSender::default();

    let outcome = deliver_file(&store, &store, &sender, USER, &media_id, "here").await?;
    assert_eq!(outcome, DeliveryOutcome::Sent);
    assert_eq!(store.get_tokens(USER).await?, 1);
    assert_eq!(*sender.sent.lock().unwrap(), vec![(USER, tg_file_id)]);
    Ok(())
}

#[tokio::test]
async fn test_delivery_without_tokens_is_refused() -> Result<()> {
    let (store, media_id, _) = store_with_file(0).await?;
    let sender = RecordingSender::default();

    let outcome = deliver_file(&store, &store, &sender, USER, &media_id, "here").await?;
    assert_eq!(outcome, DeliveryOutcome::NoTokens);
    assert!(sender.sent.lock().unwrap().is_empty());
    assert_eq!(store.get_tokens(USER).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_file_keeps_the_token() -> Result<()> {
    let (store, _, _) = store_with_file(1).await?;
    let sender = RecordingSender::default();

    let outcome = deliver_file(&store, &store, &sender, USER, "missing", "here").await?;
    assert_eq!(outcome, DeliveryOutcome::NotFound);
    assert_eq!(store.get_tokens(USER).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_delivery_refunds_the_token() -> Result<()> {
    let (store, media_id, _) = store_with_file(1).await?;
    let sender = RecordingSender {
        fail: true,
        ..Default::default()
    };

    let outcome = deliver_file(&store, &store, &sender, USER, &media_id, "here").await?;
    assert_eq!(outcome, DeliveryOutcome::Failed);
    assert_eq!(store.get_tokens(USER).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_deliveries_never_overspend() -> Result<()> {
    let (store, media_id, _) = store_with_file(3).await?;
    let sender = RecordingSender::default();

    let (store_ref, sender_ref, id) = (&store, &sender, media_id.as_str());
    let deliver = move || deliver_file(store_ref, store_ref, sender_ref, USER, id, "here");
    let (a, b, c, d, e) = tokio::join!(deliver(), deliver(), deliver(), deliver(), deliver());

    let sent = [a?, b?, c?, d?, e?]
        .iter()
        .filter(|o| **o == DeliveryOutcome::Sent)
        .count();
    assert_eq!(sent, 3);
    assert_eq!(sender.sent.lock().unwrap().len(), 3);
    assert_eq!(store.get_tokens(USER).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_auto_reply_requires_tokens() -> Result<()> {
    let (store, _, _) = store_with_file(0).await?;
    store.add_filter(&filter("avatar", "found it", None)).await?;

    let reply = plan_auto_reply(&store, &store, &store, USER, CHAT, "avatar please").await?;
    assert_eq!(reply, AutoReply::NoTokens);
    Ok(())
}

#[tokio::test]
async fn test_auto_reply_splits_files_and_text_filters() -> Result<()> {
    let (store, media_id, _) = store_with_file(1).await?;
    store
        .add_filter(&filter("avatar", "", Some(&media_id)))
        .await?;
    store.add_filter(&filter("rules", "Be nice", None)).await?;
    store.add_filter(&filter("titanic", "Sold out", None)).await?;

    let reply =
        plan_auto_reply(&store, &store, &store, USER, CHAT, "Avatar? and the RULES").await?;
    let AutoReply::Matches { files, replies } = reply else {
        panic!("expected matches");
    };
    assert_eq!(
        files,
        vec![FileChoice {
            label: "Avatar 2009 mkv".to_string(),
            media_id,
        }]
    );
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].reply_text, "Be nice");

    let nothing = plan_auto_reply(&store, &store, &store, USER, CHAT, "avatars").await?;
    assert!(nothing.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_alert_of_long_keyword_is_found() -> Result<()> {
    let store = MemoryStore::new(0);
    let keyword = "where can i find the complete collection of the extended editions";
    let parsed = parse_text_reply("[Info](buttonalert:Ask in the channel)", keyword);
    store
        .add_filter(&FilterRecord {
            alerts: parsed.alerts,
            buttons: parsed.buttons.clone(),
            ..filter(keyword, "", None)
        })
        .await?;

    let ButtonAction::Alert { callback_data } = &parsed.buttons[0][0].action else {
        panic!("expected an alert button");
    };
    assert!(callback_data.len() <= 64);

    let (index, key) = parse_alert_callback(callback_data).expect("alert callback");
    assert_eq!(
        find_alert(&store, CHAT, index, &key).await?,
        Some("Ask in the channel".to_string())
    );
    assert_eq!(find_alert(&store, CHAT, 1, &key).await?, None);
    assert_eq!(find_alert(&store, -1, index, &key).await?, None);
    Ok(())
}
