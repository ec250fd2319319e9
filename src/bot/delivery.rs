//! Token-gated file delivery and auto-filter planning
//!
//! Both flows only talk to the stores and to a [`DocumentSender`], so they can
//! be driven without a Telegram connection.

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};
use tracing::{error, info, warn};

use crate::db::{FilterRecord, FilterStore, MediaStore, TokenLedger};
use crate::filter_parser::{alert_key_matches, keyword_matches};

/// Sends a stored document to a user's private chat
#[async_trait]
pub trait DocumentSender: Send + Sync {
    async fn send_cached_document(&self, user_id: i64, tg_file_id: &str, caption: &str)
        -> Result<()>;
}

#[async_trait]
impl DocumentSender for Bot {
    async fn send_cached_document(
        &self,
        user_id: i64,
        tg_file_id: &str,
        caption: &str,
    ) -> Result<()> {
        self.send_document(ChatId(user_id), InputFile::file_id(FileId(tg_file_id.to_string())))
            .caption(caption)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    NoTokens,
    NotFound,
    Sent,
    /// Sending failed and the token was refunded
    Failed,
}

/// Deliver a catalog file to `user_id`, paying one token
pub async fn deliver_file(
    ledger: &dyn TokenLedger,
    media: &dyn MediaStore,
    sender: &dyn DocumentSender,
    user_id: i64,
    media_id: &str,
    caption: &str,
) -> Result<DeliveryOutcome> {
    if ledger.get_tokens(user_id).await? <= 0 {
        return Ok(DeliveryOutcome::NoTokens);
    }

    let Some(file) = media.find_media(media_id).await? else {
        warn!(user_id = %user_id, file_id = %media_id, "Requested file is not in the catalog");
        return Ok(DeliveryOutcome::NotFound);
    };

    if !ledger.try_consume(user_id).await? {
        return Ok(DeliveryOutcome::NoTokens);
    }

    match sender
        .send_cached_document(user_id, &file.tg_file_id, caption)
        .await
    {
        Ok(()) => {
            info!(user_id = %user_id, file_id = %media_id, "File delivered");
            Ok(DeliveryOutcome::Sent)
        }
        Err(e) => {
            error!(user_id = %user_id, file_id = %media_id, error = %e, "Error sending file");
            ledger.add_tokens(user_id, 1).await?;
            Ok(DeliveryOutcome::Failed)
        }
    }
}

/// A catalog file offered as a button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChoice {
    pub label: String,
    pub media_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoReply {
    NoTokens,
    Matches {
        files: Vec<FileChoice>,
        replies: Vec<FilterRecord>,
    },
}

impl AutoReply {
    pub fn is_empty(&self) -> bool {
        matches!(self, AutoReply::Matches { files, replies } if files.is_empty() && replies.is_empty())
    }
}

/// Work out how to answer a group message
pub async fn plan_auto_reply(
    ledger: &dyn TokenLedger,
    filters: &dyn FilterStore,
    media: &dyn MediaStore,
    user_id: i64,
    chat_id: i64,
    text: &str,
) -> Result<AutoReply> {
    if ledger.get_tokens(user_id).await? <= 0 {
        return Ok(AutoReply::NoTokens);
    }

    let mut files = Vec::new();
    let mut replies = Vec::new();
    for filter in filters.get_filters(chat_id).await? {
        if !keyword_matches(&filter.keyword, text) {
            continue;
        }
        match &filter.file_id {
            Some(media_id) => {
                let label = match media.find_media(media_id).await? {
                    Some(file) => file.file_name,
                    None => filter.keyword.clone(),
                };
                files.push(FileChoice {
                    label,
                    media_id: media_id.clone(),
                });
            }
            None => replies.push(filter),
        }
    }

    Ok(AutoReply::Matches { files, replies })
}

/// Alert text for an `alertmessage` button, looked up by keyword or its hash
pub async fn find_alert(
    filters: &dyn FilterStore,
    chat_id: i64,
    index: usize,
    key: &str,
) -> Result<Option<String>> {
    let filter = match filters.find_filter(chat_id, key).await? {
        Some(filter) => Some(filter),
        None => filters
            .get_filters(chat_id)
            .await?
            .into_iter()
            .find(|filter| alert_key_matches(key, &filter.keyword)),
    };
    Ok(filter.and_then(|filter| filter.alerts.get(index).cloned()))
}
