//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, warn};

use super::delivery::{deliver_file, find_alert, DeliveryOutcome};
use super::ui_builder::FILE_CALLBACK_PREFIX;
use super::AppState;
use crate::filter_parser::parse_alert_callback;
use crate::localization::t_lang;

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");
    let lang = q.from.language_code.as_deref();
    let data = q.data.as_deref().unwrap_or("");

    let answer = if let Some(media_id) = data.strip_prefix(FILE_CALLBACK_PREFIX) {
        send_file(&bot, &q, &state, media_id, lang).await?
    } else if let Some((index, key)) = parse_alert_callback(data) {
        show_alert(&q, &state, index, &key, lang).await?
    } else {
        warn!(user_id = %q.from.id, data = %data, "Unknown callback data");
        None
    };

    let mut request = bot.answer_callback_query(q.id.clone());
    if let Some(text) = answer {
        request = request.text(text).show_alert(true);
    }
    request.await?;
    Ok(())
}

async fn send_file(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
    media_id: &str,
    lang: Option<&str>,
) -> Result<Option<String>> {
    let outcome = deliver_file(
        state.ledger.as_ref(),
        state.media.as_ref(),
        bot,
        q.from.id.0 as i64,
        media_id,
        &t_lang("file-caption", lang),
    )
    .await?;

    let key = match outcome {
        DeliveryOutcome::NoTokens => "tokens-empty-alert",
        DeliveryOutcome::NotFound => "file-not-found",
        DeliveryOutcome::Sent => "file-sent",
        DeliveryOutcome::Failed => "file-send-failed",
    };
    Ok(Some(t_lang(key, lang)))
}

async fn show_alert(
    q: &CallbackQuery,
    state: &AppState,
    index: usize,
    key: &str,
    lang: Option<&str>,
) -> Result<Option<String>> {
    let Some(message) = q.message.as_ref() else {
        return Ok(None);
    };

    let alert = find_alert(state.filters.as_ref(), message.chat().id.0, index, key).await?;

    Ok(Some(alert.unwrap_or_else(|| t_lang("alert-missing", lang))))
}
