//! Inline Handler module answering `@bot query | type` searches from the catalog

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineQueryResult, InlineQueryResultCachedDocument, ParseMode};
use tracing::{debug, error};

use super::ui_builder::format_file_size;
use super::AppState;
use crate::errors::SearchError;
use crate::media::Media;
use crate::search::{get_search_results, SearchPage, SearchRequest};

/// Seconds Telegram may cache an inline answer
const INLINE_CACHE_TIME: u32 = 10;

/// Split an inline query into search text and optional file type
pub fn parse_inline_query(query: &str) -> (String, Option<String>) {
    match query.split_once('|') {
        Some((text, file_type)) => {
            let file_type = file_type.trim().to_lowercase();
            (
                text.trim().to_string(),
                (!file_type.is_empty()).then_some(file_type),
            )
        }
        None => (query.trim().to_string(), None),
    }
}

/// Offset cursor sent back by the client; anything but a non-negative integer restarts at 0
pub fn parse_offset(offset: &str) -> i64 {
    offset
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|&o| o >= 0)
        .unwrap_or(0)
}

fn cached_document(media: &Media) -> InlineQueryResult {
    let mut result = InlineQueryResultCachedDocument::new(
        media.id.clone(),
        media.file_name.clone(),
        FileId(media.tg_file_id.clone()),
    );
    result.description = Some(format!(
        "Size: {} | Type: {}",
        format_file_size(media.file_size),
        media.file_type.as_deref().unwrap_or("document")
    ));
    result.caption = media.caption.clone();
    result.parse_mode = Some(ParseMode::Html);
    InlineQueryResult::CachedDocument(result)
}

/// Handle inline queries by searching the media catalog
pub async fn inline_handler(bot: Bot, q: InlineQuery, state: Arc<AppState>) -> Result<()> {
    let (text, file_type) = parse_inline_query(&q.query);
    let request = SearchRequest {
        file_type,
        max_results: state.config.max_results,
        offset: parse_offset(&q.offset),
        ..SearchRequest::new(text)
    };

    let page = match get_search_results(
        state.media.as_ref(),
        &request,
        state.config.use_caption_filter,
    )
    .await
    {
        Ok(page) => page,
        Err(SearchError::InvalidQuery(reason)) => {
            debug!(user_id = %q.from.id, query = %q.query, reason = %reason, "Invalid inline query");
            SearchPage {
                files: Vec::new(),
                next_offset: None,
                total_results: 0,
            }
        }
        Err(e) => {
            error!(user_id = %q.from.id, query = %q.query, error = %e, "Inline search failed");
            return Err(e.into());
        }
    };

    debug!(
        user_id = %q.from.id,
        results = page.files.len(),
        total = page.total_results,
        "Answering inline query"
    );

    let results: Vec<InlineQueryResult> = page.files.iter().map(cached_document).collect();
    bot.answer_inline_query(q.id.clone(), results)
        .cache_time(INLINE_CACHE_TIME)
        .is_personal(true)
        .next_offset(
            page.next_offset
                .map(|offset| offset.to_string())
                .unwrap_or_default(),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inline_query() {
        assert_eq!(parse_inline_query("avatar"), ("avatar".to_string(), None));
        assert_eq!(
            parse_inline_query("avatar 2009 | Video "),
            ("avatar 2009".to_string(), Some("video".to_string()))
        );
        assert_eq!(parse_inline_query(" | "), (String::new(), None));
    }

    #[test]
    fn test_parse_offset_rejects_bad_cursors() {
        assert_eq!(parse_offset(""), 0);
        assert_eq!(parse_offset("20"), 20);
        assert_eq!(parse_offset("-10"), 0);
        assert_eq!(parse_offset("abc"), 0);
        assert_eq!(parse_offset("99999999999999999999"), 0);
        assert_eq!(parse_offset(&i64::MAX.to_string()), i64::MAX);
    }
}
