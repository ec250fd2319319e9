//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html;
use tracing::warn;
use url::Url;

use super::delivery::FileChoice;
use crate::filter_parser::{ButtonAction, FilterButton};
use crate::localization::t_args_lang;

/// Telegram's message length limit
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Callback data prefix of file buttons
pub const FILE_CALLBACK_PREFIX: &str = "file_";

/// Parse a button URL, assuming `https` when the scheme is missing
fn button_url(raw: &str) -> Option<Url> {
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("https://{raw}")))
        .ok()
}

/// Keyboard for a filter's stored buttons; `None` when there are none
pub fn filter_keyboard(rows: &[Vec<FilterButton>]) -> Option<InlineKeyboardMarkup> {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|button| match &button.action {
                    ButtonAction::Url { url } => match button_url(url) {
                        Some(url) => Some(InlineKeyboardButton::url(button.text.clone(), url)),
                        None => {
                            warn!(url = %url, "Skipping button with invalid URL");
                            None
                        }
                    },
                    ButtonAction::Alert { callback_data } => Some(InlineKeyboardButton::callback(
                        button.text.clone(),
                        callback_data.clone(),
                    )),
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    (!keyboard.is_empty()).then(|| InlineKeyboardMarkup::new(keyboard))
}

/// One button per file, each requesting delivery of that file
pub fn file_choice_keyboard(choices: &[FileChoice]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(choices.iter().map(|choice| {
        vec![InlineKeyboardButton::callback(
            choice.label.clone(),
            format!("{FILE_CALLBACK_PREFIX}{}", choice.media_id),
        )]
    }))
}

/// HTML list of a chat's filter keywords
pub fn format_filter_list(title: &str, keywords: &[String], language_code: Option<&str>) -> String {
    let count = keywords.len().to_string();
    let mut text = t_args_lang(
        "filters-header",
        &[("title", &html::escape(title)), ("count", &count)],
        language_code,
    );
    text.push_str("\n\n");
    for keyword in keywords {
        text.push_str(&format!(" ×  <code>{}</code>\n", html::escape(keyword)));
    }
    text
}

/// Human readable size, e.g. `1.50 MB`
pub fn format_file_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes.max(0) as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}
