//! # Configuration Module
//!
//! Bot settings read from the environment (after `.env` has been loaded).

use std::collections::HashSet;

use crate::errors::ConfigError;
use crate::search::DEFAULT_MAX_RESULTS;

pub const DEFAULT_COLLECTION_NAME: &str = "media";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub bot_token: String,
    /// PostgreSQL URL; in-memory stores are used when absent
    pub database_url: Option<String>,
    /// Table holding the media catalog
    pub collection_name: String,
    /// Match search patterns against captions too
    pub use_caption_filter: bool,
    /// Numeric ids of bot administrators
    pub admin_ids: HashSet<i64>,
    /// Lowercased usernames (without `@`) of bot administrators
    pub admin_usernames: HashSet<String>,
    /// Chats whose media gets indexed
    pub channels: HashSet<i64>,
    pub max_results: i64,
    /// Balance of a user the ledger has never seen
    pub default_tokens: i64,
    pub log_format: LogFormat,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let collection_name = get("COLLECTION_NAME")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string());
        if !is_sql_identifier(&collection_name) {
            return Err(ConfigError::Invalid {
                name: "COLLECTION_NAME",
                value: collection_name,
            });
        }

        let use_caption_filter = match get("USE_CAPTION_FILTER") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid {
                name: "USE_CAPTION_FILTER",
                value: v,
            })?,
            None => false,
        };

        let mut admin_ids = HashSet::new();
        let mut admin_usernames = HashSet::new();
        for entry in split_list(get("ADMINS").as_deref().unwrap_or_default()) {
            match entry.parse::<i64>() {
                Ok(id) => {
                    admin_ids.insert(id);
                }
                Err(_) => {
                    admin_usernames.insert(entry.trim_start_matches('@').to_lowercase());
                }
            }
        }

        let channels = split_list(get("CHANNELS").as_deref().unwrap_or_default())
            .map(|entry| {
                entry.parse::<i64>().map_err(|_| ConfigError::Invalid {
                    name: "CHANNELS",
                    value: entry.to_string(),
                })
            })
            .collect::<Result<HashSet<_>, _>>()?;

        let max_results = parse_number(get("MAX_RESULTS"), "MAX_RESULTS", DEFAULT_MAX_RESULTS)?;
        if max_results <= 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_RESULTS",
                value: max_results.to_string(),
            });
        }
        let default_tokens = parse_number(get("DEFAULT_TOKENS"), "DEFAULT_TOKENS", 0)?;

        let log_format = match get("LOG_FORMAT").map(|v| v.trim().to_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            bot_token,
            database_url: get("DATABASE_URL"),
            collection_name,
            use_caption_filter,
            admin_ids,
            admin_usernames,
            channels,
            max_results,
            default_tokens,
            log_format,
        })
    }

    pub fn is_admin(&self, user_id: i64, username: Option<&str>) -> bool {
        self.admin_ids.contains(&user_id)
            || username.is_some_and(|name| {
                self.admin_usernames
                    .contains(&name.trim_start_matches('@').to_lowercase())
            })
    }

    pub fn is_indexed_chat(&self, chat_id: i64) -> bool {
        self.channels.contains(&chat_id)
    }
}

/// Accepts `true/yes/1/enable/y` and `false/no/0/disable/n`, any case
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "enable" | "y" => Some(true),
        "false" | "no" | "0" | "disable" | "n" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|entry| !entry.is_empty())
}

fn parse_number(value: Option<String>, name: &'static str, default: i64) -> Result<i64, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { name, value: v }),
        None => Ok(default),
    }
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= 63
}
