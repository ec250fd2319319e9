//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: commands, auto-filter replies and media indexing
//! - `callback_handler`: file delivery and alert buttons
//! - `inline_handler`: inline catalog search
//! - `access`: target group resolution and admin checks
//! - `delivery`: token-gated delivery and auto-filter planning
//! - `ui_builder`: keyboards and message formatting

use std::sync::Arc;

use crate::config::BotConfig;
use crate::db::{ConnectionStore, FilterStore, MediaStore, TokenLedger};

pub mod access;
pub mod callback_handler;
pub mod commands;
pub mod delivery;
pub mod inline_handler;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use inline_handler::inline_handler;
pub use message_handler::{channel_post_handler, message_handler};

/// State shared by every handler
pub struct AppState {
    pub config: BotConfig,
    pub media: Arc<dyn MediaStore>,
    pub filters: Arc<dyn FilterStore>,
    pub connections: Arc<dyn ConnectionStore>,
    pub ledger: Arc<dyn TokenLedger>,
    /// Username of the bot, without `@`
    pub bot_username: String,
}

impl AppState {
    /// Build the state from one store implementing every storage trait
    pub fn with_store<S>(config: BotConfig, store: Arc<S>, bot_username: impl Into<String>) -> Self
    where
        S: MediaStore + FilterStore + ConnectionStore + TokenLedger + 'static,
    {
        Self {
            config,
            media: store.clone(),
            filters: store.clone(),
            connections: store.clone(),
            ledger: store,
            bot_username: bot_username.into(),
        }
    }
}
