//! # Auto-filter Telegram Bot
//!
//! Indexes documents, videos and audio posted in configured chats, answers
//! searches from that catalog, replies to group messages with per-chat
//! keyword filters, and charges one token per delivered file.

pub mod bot;
pub mod config;
pub mod db;
pub mod errors;
pub mod file_id;
pub mod filter_parser;
pub mod localization;
pub mod media;
pub mod search;
