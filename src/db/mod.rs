//! # Storage Module
//!
//! Store traits used by the handlers, the records they exchange, and two
//! backends: PostgreSQL through `sqlx` and an in-process store used when no
//! database is configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{SearchError, StoreError};
use crate::filter_parser::FilterButton;
use crate::media::Media;
use crate::search::SearchPlan;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// An auto-reply filter attached to a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub chat_id: i64,
    /// Lowercased trigger keyword
    pub keyword: String,
    pub reply_text: String,
    pub buttons: Vec<Vec<FilterButton>>,
    pub alerts: Vec<String>,
    /// Catalog id of an attached file
    pub file_id: Option<String>,
}

/// The group a user manages from private chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConnection {
    pub user_id: i64,
    pub group_id: i64,
    pub group_title: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Insert a record; `false` when the id already exists
    async fn insert_media(&self, media: &Media) -> Result<bool, StoreError>;

    /// Matching records, newest first, plus the total match count
    async fn search_media(
        &self,
        plan: &SearchPlan,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Media>, i64), SearchError>;

    async fn find_media(&self, id: &str) -> Result<Option<Media>, StoreError>;
}

#[async_trait]
pub trait FilterStore: Send + Sync {
    /// Insert or replace the filter for `(chat_id, keyword)`
    async fn add_filter(&self, filter: &FilterRecord) -> Result<(), StoreError>;

    /// All filters of a chat, ordered by keyword
    async fn get_filters(&self, chat_id: i64) -> Result<Vec<FilterRecord>, StoreError>;

    async fn find_filter(
        &self,
        chat_id: i64,
        keyword: &str,
    ) -> Result<Option<FilterRecord>, StoreError>;

    /// `false` when no such filter existed
    async fn delete_filter(&self, chat_id: i64, keyword: &str) -> Result<bool, StoreError>;

    async fn count_filters(&self, chat_id: i64) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn add_connection(
        &self,
        user_id: i64,
        group_id: i64,
        group_title: &str,
    ) -> Result<(), StoreError>;

    async fn active_connection(&self, user_id: i64)
        -> Result<Option<GroupConnection>, StoreError>;

    async fn remove_connection(&self, user_id: i64) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn get_tokens(&self, user_id: i64) -> Result<i64, StoreError>;

    /// Take one token if the balance is positive; `false` otherwise
    async fn try_consume(&self, user_id: i64) -> Result<bool, StoreError>;

    /// Credit (or debit, when negative) and return the new balance
    async fn add_tokens(&self, user_id: i64, amount: i64) -> Result<i64, StoreError>;
}
