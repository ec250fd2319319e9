//! In-process store backed by `tokio` locks.
//!
//! Mirrors the PostgreSQL backend: media kept in insertion order, unique ids,
//! filters keyed by `(chat_id, keyword)`, token balances defaulting to a
//! configured value.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ConnectionStore, FilterRecord, FilterStore, GroupConnection, MediaStore, TokenLedger};
use crate::errors::{SearchError, StoreError};
use crate::media::Media;
use crate::search::SearchPlan;

#[derive(Debug, Default)]
pub struct MemoryStore {
    media: RwLock<Vec<Media>>,
    filters: RwLock<BTreeMap<(i64, String), FilterRecord>>,
    connections: RwLock<HashMap<i64, GroupConnection>>,
    tokens: RwLock<HashMap<i64, i64>>,
    default_tokens: i64,
}

impl MemoryStore {
    pub fn new(default_tokens: i64) -> Self {
        Self {
            default_tokens,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn insert_media(&self, media: &Media) -> Result<bool, StoreError> {
        let mut rows = self.media.write().await;
        if rows.iter().any(|m| m.id == media.id) {
            return Ok(false);
        }
        rows.push(media.clone());
        Ok(true)
    }

    async fn search_media(
        &self,
        plan: &SearchPlan,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Media>, i64), SearchError> {
        let rows = self.media.read().await;
        let matching: Vec<&Media> = rows.iter().rev().filter(|m| plan.matches(m)).collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_media(&self, id: &str) -> Result<Option<Media>, StoreError> {
        let rows = self.media.read().await;
        Ok(rows.iter().find(|m| m.id == id).cloned())
    }
}

#[async_trait]
impl FilterStore for MemoryStore {
    async fn add_filter(&self, filter: &FilterRecord) -> Result<(), StoreError> {
        self.filters
            .write()
            .await
            .insert((filter.chat_id, filter.keyword.clone()), filter.clone());
        Ok(())
    }

    async fn get_filters(&self, chat_id: i64) -> Result<Vec<FilterRecord>, StoreError> {
        let filters = self.filters.read().await;
        Ok(filters
            .range((chat_id, String::new())..)
            .take_while(|((chat, _), _)| *chat == chat_id)
            .map(|(_, f)| f.clone())
            .collect())
    }

    async fn find_filter(
        &self,
        chat_id: i64,
        keyword: &str,
    ) -> Result<Option<FilterRecord>, StoreError> {
        let filters = self.filters.read().await;
        Ok(filters.get(&(chat_id, keyword.to_string())).cloned())
    }

    async fn delete_filter(&self, chat_id: i64, keyword: &str) -> Result<bool, StoreError> {
        let mut filters = self.filters.write().await;
        Ok(filters.remove(&(chat_id, keyword.to_string())).is_some())
    }

    async fn count_filters(&self, chat_id: i64) -> Result<i64, StoreError> {
        Ok(self.get_filters(chat_id).await?.len() as i64)
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn add_connection(
        &self,
        user_id: i64,
        group_id: i64,
        group_title: &str,
    ) -> Result<(), StoreError> {
        self.connections.write().await.insert(
            user_id,
            GroupConnection {
                user_id,
                group_id,
                group_title: group_title.to_string(),
            },
        );
        Ok(())
    }

    async fn active_connection(
        &self,
        user_id: i64,
    ) -> Result<Option<GroupConnection>, StoreError> {
        Ok(self.connections.read().await.get(&user_id).cloned())
    }

    async fn remove_connection(&self, user_id: i64) -> Result<bool, StoreError> {
        Ok(self.connections.write().await.remove(&user_id).is_some())
    }
}

#[async_trait]
impl TokenLedger for MemoryStore {
    async fn get_tokens(&self, user_id: i64) -> Result<i64, StoreError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(&user_id).copied().unwrap_or(self.default_tokens))
    }

    async fn try_consume(&self, user_id: i64) -> Result<bool, StoreError> {
        let mut tokens = self.tokens.write().await;
        let balance = tokens.entry(user_id).or_insert(self.default_tokens);
        if *balance > 0 {
            *balance -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn add_tokens(&self, user_id: i64, amount: i64) -> Result<i64, StoreError> {
        let mut tokens = self.tokens.write().await;
        let balance = tokens.entry(user_id).or_insert(self.default_tokens);
        *balance = balance
            .checked_add(amount)
            .ok_or(StoreError::BalanceOverflow { user_id })?;
        Ok(*balance)
    }
}
