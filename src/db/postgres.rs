//! PostgreSQL backend.
//!
//! Media records live in a table whose name comes from configuration; the
//! filter, connection and token tables have fixed names.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use super::{ConnectionStore, FilterRecord, FilterStore, GroupConnection, MediaStore, TokenLedger};
use crate::errors::{SearchError, StoreError};
use crate::media::Media;
use crate::search::SearchPlan;

/// SQLSTATE raised by `~*` on a malformed pattern
const INVALID_REGULAR_EXPRESSION: &str = "2201B";
/// SQLSTATE raised when a BIGINT overflows
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

const MEDIA_COLUMNS: &str =
    "id, tg_file_id, file_ref, file_name, file_size, file_type, mime_type, caption, indexed_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    media_table: String,
    default_tokens: i64,
}

#[derive(sqlx::FromRow)]
struct FilterRow {
    chat_id: i64,
    keyword: String,
    reply_text: String,
    buttons: String,
    alerts: String,
    file_id: Option<String>,
}

impl TryFrom<FilterRow> for FilterRecord {
    type Error = StoreError;

    fn try_from(row: FilterRow) -> Result<Self, Self::Error> {
        Ok(FilterRecord {
            chat_id: row.chat_id,
            keyword: row.keyword,
            reply_text: row.reply_text,
            buttons: serde_json::from_str(&row.buttons)?,
            alerts: serde_json::from_str(&row.alerts)?,
            file_id: row.file_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ConnectionRow {
    user_id: i64,
    group_id: i64,
    group_title: String,
}

impl PgStore {
    /// Connect and make sure the schema exists
    ///
    /// `media_table` must already be a validated SQL identifier.
    pub async fn connect(
        database_url: &str,
        media_table: &str,
        default_tokens: i64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::from_pool(pool, media_table, default_tokens);
        store.init_database_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool, media_table: &str, default_tokens: i64) -> Self {
        Self {
            pool,
            media_table: media_table.to_string(),
            default_tokens,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist
    pub async fn init_database_schema(&self) -> Result<(), StoreError> {
        info!(media_table = %self.media_table, "Initializing database schema");

        let table = &self.media_table;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                seq BIGSERIAL NOT NULL,
                id TEXT PRIMARY KEY,
                tg_file_id TEXT NOT NULL,
                file_ref TEXT,
                file_name TEXT NOT NULL,
                file_size BIGINT NOT NULL,
                file_type TEXT,
                mime_type TEXT,
                caption TEXT,
                indexed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_file_name_idx ON {table} (file_name)"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_seq_idx ON {table} (seq)"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS filters (
                chat_id BIGINT NOT NULL,
                keyword TEXT NOT NULL,
                reply_text TEXT NOT NULL,
                buttons TEXT NOT NULL DEFAULT '[]',
                alerts TEXT NOT NULL DEFAULT '[]',
                file_id TEXT,
                PRIMARY KEY (chat_id, keyword)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS connections (
                user_id BIGINT PRIMARY KEY,
                group_id BIGINT NOT NULL,
                group_title TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_tokens (
                user_id BIGINT PRIMARY KEY,
                tokens BIGINT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    fn push_search_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>, plan: &SearchPlan) {
        builder.push(" WHERE (file_name ~* ");
        builder.push_bind(plan.text.postgres().to_string());
        if plan.include_caption {
            builder.push(" OR caption ~* ");
            builder.push_bind(plan.text.postgres().to_string());
        }
        builder.push(")");

        if let Some(file_type) = &plan.file_type {
            builder.push(" AND file_type = ");
            builder.push_bind(file_type.clone());
        }

        for constraint in &plan.name_constraints {
            builder.push(" AND file_name ~* ");
            builder.push_bind(constraint.postgres().to_string());
        }
    }

    async fn materialize_balance(&self, user_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_tokens (user_id, tokens) VALUES ($1, $2)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(self.default_tokens)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn map_search_error(e: sqlx::Error) -> SearchError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(INVALID_REGULAR_EXPRESSION) {
            return SearchError::InvalidQuery(db.message().to_string());
        }
    }
    SearchError::Store(StoreError::Database(e))
}

fn map_balance_error(e: sqlx::Error, user_id: i64) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) {
            return StoreError::BalanceOverflow { user_id };
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl MediaStore for PgStore {
    async fn insert_media(&self, media: &Media) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} ({MEDIA_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO NOTHING",
            self.media_table
        ))
        .bind(&media.id)
        .bind(&media.tg_file_id)
        .bind(&media.file_ref)
        .bind(&media.file_name)
        .bind(media.file_size)
        .bind(&media.file_type)
        .bind(&media.mime_type)
        .bind(&media.caption)
        .bind(media.indexed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn search_media(
        &self,
        plan: &SearchPlan,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Media>, i64), SearchError> {
        debug!(pattern = %plan.text.postgres(), offset, limit, "Searching media");

        let mut count_query = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*) FROM {}",
            self.media_table
        ));
        self.push_search_conditions(&mut count_query, plan);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_search_error)?;

        let mut page_query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {MEDIA_COLUMNS} FROM {}",
            self.media_table
        ));
        self.push_search_conditions(&mut page_query, plan);
        page_query.push(" ORDER BY seq DESC LIMIT ");
        page_query.push_bind(limit);
        page_query.push(" OFFSET ");
        page_query.push_bind(offset);

        let files = page_query
            .build_query_as::<Media>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_search_error)?;

        Ok((files, total))
    }

    async fn find_media(&self, id: &str) -> Result<Option<Media>, StoreError> {
        let media = sqlx::query_as::<_, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM {} WHERE id = $1",
            self.media_table
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(media)
    }
}

#[async_trait]
impl FilterStore for PgStore {
    async fn add_filter(&self, filter: &FilterRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO filters (chat_id, keyword, reply_text, buttons, alerts, file_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (chat_id, keyword) DO UPDATE SET
                reply_text = EXCLUDED.reply_text,
                buttons = EXCLUDED.buttons,
                alerts = EXCLUDED.alerts,
                file_id = EXCLUDED.file_id",
        )
        .bind(filter.chat_id)
        .bind(&filter.keyword)
        .bind(&filter.reply_text)
        .bind(serde_json::to_string(&filter.buttons)?)
        .bind(serde_json::to_string(&filter.alerts)?)
        .bind(&filter.file_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_filters(&self, chat_id: i64) -> Result<Vec<FilterRecord>, StoreError> {
        let rows = sqlx::query_as::<_, FilterRow>(
            "SELECT chat_id, keyword, reply_text, buttons, alerts, file_id
             FROM filters WHERE chat_id = $1 ORDER BY keyword",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FilterRecord::try_from).collect()
    }

    async fn find_filter(
        &self,
        chat_id: i64,
        keyword: &str,
    ) -> Result<Option<FilterRecord>, StoreError> {
        let row = sqlx::query_as::<_, FilterRow>(
            "SELECT chat_id, keyword, reply_text, buttons, alerts, file_id
             FROM filters WHERE chat_id = $1 AND keyword = $2",
        )
        .bind(chat_id)
        .bind(keyword)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FilterRecord::try_from).transpose()
    }

    async fn delete_filter(&self, chat_id: i64, keyword: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM filters WHERE chat_id = $1 AND keyword = $2")
            .bind(chat_id)
            .bind(keyword)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_filters(&self, chat_id: i64) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM filters WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ConnectionStore for PgStore {
    async fn add_connection(
        &self,
        user_id: i64,
        group_id: i64,
        group_title: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO connections (user_id, group_id, group_title) VALUES ($1, $2, $3)
             ON CONFLICT (user_id) DO UPDATE SET
                group_id = EXCLUDED.group_id,
                group_title = EXCLUDED.group_title",
        )
        .bind(user_id)
        .bind(group_id)
        .bind(group_title)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_connection(
        &self,
        user_id: i64,
    ) -> Result<Option<GroupConnection>, StoreError> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            "SELECT user_id, group_id, group_title FROM connections WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| GroupConnection {
            user_id: r.user_id,
            group_id: r.group_id,
            group_title: r.group_title,
        }))
    }

    async fn remove_connection(&self, user_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM connections WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenLedger for PgStore {
    async fn get_tokens(&self, user_id: i64) -> Result<i64, StoreError> {
        let tokens: Option<i64> =
            sqlx::query_scalar("SELECT tokens FROM user_tokens WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(tokens.unwrap_or(self.default_tokens))
    }

    async fn try_consume(&self, user_id: i64) -> Result<bool, StoreError> {
        self.materialize_balance(user_id).await?;
        let result = sqlx::query(
            "UPDATE user_tokens SET tokens = tokens - 1 WHERE user_id = $1 AND tokens > 0",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_tokens(&self, user_id: i64, amount: i64) -> Result<i64, StoreError> {
        let balance: i64 = sqlx::query_scalar(
            "INSERT INTO user_tokens (user_id, tokens) VALUES ($1, $2 + $3)
             ON CONFLICT (user_id) DO UPDATE SET tokens = user_tokens.tokens + $3
             RETURNING tokens",
        )
        .bind(user_id)
        .bind(self.default_tokens)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_balance_error(e, user_id))?;
        Ok(balance)
    }
}
