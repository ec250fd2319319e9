//! # Error Types Module
//!
//! Structured error types for the codec, search, storage and configuration
//! layers. Handlers wrap these in `anyhow` when they reach the bot surface.

use thiserror::Error;

/// Failures while decoding a Telegram file identifier
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileIdError {
    /// The string is not valid URL-safe base64
    #[error("file id is not valid base64: {0}")]
    Base64(String),
    /// A zero marker was not followed by its run length
    #[error("run-length marker at offset {0} is missing its count")]
    DanglingZeroMarker(usize),
    /// The decoded buffer ended before a field could be read
    #[error("file id truncated while reading {0}")]
    Truncated(&'static str),
    /// Web-location file ids carry no media id and cannot be indexed
    #[error("web location file ids are not supported")]
    WebLocation,
}

/// Failures while building or running a catalog search
#[derive(Debug, Error)]
pub enum SearchError {
    /// The user query did not produce a valid regular expression
    #[error("invalid search query: {0}")]
    InvalidQuery(String),
    /// The store failed for a reason unrelated to the query
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures raised by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token balance of user {user_id} would overflow")]
    BalanceOverflow { user_id: i64 },
}

/// Failures while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}
