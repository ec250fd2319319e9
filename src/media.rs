//! # Media Catalog Module
//!
//! The record stored for every file seen in a monitored chat, extraction of
//! that record from Telegram messages, and the save/lookup entry points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teloxide::types::Message;
use teloxide::utils::render::RenderMessageTextHelper;
use tracing::{error, info, warn};

use crate::db::MediaStore;
use crate::errors::StoreError;
use crate::file_id::unpack_new_file_id;

/// A stored media file, keyed by its encoded file identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: String,
    /// Bot API file id used to send the file again
    pub tg_file_id: String,
    pub file_ref: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: Option<String>,
    pub mime_type: Option<String>,
    pub caption: Option<String>,
    pub indexed_at: DateTime<Utc>,
}

/// Media metadata as received from Telegram, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomingMedia {
    pub tg_file_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub mime_type: Option<String>,
    pub caption: Option<String>,
}

impl IncomingMedia {
    /// Extract document, video or audio metadata from a message
    pub fn from_message(msg: &Message) -> Option<Self> {
        let (file_type, file, file_name, mime_type) = if let Some(doc) = msg.document() {
            ("document", &doc.file, doc.file_name.clone(), doc.mime_type.as_ref())
        } else if let Some(video) = msg.video() {
            ("video", &video.file, video.file_name.clone(), video.mime_type.as_ref())
        } else if let Some(audio) = msg.audio() {
            ("audio", &audio.file, audio.file_name.clone(), audio.mime_type.as_ref())
        } else {
            return None;
        };

        Some(Self {
            tg_file_id: file.id.to_string(),
            file_name,
            file_size: Some(i64::from(file.size)),
            file_type: Some(file_type.to_string()),
            mime_type: mime_type.map(|m| m.to_string()),
            caption: msg.html_caption(),
        })
    }
}

/// Result of a save attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Inserted under the given catalog id
    Saved(String),
    /// A record with the given catalog id already exists and was kept
    Duplicate(String),
    /// A required field was missing or the file id could not be decoded
    Invalid,
}

impl SaveOutcome {
    /// Legacy `(success, status)` pair: `(true, 1)`, `(false, 0)` or `(false, 2)`
    pub fn status(&self) -> (bool, u8) {
        match self {
            SaveOutcome::Saved(_) => (true, 1),
            SaveOutcome::Duplicate(_) => (false, 0),
            SaveOutcome::Invalid => (false, 2),
        }
    }

    /// Catalog id of the stored record, whether new or pre-existing
    pub fn file_id(&self) -> Option<&str> {
        match self {
            SaveOutcome::Saved(id) | SaveOutcome::Duplicate(id) => Some(id),
            SaveOutcome::Invalid => None,
        }
    }
}

/// Replace `_`, `-`, `.` and `+` with spaces
pub fn normalize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '_' | '-' | '.' | '+') { ' ' } else { c })
        .collect()
}

/// Validate, normalize and insert a media record
pub async fn save_file(
    store: &dyn MediaStore,
    incoming: IncomingMedia,
) -> Result<SaveOutcome, StoreError> {
    let display_name = incoming
        .file_name
        .clone()
        .unwrap_or_else(|| "NO_FILE".to_string());

    let (Some(file_name), Some(file_size)) = (incoming.file_name, incoming.file_size) else {
        error!(file_name = %display_name, "Media is missing a required field, not saving");
        return Ok(SaveOutcome::Invalid);
    };

    let (id, file_ref) = match unpack_new_file_id(&incoming.tg_file_id) {
        Ok(pair) => pair,
        Err(e) => {
            error!(file_name = %display_name, error = %e, "Could not decode Telegram file id");
            return Ok(SaveOutcome::Invalid);
        }
    };

    let media = Media {
        id: id.clone(),
        tg_file_id: incoming.tg_file_id,
        file_ref: Some(file_ref),
        file_name: normalize_file_name(&file_name),
        file_size,
        file_type: incoming.file_type,
        mime_type: incoming.mime_type,
        caption: incoming.caption,
        indexed_at: Utc::now(),
    };

    if store.insert_media(&media).await? {
        info!(file_name = %display_name, file_id = %id, "File saved to database");
        Ok(SaveOutcome::Saved(id))
    } else {
        warn!(file_name = %display_name, file_id = %id, "File is already saved in database");
        Ok(SaveOutcome::Duplicate(id))
    }
}

/// Exact-id lookup; empty when the id is unknown
pub async fn get_file_details(store: &dyn MediaStore, id: &str) -> Result<Vec<Media>, StoreError> {
    Ok(store.find_media(id).await?.into_iter().collect())
}
