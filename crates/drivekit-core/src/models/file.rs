use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Maximum accepted file size (500 MiB). Enforced on inbound records; the
/// file-selection surface is expected to pre-validate before enqueueing.
pub const MAX_FILE_SIZE_BYTES: i64 = 500 * 1024 * 1024;

/// Server-authoritative metadata for one uploaded file.
///
/// `id` is globally unique among all records held by the registry and cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FileRecord {
    pub id: Uuid,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    pub user_id: String,
    pub public_id: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub is_private: bool,
    #[validate(range(min = 1, max = 524_288_000, message = "size out of range"))]
    pub size: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Raw file handle supplied by the file-selection surface.
///
/// Bytes are reference-counted so tasks can be snapshotted cheaply.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl FileSource {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> i64 {
        self.data.len() as i64
    }
}

/// Payload of the privacy toggle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyUpdate {
    pub id: Uuid,
    #[serde(rename = "private")]
    pub is_private: bool,
}
