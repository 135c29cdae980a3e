//! Cache backend abstraction.
//!
//! All persistent backends implement this trait. The read-through layer and
//! the session switcher work against it, so tests can substitute the
//! in-memory backend for the SQLite one.

use async_trait::async_trait;
use uuid::Uuid;

use drivekit_core::models::{FileRecord, SessionRecord};
use drivekit_core::AppError;

/// Persistent tier of the local cache.
///
/// Inserting a media record whose id is already present fails with
/// [`AppError::Cache`]; callers decide whether that is fatal. `clear` wipes
/// both tables in one call.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up one media record by id.
    async fn get_media(&self, id: Uuid) -> Result<Option<FileRecord>, AppError>;

    /// Insert a media record. Duplicate ids are rejected.
    async fn put_media(&self, record: &FileRecord) -> Result<(), AppError>;

    /// Delete a media record by id. Missing rows are not an error.
    async fn delete_media(&self, id: Uuid) -> Result<(), AppError>;

    /// Wipe the media table. Stored sessions survive; they are what makes
    /// switching back possible.
    async fn clear_media(&self) -> Result<(), AppError>;

    /// List all stored sessions in insertion order.
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, AppError>;

    /// Store a session and return it with its assigned local id.
    async fn put_session(&self, session: &SessionRecord) -> Result<SessionRecord, AppError>;

    /// Delete a stored session by local id. Missing rows are not an error.
    async fn delete_session(&self, local_id: i64) -> Result<(), AppError>;

    /// Wipe every table. Used on logout.
    async fn clear(&self) -> Result<(), AppError>;
}
