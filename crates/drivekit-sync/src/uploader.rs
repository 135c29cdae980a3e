//! Upload seam between the queue engine and the HTTP client.
//!
//! The queue only needs one remote capability. Keeping it behind a trait lets
//! the engine tests drive the full task lifecycle without a server.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use drivekit_client::{DriveClient, ProgressFn};
use drivekit_core::models::{FileRecord, FileSource};
use drivekit_core::AppError;

/// One streaming upload with raw progress reporting and cooperative abort.
///
/// Implementations return [`AppError::Cancelled`] for an aborted transfer and
/// must never report it as an ordinary failure.
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload(
        &self,
        file: FileSource,
        folder_id: Option<Uuid>,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<FileRecord, AppError>;
}

#[async_trait]
impl FileUploader for DriveClient {
    async fn upload(
        &self,
        file: FileSource,
        folder_id: Option<Uuid>,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<FileRecord, AppError> {
        DriveClient::upload(self, file, folder_id, on_progress, cancel).await
    }
}
