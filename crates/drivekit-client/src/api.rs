//! Domain methods for the Drivekit API client.
//!
//! Contract relied on by the sync layer: upload returns a `FileRecord` on 2xx;
//! listing and search return `{data, cursor}` pages; errors are non-2xx with a
//! best-effort JSON `message` body. Cancellation surfaces as
//! [`AppError::Cancelled`], never as a transport failure.

use reqwest::multipart::{Form, Part};
use reqwest::Body;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use drivekit_core::models::{DashboardSummary, FileRecord, FileSource, Identity, Page, SessionRecord};
use drivekit_core::validation::{validate_record, validate_records};
use drivekit_core::AppError;

use crate::progress::{ProgressFn, ProgressStream};
use crate::{api_prefix, transport_err, DriveClient};

impl DriveClient {
    /// Upload one file as multipart form data, streaming with raw progress
    /// reporting and cooperative cancellation.
    ///
    /// An aborted transfer returns [`AppError::Cancelled`]; the caller must not
    /// treat it as success or failure.
    pub async fn upload(
        &self,
        file: FileSource,
        folder_id: Option<Uuid>,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<FileRecord, AppError> {
        let content_length = file.data.len() as u64;
        let stream = ProgressStream::new(file.data.clone(), on_progress);

        let part = Part::stream_with_length(Body::wrap_stream(stream), content_length)
            .file_name(file.name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| AppError::InvalidInput(format!("Invalid content type: {}", e)))?;

        let mut form = Form::new().part("file", part);
        if let Some(fid) = folder_id {
            form = form.text("folder_id", fid.to_string());
        }

        let url = self.build_url(&format!("{}/media", api_prefix()));
        let request = self.client().post(&url).multipart(form);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = request.send() => result.map_err(transport_err)?,
        };

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let record: FileRecord = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = response.json() => result
                .map_err(|e| AppError::InvalidInput(format!("Failed to parse response: {}", e)))?,
        };

        if self.validate_responses() {
            validate_record(&record)?;
        }

        tracing::debug!(file_id = %record.id, name = %record.name, "Upload acknowledged");
        Ok(record)
    }

    /// Fetch one page of the media listing. Pass the cursor from the previous
    /// page to continue; a null cursor in the response ends pagination.
    pub async fn list_media(&self, cursor: Option<&str>) -> Result<Page<FileRecord>, AppError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(c) = cursor {
            query.push(("cursor", c.to_string()));
        }

        let page: Page<FileRecord> = self
            .post_json(
                &format!("{}/pages/media", api_prefix()),
                &query,
                &serde_json::json!({}),
            )
            .await?;

        if self.validate_responses() {
            validate_records(&page.data)?;
        }

        Ok(page)
    }

    /// Search files by query string.
    pub async fn search(&self, query: &str) -> Result<Vec<FileRecord>, AppError> {
        let params = vec![("q", urlencoding::encode(query).to_string())];
        let records: Vec<FileRecord> = self
            .get(&format!("{}/search", api_prefix()), &params)
            .await?;

        if self.validate_responses() {
            validate_records(&records)?;
        }

        Ok(records)
    }

    /// Patch the privacy flag of one file.
    pub async fn toggle_privacy(&self, id: Uuid, is_private: bool) -> Result<(), AppError> {
        self.patch_json(
            &format!("{}/media/{}/privacy", api_prefix(), id),
            &serde_json::json!({ "is_private": is_private }),
        )
        .await
    }

    /// Delete a file by id.
    pub async fn delete_media(&self, id: Uuid) -> Result<(), AppError> {
        self.delete(&format!("{}/media/{}", api_prefix(), id)).await
    }

    /// Fetch the dashboard summary for the authenticated user.
    pub async fn dashboard(&self) -> Result<DashboardSummary, AppError> {
        self.get(&format!("{}/dashboard", api_prefix()), &[]).await
    }

    /// Verify the current credentials and return the authenticated identity.
    pub async fn verify(&self) -> Result<Identity, AppError> {
        self.get(&format!("{}/verify", api_prefix()), &[]).await
    }

    /// Mint a session record for the currently authenticated account, used
    /// when adding a secondary account.
    pub async fn add_session(&self) -> Result<SessionRecord, AppError> {
        self.post_json(
            &format!("{}/token/add", api_prefix()),
            &[],
            &serde_json::json!({}),
        )
        .await
    }

    /// Exchange a stored rotation token for a fresh session, switching the
    /// active cookie credentials to that account.
    pub async fn rotate_session(&self, token: &str) -> Result<SessionRecord, AppError> {
        self.post_json(
            &format!("{}/token/change/{}", api_prefix(), token),
            &[],
            &serde_json::json!({}),
        )
        .await
    }

    /// Invalidate a stored rotation token server-side.
    pub async fn delete_token(&self, token: &str) -> Result<(), AppError> {
        self.delete(&format!("{}/token/{}", api_prefix(), token))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_before_send_returns_cancelled() {
        let config = drivekit_core::ClientConfig::default();
        let client = DriveClient::new(&config).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let file = FileSource::new("a.txt", "text/plain", bytes::Bytes::from_static(b"hello"));
        let result = client
            .upload(file, None, std::sync::Arc::new(|_| {}), cancel)
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
