//! Multi-account session switching.
//!
//! Secondary accounts are stored as rotation tokens in the local cache.
//! Switching exchanges the target's token server-side (the active cookie now
//! belongs to the target), stores the replacement token minted for the
//! account being left, and resets every per-identity store before
//! reconnecting the bridge.

use std::sync::Arc;

use async_trait::async_trait;

use drivekit_cache::{CacheBackend, MediaCache};
use drivekit_client::DriveClient;
use drivekit_core::models::{Identity, SessionRecord};
use drivekit_core::AppError;

use crate::bridge::SyncBridge;
use crate::dashboard::DashboardStore;
use crate::registry::FileRegistry;

/// Remote session-token operations consumed by the switcher.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Mint a rotation token for the currently authenticated account.
    async fn add_session(&self) -> Result<SessionRecord, AppError>;

    /// Exchange a stored rotation token; the active credentials switch to
    /// that account and a replacement token for the previous one is returned.
    async fn rotate_session(&self, token: &str) -> Result<SessionRecord, AppError>;

    /// Invalidate a stored rotation token server-side.
    async fn delete_token(&self, token: &str) -> Result<(), AppError>;

    /// Identity behind the active credentials.
    async fn verify(&self) -> Result<Identity, AppError>;
}

#[async_trait]
impl SessionApi for DriveClient {
    async fn add_session(&self) -> Result<SessionRecord, AppError> {
        DriveClient::add_session(self).await
    }

    async fn rotate_session(&self, token: &str) -> Result<SessionRecord, AppError> {
        DriveClient::rotate_session(self, token).await
    }

    async fn delete_token(&self, token: &str) -> Result<(), AppError> {
        DriveClient::delete_token(self, token).await
    }

    async fn verify(&self) -> Result<Identity, AppError> {
        DriveClient::verify(self).await
    }
}

/// Orchestrates account switches across the API, cache and sync stores.
pub struct SessionSwitcher {
    api: Arc<dyn SessionApi>,
    backend: Arc<dyn CacheBackend>,
    media: Arc<MediaCache>,
    registry: Arc<FileRegistry>,
    dashboard: Arc<DashboardStore>,
    bridge: Arc<SyncBridge>,
}

impl SessionSwitcher {
    pub fn new(
        api: Arc<dyn SessionApi>,
        backend: Arc<dyn CacheBackend>,
        media: Arc<MediaCache>,
        registry: Arc<FileRegistry>,
        dashboard: Arc<DashboardStore>,
        bridge: Arc<SyncBridge>,
    ) -> Self {
        Self {
            api,
            backend,
            media,
            registry,
            dashboard,
            bridge,
        }
    }

    /// Stored secondary accounts, in the order they were added.
    pub async fn list_accounts(&self) -> Result<Vec<SessionRecord>, AppError> {
        self.backend.list_sessions().await
    }

    /// Save the active account as a switch target for later.
    pub async fn add_account(&self) -> Result<SessionRecord, AppError> {
        let session = self.api.add_session().await?;
        let stored = self.backend.put_session(&session).await?;
        tracing::info!(email = %stored.email, "Account saved for switching");
        Ok(stored)
    }

    /// Switch the active credentials to a stored account.
    ///
    /// The target's rotation token is consumed, the replacement token for the
    /// account being left is stored in its place, and every per-identity
    /// store (media cache, registry, dashboard, bridge connection) is reset
    /// for the new identity. Media records repopulate on the next reads.
    #[tracing::instrument(skip(self, target), fields(target_email = %target.email))]
    pub async fn switch_to(&self, target: &SessionRecord) -> Result<Identity, AppError> {
        let local_id = target.local_id.ok_or_else(|| {
            AppError::InvalidInput("session record has no local id".to_string())
        })?;

        let replacement = self.api.rotate_session(&target.token).await?;

        self.backend.delete_session(local_id).await?;
        let stored = self.backend.put_session(&replacement).await?;
        tracing::debug!(email = %stored.email, "Replacement token stored");

        self.media.clear().await?;
        self.registry.reset().await;
        self.dashboard.reset().await;

        let identity = self.api.verify().await?;
        self.bridge.connect(identity.clone()).await?;

        tracing::info!(user_id = %identity.id, "Account switch complete");
        Ok(identity)
    }

    /// Forget a stored account: invalidate its token remotely, then drop the
    /// local row.
    pub async fn remove_account(&self, stored: &SessionRecord) -> Result<(), AppError> {
        let local_id = stored.local_id.ok_or_else(|| {
            AppError::InvalidInput("session record has no local id".to_string())
        })?;

        self.api.delete_token(&stored.token).await?;
        self.backend.delete_session(local_id).await?;
        tracing::info!(email = %stored.email, "Account removed");
        Ok(())
    }
}
