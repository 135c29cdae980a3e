//! Dashboard aggregate store.
//!
//! Counters are adjusted by the delta of each file event instead of refetched.
//! The aggregate may drift from server truth between full loads; the next
//! `initialize` after a reset corrects it.

use std::future::Future;

use tokio::sync::RwLock;

use drivekit_core::models::DashboardSummary;
use drivekit_core::AppError;

/// Holder for the per-session dashboard aggregate.
#[derive(Default)]
pub struct DashboardStore {
    inner: RwLock<Option<DashboardSummary>>,
}

impl DashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the aggregate once. Already-initialized stores return without
    /// fetching; a fetch that loses the race to another initializer is
    /// discarded rather than overwriting the in-memory aggregate.
    pub async fn initialize<F, Fut>(&self, fetch: F) -> Result<(), AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DashboardSummary, AppError>>,
    {
        if self.inner.read().await.is_some() {
            return Ok(());
        }

        let summary = fetch().await?;

        let mut guard = self.inner.write().await;
        if guard.is_none() {
            tracing::debug!(user_id = %summary.user_id, "Dashboard aggregate initialized");
            *guard = Some(summary);
        }
        Ok(())
    }

    /// Mutate the aggregate if one exists. Every incremental update path goes
    /// through here; an uninitialized store makes this a no-op.
    pub async fn apply<F>(&self, mutate: F)
    where
        F: FnOnce(&mut DashboardSummary),
    {
        if let Some(summary) = self.inner.write().await.as_mut() {
            mutate(summary);
        }
    }

    /// Fold one successful upload into the counters.
    pub async fn record_upload(&self, size_bytes: i64) {
        self.apply(|summary| summary.record_upload(size_bytes)).await;
    }

    /// Fold one delete into the counters.
    pub async fn record_delete(&self, size_bytes: i64) {
        self.apply(|summary| summary.record_delete(size_bytes)).await;
    }

    pub async fn snapshot(&self) -> Option<DashboardSummary> {
        self.inner.read().await.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Drop the aggregate. The next `initialize` fetches fresh.
    pub async fn reset(&self) {
        *self.inner.write().await = None;
    }
}
