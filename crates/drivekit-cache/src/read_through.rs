//! Two-tier read-through media cache.
//!
//! Lookup order is hot map, then backend, then the caller-supplied remote
//! fetch. Whatever a lower tier returns is written into the tiers above it.
//! Backend write failures degrade to a warning; the hot tier alone is enough
//! to serve the session.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use drivekit_core::models::FileRecord;
use drivekit_core::AppError;

use crate::backend::CacheBackend;

pub struct MediaCache {
    hot: RwLock<HashMap<Uuid, FileRecord>>,
    backend: Arc<dyn CacheBackend>,
}

impl MediaCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            hot: RwLock::new(HashMap::new()),
            backend,
        }
    }

    /// Look up a record, falling back to `fetch` on a full miss.
    ///
    /// A remote failure propagates untouched so the caller sees the original
    /// transport or API error.
    pub async fn get<F, Fut>(&self, id: Uuid, fetch: F) -> Result<FileRecord, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FileRecord, AppError>>,
    {
        if let Some(record) = self.lookup(id).await {
            return Ok(record);
        }

        let record = fetch().await?;
        self.insert(record.clone()).await;
        Ok(record)
    }

    /// Check both local tiers without going remote.
    pub async fn lookup(&self, id: Uuid) -> Option<FileRecord> {
        if let Some(record) = self.hot.read().await.get(&id) {
            return Some(record.clone());
        }

        match self.backend.get_media(id).await {
            Ok(Some(record)) => {
                self.hot.write().await.insert(id, record.clone());
                Some(record)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(media_id = %id, error = %err, "Cache backend read failed");
                None
            }
        }
    }

    /// Insert into both tiers. Backend rejections, including duplicates, are
    /// logged and dropped.
    pub async fn insert(&self, record: FileRecord) {
        let id = record.id;
        self.hot.write().await.insert(id, record.clone());

        if let Err(err) = self.backend.put_media(&record).await {
            tracing::warn!(media_id = %id, error = %err, "Cache backend write skipped");
        }
    }

    /// Drop a record from both tiers.
    pub async fn remove(&self, id: Uuid) {
        self.hot.write().await.remove(&id);

        if let Err(err) = self.backend.delete_media(id).await {
            tracing::warn!(media_id = %id, error = %err, "Cache backend delete failed");
        }
    }

    /// Wipe the hot tier and the backend media table. Used on account switch;
    /// stored sessions are left alone.
    pub async fn clear(&self) -> Result<(), AppError> {
        self.hot.write().await.clear();
        self.backend.clear_media().await
    }
}
