//! In-memory cache backend for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use drivekit_core::models::{FileRecord, SessionRecord};
use drivekit_core::AppError;

use crate::backend::CacheBackend;

/// Backend with the same duplicate and ordering semantics as the SQLite one.
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    media: HashMap<Uuid, FileRecord>,
    sessions: Vec<SessionRecord>,
    next_local_id: i64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::Cache("cache lock poisoned".to_string()))
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get_media(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        Ok(self.lock()?.media.get(&id).cloned())
    }

    async fn put_media(&self, record: &FileRecord) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        if inner.media.contains_key(&record.id) {
            return Err(AppError::Cache(format!(
                "media {} already cached",
                record.id
            )));
        }
        inner.media.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete_media(&self, id: Uuid) -> Result<(), AppError> {
        self.lock()?.media.remove(&id);
        Ok(())
    }

    async fn clear_media(&self) -> Result<(), AppError> {
        self.lock()?.media.clear();
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, AppError> {
        Ok(self.lock()?.sessions.clone())
    }

    async fn put_session(&self, session: &SessionRecord) -> Result<SessionRecord, AppError> {
        let mut inner = self.lock()?;
        inner.next_local_id += 1;
        let stored = SessionRecord {
            local_id: Some(inner.next_local_id),
            ..session.clone()
        };
        inner.sessions.push(stored.clone());
        Ok(stored)
    }

    async fn delete_session(&self, local_id: i64) -> Result<(), AppError> {
        self.lock()?
            .sessions
            .retain(|s| s.local_id != Some(local_id));
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner.media.clear();
        inner.sessions.clear();
        Ok(())
    }
}
