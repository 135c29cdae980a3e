//! In-memory file registry.
//!
//! Ordered, de-duplicated list of known records plus the pagination cursor.
//! Insertion order depends on the path: pagination appends, new arrivals
//! prepend. Id uniqueness is enforced on every insert.

use std::collections::HashSet;

use tokio::sync::RwLock;
use uuid::Uuid;

use drivekit_core::models::{FileRecord, Page};

#[derive(Default)]
struct RegistryState {
    files: Vec<FileRecord>,
    ids: HashSet<Uuid>,
    cursor: Option<String>,
}

/// Registry of known file records for one session.
#[derive(Default)]
pub struct FileRegistry {
    inner: RwLock<RegistryState>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records from a paginated fetch, skipping ids already present,
    /// and returns how many were added. Relative order of the new records is
    /// preserved.
    pub async fn add_many(&self, records: Vec<FileRecord>) -> usize {
        let mut state = self.inner.write().await;
        let mut added = 0;
        for record in records {
            if state.ids.insert(record.id) {
                state.files.push(record);
                added += 1;
            }
        }
        added
    }

    /// Prepend a single record, newest first. A duplicate id is a no-op.
    pub async fn add_one(&self, record: FileRecord) -> bool {
        let mut state = self.inner.write().await;
        if !state.ids.insert(record.id) {
            return false;
        }
        state.files.insert(0, record);
        true
    }

    /// Remove a record by id. Absent ids are a no-op.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut state = self.inner.write().await;
        if !state.ids.remove(&id) {
            return false;
        }
        state.files.retain(|f| f.id != id);
        true
    }

    /// Remove and hand back a record, for mutate-and-reinsert flows.
    pub async fn take(&self, id: Uuid) -> Option<FileRecord> {
        let mut state = self.inner.write().await;
        if !state.ids.remove(&id) {
            return None;
        }
        let position = state.files.iter().position(|f| f.id == id)?;
        Some(state.files.remove(position))
    }

    /// Flip the privacy flag of a record in place, keeping its position.
    pub async fn set_privacy(&self, id: Uuid, is_private: bool) -> bool {
        let mut state = self.inner.write().await;
        match state.files.iter_mut().find(|f| f.id == id) {
            Some(record) => {
                record.is_private = is_private;
                true
            }
            None => false,
        }
    }

    /// Apply one page of the listing: append its records and store its cursor.
    pub async fn apply_page(&self, page: Page<FileRecord>) -> usize {
        let added = self.add_many(page.data).await;
        self.set_cursor(page.cursor).await;
        added
    }

    /// Store the pagination cursor; `None` means no further pages.
    pub async fn set_cursor(&self, cursor: Option<String>) {
        self.inner.write().await.cursor = cursor;
    }

    pub async fn cursor(&self) -> Option<String> {
        self.inner.read().await.cursor.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<FileRecord> {
        self.inner
            .read()
            .await
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.inner.read().await.ids.contains(&id)
    }

    pub async fn snapshot(&self) -> Vec<FileRecord> {
        self.inner.read().await.files.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.files.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.files.is_empty()
    }

    /// Drop every record and the cursor. Used on account switch.
    pub async fn reset(&self) {
        let mut state = self.inner.write().await;
        state.files.clear();
        state.ids.clear();
        state.cursor = None;
    }
}
