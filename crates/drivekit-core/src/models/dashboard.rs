use serde::{Deserialize, Serialize};

use super::file::FileRecord;

/// Summary counters shown on the dashboard.
///
/// Adjusted incrementally by upload and delete events rather than refetched,
/// so it may drift from server truth until the next full initialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub user_id: String,
    /// Cumulative storage used, in kilobytes.
    pub storage_used: f64,
    pub folders_this_week: i64,
    pub files_this_week: i64,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

impl DashboardSummary {
    /// Apply the delta of a successful upload: storage grows by the file size
    /// converted to kilobytes, and the weekly file counter grows by one.
    pub fn record_upload(&mut self, size_bytes: i64) {
        self.storage_used += size_bytes as f64 / 1000.0;
        self.files_this_week += 1;
    }

    /// Apply the delta of a delete, reverting what `record_upload` added.
    pub fn record_delete(&mut self, size_bytes: i64) {
        self.storage_used -= size_bytes as f64 / 1000.0;
        self.files_this_week -= 1;
    }
}
