//! Upload queue engine: serialized pipeline, progress, cancel/retry, fan-out.
//!
//! Concurrency is capped at one transfer so the backend never receives
//! overlapping uploads from the same session. The claim that marks a task in
//! flight happens in a single critical section; selection and claim cannot be
//! interleaved by another drain trigger. Task failures are converted into
//! task state, they never escape the task boundary.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use drivekit_client::ProgressFn;
use drivekit_core::models::{FileRecord, FileSource, TaskSection, TaskStatus};
use drivekit_core::{AppError, ClientConfig};

use crate::bridge::{EventEnvelope, RealtimeTransport, UPLOAD_EVENT};
use crate::dashboard::DashboardStore;
use crate::registry::FileRegistry;
use crate::uploader::FileUploader;

/// Visible progress lags raw transfer progress by a fixed buffer, floored at
/// zero, absorbing the gap between "bytes sent" and "server processed". 100
/// is only ever set on explicit completion.
pub fn display_progress(raw: u8, offset: u8) -> u8 {
    raw.saturating_sub(offset)
}

#[derive(Clone)]
pub struct UploadQueueConfig {
    pub progress_display_offset: u8,
    /// How long a completed task stays visible before auto-removal.
    pub completed_task_ttl: Duration,
    /// Interval between runs of the completed-task reaper.
    pub completed_reap_interval: Duration,
}

impl Default for UploadQueueConfig {
    fn default() -> Self {
        Self {
            progress_display_offset: 10,
            completed_task_ttl: Duration::from_secs(10),
            completed_reap_interval: Duration::from_millis(1000),
        }
    }
}

impl From<&ClientConfig> for UploadQueueConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            progress_display_offset: config.progress_display_offset,
            completed_task_ttl: Duration::from_secs(config.completed_task_ttl_secs),
            completed_reap_interval: Duration::from_millis(config.completed_reap_interval_ms),
        }
    }
}

struct UploadTask {
    id: Uuid,
    file: FileSource,
    /// Raw percentage as reported by the transport.
    progress: u8,
    status: TaskStatus,
    error: Option<String>,
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
    completed_at: Option<Instant>,
}

/// Observer view of one task. `progress` is already display-offset for
/// uploading tasks.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub name: String,
    pub size: i64,
    pub progress: u8,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum QueueEvent {
    Started { task_id: Uuid },
    Progress { task_id: Uuid, percent: u8 },
    Completed { task_id: Uuid, record: FileRecord },
    Failed { task_id: Uuid, message: String },
    Removed { task_id: Uuid, section: TaskSection },
}

#[derive(Default)]
struct QueueState {
    pending: Vec<UploadTask>,
    failed: Vec<UploadTask>,
    completed: Vec<UploadTask>,
    /// Parent-folder context captured at enqueue time, cleared on completion.
    folder_id: Option<Uuid>,
    /// Id of the one task whose transfer is active.
    in_flight: Option<Uuid>,
}

struct Claim {
    id: Uuid,
    file: FileSource,
    folder_id: Option<Uuid>,
    cancel: CancellationToken,
}

struct QueueInner {
    state: Mutex<QueueState>,
    uploader: Arc<dyn FileUploader>,
    registry: Arc<FileRegistry>,
    dashboard: Arc<DashboardStore>,
    transport: Arc<dyn RealtimeTransport>,
    config: UploadQueueConfig,
    events_tx: broadcast::Sender<QueueEvent>,
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            // Every mutation leaves the task lists consistent, so the state
            // is still usable after a panic elsewhere.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Serialized upload pipeline for one session.
///
/// Construct with the stores it fans out to; drop or call [`shutdown`] to
/// stop the drain loop. Task ids live in exactly one of pending, failed or
/// completed at any time.
///
/// [`shutdown`]: UploadQueue::shutdown
pub struct UploadQueue {
    inner: Arc<QueueInner>,
    wake_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl UploadQueue {
    pub fn new(
        uploader: Arc<dyn FileUploader>,
        registry: Arc<FileRegistry>,
        dashboard: Arc<DashboardStore>,
        transport: Arc<dyn RealtimeTransport>,
        config: UploadQueueConfig,
    ) -> Self {
        let (wake_tx, wake_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (events_tx, _) = broadcast::channel(64);

        let inner = Arc::new(QueueInner {
            state: Mutex::new(QueueState::default()),
            uploader,
            registry,
            dashboard,
            transport,
            config,
            events_tx,
        });

        let loop_inner = inner.clone();
        tokio::spawn(async move {
            Self::drain_loop(loop_inner, wake_rx, shutdown_rx).await;
        });

        Self {
            inner,
            wake_tx,
            shutdown_tx,
        }
    }

    /// Add a batch of files to the pending queue and trigger the drain loop.
    ///
    /// The folder context applies to the whole batch and is cleared when an
    /// upload completes. Size and extension validation happen upstream in the
    /// file-selection surface.
    pub async fn enqueue(&self, files: Vec<FileSource>, folder_id: Option<Uuid>) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(files.len());
        {
            let mut state = self.inner.lock();
            state.folder_id = folder_id;
            for file in files {
                let task = UploadTask {
                    id: Uuid::new_v4(),
                    file,
                    progress: 0,
                    status: TaskStatus::Uploading,
                    error: None,
                    cancel: CancellationToken::new(),
                    created_at: Utc::now(),
                    completed_at: None,
                };
                tracing::info!(task_id = %task.id, name = %task.file.name, "Task enqueued");
                ids.push(task.id);
                state.pending.push(task);
            }
        }
        let _ = self.wake_tx.send(()).await;
        ids
    }

    /// Re-admit a failed task to the pending queue with progress reset and a
    /// fresh cancellation handle.
    pub async fn retry_task(&self, task_id: Uuid) -> Result<(), AppError> {
        {
            let mut state = self.inner.lock();
            let position = state
                .failed
                .iter()
                .position(|t| t.id == task_id)
                .ok_or_else(|| AppError::NotFound(format!("no failed task {}", task_id)))?;

            let mut task = state.failed.remove(position);
            task.progress = 0;
            task.status = TaskStatus::Uploading;
            task.error = None;
            task.cancel = CancellationToken::new();
            state.pending.push(task);
        }
        tracing::info!(task_id = %task_id, "Task re-queued for retry");
        let _ = self.wake_tx.send(()).await;
        Ok(())
    }

    /// Cancel a pending task: signal its abort handle and drop it from the
    /// queue. No failed or completed entry is created; a transfer already in
    /// flight resolves as cancelled and is discarded. Cancelling a task that
    /// already finished is a no-op.
    pub fn cancel_task(&self, task_id: Uuid) -> Result<(), AppError> {
        let task = {
            let mut state = self.inner.lock();
            let position = match state
                .pending
                .iter()
                .position(|t| t.id == task_id && t.status == TaskStatus::Uploading)
            {
                Some(position) => position,
                None => {
                    let finished = state.failed.iter().any(|t| t.id == task_id)
                        || state.completed.iter().any(|t| t.id == task_id);
                    if finished {
                        return Ok(());
                    }
                    return Err(AppError::NotFound(format!("no pending task {}", task_id)));
                }
            };
            state.pending.remove(position)
        };
        task.cancel.cancel();

        tracing::info!(task_id = %task_id, "Task cancelled");
        let _ = self.inner.events_tx.send(QueueEvent::Removed {
            task_id,
            section: TaskSection::Pending,
        });
        Ok(())
    }

    /// Remove a task from exactly the named section. The in-flight pending
    /// task must go through [`cancel_task`] instead.
    ///
    /// [`cancel_task`]: UploadQueue::cancel_task
    pub fn remove_task(&self, task_id: Uuid, section: TaskSection) -> Result<(), AppError> {
        {
            let mut state = self.inner.lock();
            if section == TaskSection::Pending && state.in_flight == Some(task_id) {
                return Err(AppError::InvalidState(format!(
                    "task {} is in flight, cancel it instead",
                    task_id
                )));
            }

            let list = match section {
                TaskSection::Pending => &mut state.pending,
                TaskSection::Failed => &mut state.failed,
                TaskSection::Completed => &mut state.completed,
            };
            let position = list
                .iter()
                .position(|t| t.id == task_id)
                .ok_or_else(|| AppError::NotFound(format!("no {} task {}", section, task_id)))?;
            list.remove(position);
        }

        let _ = self
            .inner
            .events_tx
            .send(QueueEvent::Removed { task_id, section });
        Ok(())
    }

    pub fn pending(&self) -> Vec<TaskSnapshot> {
        let state = self.inner.lock();
        state
            .pending
            .iter()
            .map(|t| Self::snapshot_of(t, self.inner.config.progress_display_offset))
            .collect()
    }

    pub fn failed(&self) -> Vec<TaskSnapshot> {
        let state = self.inner.lock();
        state
            .failed
            .iter()
            .map(|t| Self::snapshot_of(t, self.inner.config.progress_display_offset))
            .collect()
    }

    pub fn completed(&self) -> Vec<TaskSnapshot> {
        let state = self.inner.lock();
        state
            .completed
            .iter()
            .map(|t| Self::snapshot_of(t, self.inner.config.progress_display_offset))
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Stop the drain loop. In-flight transfers are not awaited.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    fn snapshot_of(task: &UploadTask, offset: u8) -> TaskSnapshot {
        let progress = match task.status {
            TaskStatus::Uploading => display_progress(task.progress, offset),
            _ => task.progress,
        };
        TaskSnapshot {
            id: task.id,
            name: task.file.name.clone(),
            size: task.file.size(),
            progress,
            status: task.status,
            error: task.error.clone(),
            created_at: task.created_at,
        }
    }

    async fn drain_loop(
        inner: Arc<QueueInner>,
        mut wake_rx: mpsc::Receiver<()>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            offset = inner.config.progress_display_offset,
            ttl_secs = inner.config.completed_task_ttl.as_secs(),
            "Upload queue started"
        );

        let (reaper_shutdown_tx, mut reaper_shutdown_rx) = mpsc::channel::<()>(1);
        let reaper_inner = inner.clone();
        let reap_interval = inner.config.completed_reap_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(reap_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => Self::reap_completed(&reaper_inner),
                    _ = reaper_shutdown_rx.recv() => break,
                }
            }
        });

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Upload queue shutting down");
                    let _ = reaper_shutdown_tx.send(()).await;
                    break;
                }
                wake = wake_rx.recv() => {
                    if wake.is_none() {
                        let _ = reaper_shutdown_tx.send(()).await;
                        break;
                    }
                    while let Some(claim) = Self::claim_next(&inner) {
                        Self::run_one(&inner, claim).await;
                    }
                }
            }
        }

        tracing::info!("Upload queue stopped");
    }

    /// Select the first task with progress zero and mark it in flight, as one
    /// atomic step under the state lock.
    fn claim_next(inner: &Arc<QueueInner>) -> Option<Claim> {
        let mut state = inner.lock();
        if state.in_flight.is_some() {
            return None;
        }

        let folder_id = state.folder_id;
        // A nonzero-progress task was already claimed by a prior drain cycle.
        let task = state
            .pending
            .iter()
            .find(|t| t.progress == 0 && t.status == TaskStatus::Uploading)?;

        let claim = Claim {
            id: task.id,
            file: task.file.clone(),
            folder_id,
            cancel: task.cancel.clone(),
        };
        state.in_flight = Some(task.id);
        Some(claim)
    }

    async fn run_one(inner: &Arc<QueueInner>, claim: Claim) {
        let task_id = claim.id;
        tracing::info!(task_id = %task_id, name = %claim.file.name, "Upload started");
        let _ = inner.events_tx.send(QueueEvent::Started { task_id });

        let progress_inner = inner.clone();
        let on_progress: ProgressFn = Arc::new(move |raw| {
            Self::apply_progress(&progress_inner, task_id, raw);
        });

        let result = inner
            .uploader
            .upload(claim.file, claim.folder_id, on_progress, claim.cancel.clone())
            .await;

        match result {
            Ok(record) => Self::finish_success(inner, task_id, record).await,
            Err(err) if err.is_cancelled() => {
                // Aborted is neither success nor failure: drop silently.
                let mut state = inner.lock();
                state.pending.retain(|t| t.id != task_id);
                state.in_flight = None;
                tracing::debug!(task_id = %task_id, "Upload aborted");
            }
            Err(err) => Self::finish_failure(inner, task_id, err),
        }
    }

    fn apply_progress(inner: &Arc<QueueInner>, task_id: Uuid, raw: u8) {
        let offset = inner.config.progress_display_offset;
        let percent = {
            let mut state = inner.lock();
            // A cancelled task is already gone from pending; late callbacks
            // from bytes still resolving are dropped here.
            let Some(task) = state.pending.iter_mut().find(|t| t.id == task_id) else {
                return;
            };
            task.progress = raw;
            display_progress(raw, offset)
        };
        let _ = inner
            .events_tx
            .send(QueueEvent::Progress { task_id, percent });
    }

    async fn finish_success(inner: &Arc<QueueInner>, task_id: Uuid, record: FileRecord) {
        let moved = {
            let mut state = inner.lock();
            state.in_flight = None;
            match state.pending.iter().position(|t| t.id == task_id) {
                Some(position) => {
                    let mut task = state.pending.remove(position);
                    task.status = TaskStatus::Completed;
                    task.progress = 100;
                    task.completed_at = Some(Instant::now());
                    state.completed.push(task);
                    state.folder_id = None;
                    true
                }
                // A cancel raced the response; the task is gone and the
                // result is discarded.
                None => false,
            }
        };
        if !moved {
            return;
        }

        inner.registry.add_one(record.clone()).await;
        inner.dashboard.record_upload(record.size).await;

        match serde_json::to_value(&record) {
            Ok(payload) => {
                let envelope = EventEnvelope::new(UPLOAD_EVENT, payload);
                if let Err(err) = inner.transport.emit(envelope).await {
                    tracing::warn!(task_id = %task_id, error = %err, "Upload broadcast failed");
                }
            }
            Err(err) => {
                tracing::warn!(task_id = %task_id, error = %err, "Upload broadcast skipped");
            }
        }

        tracing::info!(task_id = %task_id, file_id = %record.id, "Upload completed");
        let _ = inner
            .events_tx
            .send(QueueEvent::Completed { task_id, record });
    }

    fn finish_failure(inner: &Arc<QueueInner>, task_id: Uuid, err: AppError) {
        let message = err.upload_failure_message();
        let moved = {
            let mut state = inner.lock();
            state.in_flight = None;
            match state.pending.iter().position(|t| t.id == task_id) {
                Some(position) => {
                    let mut task = state.pending.remove(position);
                    task.status = TaskStatus::Failed;
                    task.error = Some(message.clone());
                    state.failed.push(task);
                    true
                }
                None => false,
            }
        };
        if !moved {
            return;
        }

        tracing::warn!(task_id = %task_id, error = %message, "Upload failed");
        let _ = inner
            .events_tx
            .send(QueueEvent::Failed { task_id, message });
    }

    fn reap_completed(inner: &Arc<QueueInner>) {
        let ttl = inner.config.completed_task_ttl;
        let mut expired = Vec::new();
        {
            let mut state = inner.lock();
            state.completed.retain(|task| {
                let keep = task
                    .completed_at
                    .map(|at| at.elapsed() < ttl)
                    .unwrap_or(true);
                if !keep {
                    expired.push(task.id);
                }
                keep
            });
        }
        for task_id in expired {
            tracing::debug!(task_id = %task_id, "Completed task expired");
            let _ = inner.events_tx.send(QueueEvent::Removed {
                task_id,
                section: TaskSection::Completed,
            });
        }
    }
}
