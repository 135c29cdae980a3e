use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use drivekit_client::ProgressFn;
use drivekit_core::models::{
    DashboardSummary, FileRecord, FileSource, TaskSection, TaskStatus,
};
use drivekit_core::AppError;
use drivekit_sync::{
    DashboardStore, FileRegistry, FileUploader, InProcessTransport, QueueEvent, UploadQueue,
    UploadQueueConfig,
};

const WAIT: Duration = Duration::from_secs(2);

/// Scripted behavior for one file, keyed by file name.
#[derive(Clone)]
enum Behavior {
    Succeed,
    FailWith(AppError),
    /// Block until the notify fires, reporting 50% first.
    Hold(Arc<Notify>),
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<String, Behavior>,
    active: usize,
    overlap: bool,
}

/// Uploader double that records transfer concurrency and follows per-file
/// scripts.
#[derive(Default)]
struct MockUploader {
    state: Mutex<MockState>,
}

impl MockUploader {
    fn script(&self, name: &str, behavior: Behavior) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(name.to_string(), behavior);
    }

    fn overlap_seen(&self) -> bool {
        self.state.lock().unwrap().overlap
    }

    fn record_for(file: &FileSource) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            name: file.name.clone(),
            folder_id: None,
            user_id: "user-1".to_string(),
            public_id: format!("pub-{}", file.name),
            content_type: file.content_type.clone(),
            is_private: false,
            size: file.size(),
            created_at: None,
            updated_at: None,
        }
    }
}

#[async_trait]
impl FileUploader for MockUploader {
    async fn upload(
        &self,
        file: FileSource,
        _folder_id: Option<Uuid>,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<FileRecord, AppError> {
        let behavior = {
            let mut state = self.state.lock().unwrap();
            state.active += 1;
            if state.active > 1 {
                state.overlap = true;
            }
            state
                .scripts
                .get(&file.name)
                .cloned()
                .unwrap_or(Behavior::Succeed)
        };

        let result = match behavior {
            Behavior::Succeed => {
                on_progress(100);
                Ok(Self::record_for(&file))
            }
            Behavior::FailWith(err) => Err(err),
            Behavior::Hold(release) => {
                on_progress(50);
                tokio::select! {
                    _ = cancel.cancelled() => Err(AppError::Cancelled),
                    _ = release.notified() => {
                        on_progress(100);
                        Ok(Self::record_for(&file))
                    }
                }
            }
        };

        self.state.lock().unwrap().active -= 1;
        result
    }
}

struct Harness {
    queue: UploadQueue,
    uploader: Arc<MockUploader>,
    registry: Arc<FileRegistry>,
    dashboard: Arc<DashboardStore>,
    transport: Arc<InProcessTransport>,
}

fn harness_with(config: UploadQueueConfig) -> Harness {
    let uploader = Arc::new(MockUploader::default());
    let registry = Arc::new(FileRegistry::new());
    let dashboard = Arc::new(DashboardStore::new());
    let transport = Arc::new(InProcessTransport::default());
    let queue = UploadQueue::new(
        uploader.clone(),
        registry.clone(),
        dashboard.clone(),
        transport.clone(),
        config,
    );
    Harness {
        queue,
        uploader,
        registry,
        dashboard,
        transport,
    }
}

fn harness() -> Harness {
    harness_with(UploadQueueConfig::default())
}

fn file(name: &str, size: usize) -> FileSource {
    FileSource::new(name, "application/octet-stream", Bytes::from(vec![0u8; size]))
}

/// Receive queue events until one matches, panicking on timeout.
async fn wait_for<F, T>(
    rx: &mut tokio::sync::broadcast::Receiver<QueueEvent>,
    mut matcher: F,
) -> T
where
    F: FnMut(&QueueEvent) -> Option<T>,
{
    timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if let Some(value) = matcher(&event) {
                return value;
            }
        }
    })
    .await
    .expect("timed out waiting for queue event")
}

/// Test that a batch drains strictly one at a time and in enqueue order:
/// while the first file is held in flight the others stay at progress 0, and
/// releasing it starts the second automatically.
#[tokio::test]
async fn test_batch_drains_serially_in_enqueue_order() {
    let h = harness();
    let release_a = Arc::new(Notify::new());
    let release_b = Arc::new(Notify::new());
    h.uploader.script("a.bin", Behavior::Hold(release_a.clone()));
    h.uploader.script("b.bin", Behavior::Hold(release_b.clone()));

    let mut events = h.queue.subscribe();
    let ids = h
        .queue
        .enqueue(
            vec![file("a.bin", 100), file("b.bin", 100), file("c.bin", 100)],
            None,
        )
        .await;

    let started = wait_for(&mut events, |e| match e {
        QueueEvent::Started { task_id } => Some(*task_id),
        _ => None,
    })
    .await;
    assert_eq!(started, ids[0]);

    // First file is mid-transfer; the rest have not been claimed.
    wait_for(&mut events, |e| match e {
        QueueEvent::Progress { task_id, percent } if *task_id == ids[0] => Some(*percent),
        _ => None,
    })
    .await;
    let pending = h.queue.pending();
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[1].progress, 0);
    assert_eq!(pending[2].progress, 0);

    release_a.notify_one();
    wait_for(&mut events, |e| match e {
        QueueEvent::Completed { task_id, .. } if *task_id == ids[0] => Some(()),
        _ => None,
    })
    .await;

    let second = wait_for(&mut events, |e| match e {
        QueueEvent::Started { task_id } => Some(*task_id),
        _ => None,
    })
    .await;
    assert_eq!(second, ids[1]);

    let completed = h.queue.completed();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, ids[0]);
    assert_eq!(completed[0].progress, 100);
    assert_eq!(completed[0].status, TaskStatus::Completed);

    release_b.notify_one();
}

/// Test that no two transfers ever run at the same time, even for a large
/// batch enqueued at once.
#[tokio::test]
async fn test_transfers_never_overlap() {
    let h = harness();
    let mut events = h.queue.subscribe();
    let files = (0..8).map(|i| file(&format!("f{}.bin", i), 50)).collect();
    let ids = h.queue.enqueue(files, None).await;

    for _ in 0..ids.len() {
        wait_for(&mut events, |e| match e {
            QueueEvent::Completed { .. } => Some(()),
            _ => None,
        })
        .await;
    }

    assert!(!h.uploader.overlap_seen());
    assert_eq!(h.queue.completed().len(), 8);
    assert!(h.queue.pending().is_empty());
}

/// Test that reported progress is the raw percentage minus the display
/// offset, floored at zero.
#[tokio::test]
async fn test_progress_events_are_offset() {
    let h = harness();
    let release = Arc::new(Notify::new());
    h.uploader.script("a.bin", Behavior::Hold(release.clone()));

    let mut events = h.queue.subscribe();
    let ids = h.queue.enqueue(vec![file("a.bin", 100)], None).await;

    let percent = wait_for(&mut events, |e| match e {
        QueueEvent::Progress { task_id, percent } if *task_id == ids[0] => Some(*percent),
        _ => None,
    })
    .await;
    assert_eq!(percent, 40);

    release.notify_one();
    wait_for(&mut events, |e| match e {
        QueueEvent::Completed { .. } => Some(()),
        _ => None,
    })
    .await;
}

/// Test that a server-provided failure message is carried verbatim into the
/// failed task, not replaced by a generic fallback.
#[tokio::test]
async fn test_failure_carries_server_message() {
    let h = harness();
    h.uploader.script(
        "a.bin",
        Behavior::FailWith(AppError::Api {
            status: 507,
            message: "disk full".to_string(),
        }),
    );

    let mut events = h.queue.subscribe();
    let ids = h.queue.enqueue(vec![file("a.bin", 100)], None).await;

    let message = wait_for(&mut events, |e| match e {
        QueueEvent::Failed { task_id, message } if *task_id == ids[0] => Some(message.clone()),
        _ => None,
    })
    .await;
    assert_eq!(message, "disk full");

    let failed = h.queue.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error.as_deref(), Some("disk full"));
    assert!(h.queue.pending().is_empty());
}

/// Test that a failure with no usable message falls back to the literal
/// "Upload failed".
#[tokio::test]
async fn test_failure_without_message_uses_fallback() {
    let h = harness();
    h.uploader.script(
        "a.bin",
        Behavior::FailWith(AppError::Internal("serde blew up".to_string())),
    );

    let mut events = h.queue.subscribe();
    h.queue.enqueue(vec![file("a.bin", 100)], None).await;

    let message = wait_for(&mut events, |e| match e {
        QueueEvent::Failed { message, .. } => Some(message.clone()),
        _ => None,
    })
    .await;
    assert_eq!(message, "Upload failed");
}

/// Test that cancelling an in-flight task removes it from pending without
/// creating a failed or completed entry, and the queue moves on.
#[tokio::test]
async fn test_cancel_in_flight_is_silent() {
    let h = harness();
    let release = Arc::new(Notify::new());
    h.uploader.script("a.bin", Behavior::Hold(release.clone()));

    let mut events = h.queue.subscribe();
    let ids = h.queue.enqueue(vec![file("a.bin", 100)], None).await;

    wait_for(&mut events, |e| match e {
        QueueEvent::Started { task_id } if *task_id == ids[0] => Some(()),
        _ => None,
    })
    .await;

    h.queue.cancel_task(ids[0]).unwrap();
    assert!(h.queue.pending().is_empty());

    // Give the aborted transfer time to resolve, then verify nothing leaked
    // into the other sections.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.queue.failed().is_empty());
    assert!(h.queue.completed().is_empty());

    // The queue is not wedged: a fresh enqueue still drains.
    let next = h.queue.enqueue(vec![file("b.bin", 100)], None).await;
    wait_for(&mut events, |e| match e {
        QueueEvent::Completed { task_id, .. } if *task_id == next[0] => Some(()),
        _ => None,
    })
    .await;
}

/// Test that cancelling an unknown task is rejected while cancelling an
/// already-finished task is a harmless no-op.
#[tokio::test]
async fn test_cancel_requires_pending_task() {
    let h = harness();
    assert!(matches!(
        h.queue.cancel_task(Uuid::new_v4()),
        Err(AppError::NotFound(_))
    ));

    let mut events = h.queue.subscribe();
    let ids = h.queue.enqueue(vec![file("a.bin", 100)], None).await;
    wait_for(&mut events, |e| match e {
        QueueEvent::Completed { .. } => Some(()),
        _ => None,
    })
    .await;

    h.queue.cancel_task(ids[0]).unwrap();
    assert_eq!(h.queue.completed().len(), 1);
}

/// Test that retrying a failed task re-admits it with progress reset and it
/// completes once the underlying failure is gone.
#[tokio::test]
async fn test_retry_reruns_failed_task() {
    let h = harness();
    h.uploader.script(
        "a.bin",
        Behavior::FailWith(AppError::Transport("connection reset".to_string())),
    );

    let mut events = h.queue.subscribe();
    let ids = h.queue.enqueue(vec![file("a.bin", 100)], None).await;

    wait_for(&mut events, |e| match e {
        QueueEvent::Failed { task_id, .. } if *task_id == ids[0] => Some(()),
        _ => None,
    })
    .await;
    assert_eq!(h.queue.failed().len(), 1);

    // The network recovered.
    h.uploader.script("a.bin", Behavior::Succeed);
    h.queue.retry_task(ids[0]).await.unwrap();

    wait_for(&mut events, |e| match e {
        QueueEvent::Completed { task_id, .. } if *task_id == ids[0] => Some(()),
        _ => None,
    })
    .await;
    assert!(h.queue.failed().is_empty());
    assert_eq!(h.queue.completed().len(), 1);
}

/// Test that retry only operates on tasks in the failed list.
#[tokio::test]
async fn test_retry_requires_failed_task() {
    let h = harness();
    let release = Arc::new(Notify::new());
    h.uploader.script("a.bin", Behavior::Hold(release.clone()));

    let mut events = h.queue.subscribe();
    let ids = h.queue.enqueue(vec![file("a.bin", 100)], None).await;
    wait_for(&mut events, |e| match e {
        QueueEvent::Started { .. } => Some(()),
        _ => None,
    })
    .await;

    assert!(matches!(
        h.queue.retry_task(ids[0]).await,
        Err(AppError::NotFound(_))
    ));
    release.notify_one();
}

/// Test that removal only succeeds against the section actually holding the
/// task, and that the in-flight task must be cancelled rather than removed.
#[tokio::test]
async fn test_remove_task_respects_sections() {
    let h = harness();
    let release = Arc::new(Notify::new());
    h.uploader.script("held.bin", Behavior::Hold(release.clone()));

    let mut events = h.queue.subscribe();
    let ids = h
        .queue
        .enqueue(vec![file("held.bin", 100), file("queued.bin", 100)], None)
        .await;

    wait_for(&mut events, |e| match e {
        QueueEvent::Started { task_id } if *task_id == ids[0] => Some(()),
        _ => None,
    })
    .await;

    // In-flight pending task: removal is a caller error.
    assert!(matches!(
        h.queue.remove_task(ids[0], TaskSection::Pending),
        Err(AppError::InvalidState(_))
    ));
    // Wrong section for a task that exists elsewhere.
    assert!(matches!(
        h.queue.remove_task(ids[1], TaskSection::Failed),
        Err(AppError::NotFound(_))
    ));
    // Queued-but-unclaimed task can be removed from pending.
    h.queue.remove_task(ids[1], TaskSection::Pending).unwrap();
    assert_eq!(h.queue.pending().len(), 1);

    release.notify_one();
    wait_for(&mut events, |e| match e {
        QueueEvent::Completed { task_id, .. } if *task_id == ids[0] => Some(()),
        _ => None,
    })
    .await;

    h.queue.remove_task(ids[0], TaskSection::Completed).unwrap();
    assert!(h.queue.completed().is_empty());
}

/// Test that completed tasks are reaped automatically after the display TTL.
#[tokio::test]
async fn test_completed_tasks_expire() {
    let h = harness_with(UploadQueueConfig {
        progress_display_offset: 10,
        completed_task_ttl: Duration::from_millis(100),
        completed_reap_interval: Duration::from_millis(20),
    });

    let mut events = h.queue.subscribe();
    let ids = h.queue.enqueue(vec![file("a.bin", 100)], None).await;

    wait_for(&mut events, |e| match e {
        QueueEvent::Completed { .. } => Some(()),
        _ => None,
    })
    .await;
    assert_eq!(h.queue.completed().len(), 1);

    wait_for(&mut events, |e| match e {
        QueueEvent::Removed { task_id, section }
            if *task_id == ids[0] && *section == TaskSection::Completed =>
        {
            Some(())
        }
        _ => None,
    })
    .await;
    assert!(h.queue.completed().is_empty());
}

/// Test that a successful upload fans out to the registry, adjusts the
/// dashboard by exactly size/1000 and one file, and broadcasts the record.
#[tokio::test]
async fn test_success_fans_out_to_stores_and_broadcast() {
    let h = harness();
    h.dashboard
        .initialize(|| async {
            Ok(DashboardSummary {
                user_id: "user-1".to_string(),
                storage_used: 1.0,
                folders_this_week: 0,
                files_this_week: 0,
                files: Vec::new(),
            })
        })
        .await
        .unwrap();

    let mut outbound = h.transport.subscribe();
    let mut events = h.queue.subscribe();
    h.queue.enqueue(vec![file("a.bin", 5000)], None).await;

    let record = wait_for(&mut events, |e| match e {
        QueueEvent::Completed { record, .. } => Some(record.clone()),
        _ => None,
    })
    .await;

    assert!(h.registry.contains(record.id).await);

    let summary = h.dashboard.snapshot().await.unwrap();
    assert_eq!(summary.storage_used, 6.0);
    assert_eq!(summary.files_this_week, 1);

    let envelope = timeout(WAIT, outbound.recv())
        .await
        .expect("timed out waiting for broadcast")
        .unwrap();
    assert_eq!(envelope.event, "upload");
    let broadcast: FileRecord = serde_json::from_value(envelope.payload).unwrap();
    assert_eq!(broadcast.id, record.id);
}

/// Test that a delete following an upload reverts the dashboard deltas.
#[tokio::test]
async fn test_delete_reverts_dashboard_delta() {
    let h = harness();
    h.dashboard
        .initialize(|| async {
            Ok(DashboardSummary {
                user_id: "user-1".to_string(),
                storage_used: 0.0,
                folders_this_week: 0,
                files_this_week: 0,
                files: Vec::new(),
            })
        })
        .await
        .unwrap();

    let mut events = h.queue.subscribe();
    h.queue.enqueue(vec![file("a.bin", 5000)], None).await;
    let record = wait_for(&mut events, |e| match e {
        QueueEvent::Completed { record, .. } => Some(record.clone()),
        _ => None,
    })
    .await;

    h.registry.remove(record.id).await;
    h.dashboard.record_delete(record.size).await;

    let summary = h.dashboard.snapshot().await.unwrap();
    assert_eq!(summary.storage_used, 0.0);
    assert_eq!(summary.files_this_week, 0);
}
