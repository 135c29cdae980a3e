use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use drivekit_cache::{MediaCache, MemoryCache};
use drivekit_core::models::{DashboardSummary, FileRecord, Identity};
use drivekit_sync::{
    DashboardStore, EventEnvelope, FileRegistry, InProcessTransport, RealtimeTransport, SyncBridge,
};

const WAIT: Duration = Duration::from_secs(2);

struct Session {
    bridge: SyncBridge,
    registry: Arc<FileRegistry>,
    dashboard: Arc<DashboardStore>,
    media: Arc<MediaCache>,
}

fn session(transport: Arc<InProcessTransport>) -> Session {
    let registry = Arc::new(FileRegistry::new());
    let dashboard = Arc::new(DashboardStore::new());
    let media = Arc::new(MediaCache::new(Arc::new(MemoryCache::new())));
    let bridge = SyncBridge::new(
        registry.clone(),
        dashboard.clone(),
        media.clone(),
        transport,
    );
    Session {
        bridge,
        registry,
        dashboard,
        media,
    }
}

fn identity(id: &str) -> Identity {
    Identity {
        id: id.to_string(),
        email: format!("{}@example.com", id),
    }
}

fn record(id: Uuid, user_id: &str, size: i64) -> FileRecord {
    FileRecord {
        id,
        name: "notes.txt".to_string(),
        folder_id: None,
        user_id: user_id.to_string(),
        public_id: "pub-1".to_string(),
        content_type: "text/plain".to_string(),
        is_private: false,
        size,
        created_at: None,
        updated_at: None,
    }
}

async fn initialize_dashboard(dashboard: &DashboardStore, user_id: &str) {
    dashboard
        .initialize(|| async {
            Ok(DashboardSummary {
                user_id: user_id.to_string(),
                storage_used: 10.0,
                folders_this_week: 0,
                files_this_week: 1,
                files: Vec::new(),
            })
        })
        .await
        .unwrap();
}

/// Poll until the condition holds, panicking on timeout.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(WAIT, async {
        loop {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition was not reached in time");
}

/// Test that an upload broadcast by one session lands in another session's
/// registry and dashboard.
#[tokio::test]
async fn test_remote_upload_applies_locally() {
    let transport = Arc::new(InProcessTransport::default());
    let other = session(transport.clone());
    initialize_dashboard(&other.dashboard, "viewer-1").await;
    other.bridge.connect(identity("viewer-1")).await.unwrap();

    let uploaded = record(Uuid::new_v4(), "owner-1", 3000);
    let envelope = EventEnvelope::new("upload", serde_json::to_value(&uploaded).unwrap());
    transport.emit(envelope).await.unwrap();

    let registry = other.registry.clone();
    eventually(|| {
        let registry = registry.clone();
        async move { registry.contains(uploaded.id).await }
    })
    .await;

    let summary = other.dashboard.snapshot().await.unwrap();
    assert_eq!(summary.storage_used, 13.0);
    assert_eq!(summary.files_this_week, 2);
}

/// Test that a malformed payload is swallowed and later well-formed events
/// still apply; the listener must survive garbage.
#[tokio::test]
async fn test_malformed_event_does_not_break_the_bridge() {
    let transport = Arc::new(InProcessTransport::default());
    let other = session(transport.clone());
    other.bridge.connect(identity("viewer-1")).await.unwrap();

    transport
        .emit(EventEnvelope::new("upload", serde_json::json!(42)))
        .await
        .unwrap();

    let uploaded = record(Uuid::new_v4(), "owner-1", 3000);
    transport
        .emit(EventEnvelope::new(
            "upload",
            serde_json::to_value(&uploaded).unwrap(),
        ))
        .await
        .unwrap();

    let registry = other.registry.clone();
    eventually(|| {
        let registry = registry.clone();
        async move { registry.contains(uploaded.id).await }
    })
    .await;
    assert_eq!(other.registry.len().await, 1);
}

/// Test the privacy toggle round trip: the flag flips and the registry ends
/// up with exactly one entry for the id.
#[tokio::test]
async fn test_toggle_event_flips_without_duplicate() {
    let transport = Arc::new(InProcessTransport::default());
    let other = session(transport.clone());
    let id = Uuid::new_v4();
    other.registry.add_one(record(id, "owner-1", 3000)).await;
    other.bridge.connect(identity("viewer-1")).await.unwrap();

    other.bridge.emit_toggle(id, true).await.unwrap();

    let registry = other.registry.clone();
    eventually(|| {
        let registry = registry.clone();
        async move {
            let snapshot = registry.snapshot().await;
            snapshot.len() == 1 && snapshot[0].is_private
        }
    })
    .await;
}

/// Test that a delete event removes the record and reverts the dashboard by
/// the same delta the upload applied.
#[tokio::test]
async fn test_delete_event_reverts_aggregate() {
    let transport = Arc::new(InProcessTransport::default());
    let other = session(transport.clone());
    initialize_dashboard(&other.dashboard, "viewer-1").await;

    let deleted = record(Uuid::new_v4(), "owner-1", 3000);
    other.registry.add_one(deleted.clone()).await;
    other.bridge.connect(identity("viewer-1")).await.unwrap();

    other.bridge.emit_delete(&deleted).await.unwrap();

    let registry = other.registry.clone();
    eventually(|| {
        let registry = registry.clone();
        async move { registry.is_empty().await }
    })
    .await;

    let summary = other.dashboard.snapshot().await.unwrap();
    assert_eq!(summary.storage_used, 7.0);
    assert_eq!(summary.files_this_week, 0);
}

/// Test that a per-resource privacy event evicts the cached record.
#[tokio::test]
async fn test_media_event_evicts_cache_entry() {
    let transport = Arc::new(InProcessTransport::default());
    let other = session(transport.clone());
    let id = Uuid::new_v4();
    let cached = record(id, "viewer-1", 3000);
    other.media.insert(cached.clone()).await;
    other.registry.add_one(cached).await;
    other.bridge.connect(identity("viewer-1")).await.unwrap();

    transport
        .emit(EventEnvelope::new(
            format!("media-{}", id),
            serde_json::json!(true),
        ))
        .await
        .unwrap();

    let media = other.media.clone();
    eventually(|| {
        let media = media.clone();
        async move { media.lookup(id).await.is_none() }
    })
    .await;

    let snapshot = other.registry.snapshot().await;
    assert!(snapshot[0].is_private);
}

/// Test that connecting with a new identity replaces the previous
/// connection rather than stacking listeners.
#[tokio::test]
async fn test_reconnect_replaces_identity() {
    let transport = Arc::new(InProcessTransport::default());
    let other = session(transport.clone());

    other.bridge.connect(identity("first")).await.unwrap();
    other.bridge.connect(identity("second")).await.unwrap();
    assert_eq!(other.bridge.identity().await.unwrap().id, "second");

    other.bridge.disconnect().await;
    assert!(other.bridge.identity().await.is_none());
}
