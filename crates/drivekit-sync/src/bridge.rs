//! Realtime sync bridge.
//!
//! Translates the fixed set of inbound push events into registry, dashboard
//! and cache mutations, and carries locally-originated mutations outward. The
//! bridge is a pure event translator; it never polls. Handler failures are
//! logged and swallowed, a malformed payload must not take the connection
//! down. Duplicate or out-of-order deliveries lean on the registry's id
//! de-duplication, nothing more.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use drivekit_cache::MediaCache;
use drivekit_core::models::{FileRecord, Identity, PrivacyUpdate};
use drivekit_core::AppError;

use crate::dashboard::DashboardStore;
use crate::registry::FileRegistry;

/// Event name carrying a freshly uploaded [`FileRecord`].
pub const UPLOAD_EVENT: &str = "upload";
/// Event name carrying the [`FileRecord`] of a deleted file.
pub const DELETE_EVENT: &str = "delete";
/// Event name carrying a privacy toggle payload.
pub const TOGGLE_EVENT: &str = "toggle";
/// Prefix of the per-resource event namespace, keyed by media id.
pub const MEDIA_EVENT_PREFIX: &str = "media-";

/// One named event with its JSON payload, as carried by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Event-based pub/sub over a persistent connection.
///
/// `connect` authenticates with the given identity and hands back the inbound
/// event stream; per-connection delivery is in order, nothing is guaranteed
/// across connections.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn connect(&self, identity: &Identity)
        -> Result<broadcast::Receiver<EventEnvelope>, AppError>;

    async fn emit(&self, envelope: EventEnvelope) -> Result<(), AppError>;

    async fn disconnect(&self);
}

/// Loopback transport over a broadcast channel.
///
/// Every emitted envelope is delivered to every subscriber, which makes one
/// process behave like several connected sessions.
pub struct InProcessTransport {
    sender: broadcast::Sender<EventEnvelope>,
}

impl InProcessTransport {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Observe emissions without going through `connect`.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for InProcessTransport {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl RealtimeTransport for InProcessTransport {
    async fn connect(
        &self,
        identity: &Identity,
    ) -> Result<broadcast::Receiver<EventEnvelope>, AppError> {
        tracing::debug!(user_id = %identity.id, "Realtime transport connected");
        Ok(self.sender.subscribe())
    }

    async fn emit(&self, envelope: EventEnvelope) -> Result<(), AppError> {
        // No subscribers is not a failure; the event simply has no audience.
        let _ = self.sender.send(envelope);
        Ok(())
    }

    async fn disconnect(&self) {}
}

/// Signal surfaced to the UI layer from per-resource privacy events.
#[derive(Debug, Clone)]
pub enum BridgeSignal {
    /// The viewed media became private to this viewer; a full reload is needed.
    ReloadRequired { media_id: Uuid },
    /// The viewed media's privacy flag changed but stays visible.
    PrivacyChanged { media_id: Uuid, is_private: bool },
}

struct Handlers {
    registry: Arc<FileRegistry>,
    dashboard: Arc<DashboardStore>,
    media: Arc<MediaCache>,
    signals: broadcast::Sender<BridgeSignal>,
}

impl Handlers {
    async fn handle_event(
        &self,
        identity: &Identity,
        envelope: EventEnvelope,
    ) -> Result<(), AppError> {
        match envelope.event.as_str() {
            UPLOAD_EVENT => self.on_upload(envelope.payload).await,
            DELETE_EVENT => self.on_delete(envelope.payload).await,
            TOGGLE_EVENT => self.on_toggle(envelope.payload).await,
            event if event.starts_with(MEDIA_EVENT_PREFIX) => {
                let id = event[MEDIA_EVENT_PREFIX.len()..].parse::<Uuid>()?;
                self.on_media_privacy(identity, id, envelope.payload).await
            }
            other => {
                tracing::trace!(event = %other, "Ignoring unhandled realtime event");
                Ok(())
            }
        }
    }

    async fn on_upload(&self, payload: serde_json::Value) -> Result<(), AppError> {
        let record: FileRecord = serde_json::from_value(payload)?;
        let size = record.size;
        let file_id = record.id;

        // Registry dedup gates the aggregate so a duplicate delivery cannot
        // double-count.
        if self.registry.add_one(record).await {
            self.dashboard.record_upload(size).await;
            tracing::debug!(file_id = %file_id, "Remote upload applied");
        }
        Ok(())
    }

    async fn on_delete(&self, payload: serde_json::Value) -> Result<(), AppError> {
        let record: FileRecord = serde_json::from_value(payload)?;

        if self.registry.remove(record.id).await {
            self.dashboard.record_delete(record.size).await;
            tracing::debug!(file_id = %record.id, "Remote delete applied");
        }
        Ok(())
    }

    async fn on_toggle(&self, payload: serde_json::Value) -> Result<(), AppError> {
        let update: PrivacyUpdate = serde_json::from_value(payload)?;

        if let Some(mut record) = self.registry.take(update.id).await {
            record.is_private = update.is_private;
            self.registry.add_one(record).await;
            tracing::debug!(file_id = %update.id, is_private = update.is_private, "Privacy toggle applied");
        }
        Ok(())
    }

    async fn on_media_privacy(
        &self,
        identity: &Identity,
        id: Uuid,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        let is_private: bool = serde_json::from_value(payload)?;
        self.media.remove(id).await;

        let record = match self.registry.get(id).await {
            Some(record) => record,
            None => return Ok(()),
        };

        if is_private && record.user_id != identity.id {
            // The file just went dark for this viewer.
            let _ = self.signals.send(BridgeSignal::ReloadRequired { media_id: id });
        } else {
            self.registry.set_privacy(id, is_private).await;
            let _ = self.signals.send(BridgeSignal::PrivacyChanged {
                media_id: id,
                is_private,
            });
        }
        Ok(())
    }
}

struct Connection {
    identity: Identity,
    listener: JoinHandle<()>,
}

/// Per-identity connection plus the inbound dispatch loop and the outbound
/// emission point.
pub struct SyncBridge {
    handlers: Arc<Handlers>,
    transport: Arc<dyn RealtimeTransport>,
    connection: Mutex<Option<Connection>>,
}

impl SyncBridge {
    pub fn new(
        registry: Arc<FileRegistry>,
        dashboard: Arc<DashboardStore>,
        media: Arc<MediaCache>,
        transport: Arc<dyn RealtimeTransport>,
    ) -> Self {
        let (signals, _) = broadcast::channel(16);
        Self {
            handlers: Arc::new(Handlers {
                registry,
                dashboard,
                media,
                signals,
            }),
            transport,
            connection: Mutex::new(None),
        }
    }

    /// Connect for one authenticated identity. An existing connection is torn
    /// down first; identities never share a connection.
    pub async fn connect(&self, identity: Identity) -> Result<(), AppError> {
        self.disconnect().await;

        let receiver = self.transport.connect(&identity).await?;
        let handlers = self.handlers.clone();
        let listener_identity = identity.clone();

        let listener = tokio::spawn(async move {
            Self::listen(handlers, listener_identity, receiver).await;
        });

        tracing::info!(user_id = %identity.id, "Sync bridge connected");
        *self.connection.lock().await = Some(Connection { identity, listener });
        Ok(())
    }

    async fn listen(
        handlers: Arc<Handlers>,
        identity: Identity,
        mut receiver: broadcast::Receiver<EventEnvelope>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(envelope) => {
                    let event = envelope.event.clone();
                    if let Err(err) = handlers.handle_event(&identity, envelope).await {
                        tracing::warn!(event = %event, error = %err, "Realtime handler failed");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Realtime receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(user_id = %identity.id, "Sync bridge listener stopped");
    }

    /// Tear down the current connection, if any.
    pub async fn disconnect(&self) {
        if let Some(connection) = self.connection.lock().await.take() {
            connection.listener.abort();
            self.transport.disconnect().await;
            tracing::info!(user_id = %connection.identity.id, "Sync bridge disconnected");
        }
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.identity.clone())
    }

    /// Broadcast a locally-deleted file to other sessions.
    pub async fn emit_delete(&self, record: &FileRecord) -> Result<(), AppError> {
        let payload = serde_json::to_value(record)?;
        self.transport
            .emit(EventEnvelope::new(DELETE_EVENT, payload))
            .await
    }

    /// Broadcast a locally-toggled privacy flag to other sessions.
    pub async fn emit_toggle(&self, id: Uuid, is_private: bool) -> Result<(), AppError> {
        let payload = serde_json::to_value(PrivacyUpdate { id, is_private })?;
        self.transport
            .emit(EventEnvelope::new(TOGGLE_EVENT, payload))
            .await
    }

    /// Signals raised by per-resource privacy events.
    pub fn subscribe_signals(&self) -> broadcast::Receiver<BridgeSignal> {
        self.handlers.signals.subscribe()
    }
}
