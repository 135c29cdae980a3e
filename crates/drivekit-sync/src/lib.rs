//! Client-side sync layer for Drivekit.
//!
//! Holds the pieces that keep one session's view of the drive coherent: the
//! in-memory file registry, the dashboard aggregate, the serialized upload
//! queue, the realtime bridge that mirrors other sessions' mutations, and the
//! account switcher. Services are constructed explicitly and injected; none
//! of them is ambient global state.

pub mod bridge;
pub mod dashboard;
pub mod queue;
pub mod registry;
pub mod session;
pub mod uploader;

pub use bridge::{BridgeSignal, EventEnvelope, InProcessTransport, RealtimeTransport, SyncBridge};
pub use dashboard::DashboardStore;
pub use queue::{display_progress, QueueEvent, TaskSnapshot, UploadQueue, UploadQueueConfig};
pub use registry::FileRegistry;
pub use session::{SessionApi, SessionSwitcher};
pub use uploader::FileUploader;
