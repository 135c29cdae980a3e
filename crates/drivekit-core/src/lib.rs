//! Drivekit Core Library
//!
//! This crate provides core domain models, error types, configuration, and validation
//! that are shared across all Drivekit components.

pub mod config;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod validation;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    DashboardSummary, FileRecord, FileSource, Identity, Page, SessionRecord, TaskSection,
    TaskStatus,
};
pub use telemetry::init_tracing;
