//! Error types module
//!
//! This module provides the core error types used throughout the Drivekit client.
//! All errors are unified under the `AppError` enum which can represent transport,
//! API, cache, validation, and queue state errors.
//!
//! Cancellation is modelled as its own variant so that callers can distinguish an
//! aborted upload from a genuine failure and suppress failure reporting for it.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like cache constraint violations
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error presentation - defines how an error should be surfaced.
/// This trait allows errors to self-describe their user-facing characteristics.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "TRANSPORT_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (the operation can be retried)
    fn is_recoverable(&self) -> bool;

    /// User-facing message (may differ from internal error message)
    fn user_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

// Error conversion implementations following Rust best practices
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
/// user_message stays per-variant for dynamic content.
fn app_error_static_metadata(err: &AppError) -> (&'static str, bool, LogLevel) {
    match err {
        AppError::Transport(_) => ("TRANSPORT_ERROR", true, LogLevel::Error),
        AppError::Api { .. } => ("API_ERROR", true, LogLevel::Warn),
        AppError::Cancelled => ("CANCELLED", false, LogLevel::Debug),
        AppError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        AppError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        AppError::Cache(_) => ("CACHE_ERROR", false, LogLevel::Warn),
        AppError::InvalidState(_) => ("INVALID_STATE", false, LogLevel::Debug),
        AppError::Internal(_) => ("INTERNAL_ERROR", true, LogLevel::Error),
        AppError::InternalWithSource { .. } => ("INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl AppError {
    /// True when the error represents a cooperative cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }

    /// Human-readable message for a failed upload task.
    ///
    /// Preference order: server-provided message, transport error text,
    /// then the literal "Upload failed".
    pub fn upload_failure_message(&self) -> String {
        match self {
            AppError::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            AppError::Transport(msg) if !msg.trim().is_empty() => msg.clone(),
            _ => "Upload failed".to_string(),
        }
    }

    /// Get the error type name for detailed error reporting
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Transport(_) => "Transport",
            AppError::Api { .. } => "Api",
            AppError::Cancelled => "Cancelled",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Cache(_) => "Cache",
            AppError::InvalidState(_) => "InvalidState",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).2
    }

    fn user_message(&self) -> String {
        match self {
            AppError::Transport(_) => "Network error, check your connection".to_string(),
            AppError::Api { message, .. } => message.clone(),
            AppError::Cancelled => "Operation cancelled".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Cache(_) => "Local cache error".to_string(),
            AppError::InvalidState(ref msg) => msg.clone(),
            AppError::Internal(_) => "Something went wrong".to_string(),
            AppError::InternalWithSource { .. } => "Something went wrong".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_transport() {
        let err = AppError::Transport("connection refused".to_string());
        assert_eq!(err.error_code(), "TRANSPORT_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Error);
        assert_eq!(err.user_message(), "Network error, check your connection");
    }

    #[test]
    fn test_error_metadata_cancelled() {
        let err = AppError::Cancelled;
        assert!(err.is_cancelled());
        assert_eq!(err.error_code(), "CANCELLED");
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_upload_failure_message_prefers_server_message() {
        let err = AppError::Api {
            status: 507,
            message: "disk full".to_string(),
        };
        assert_eq!(err.upload_failure_message(), "disk full");
    }

    #[test]
    fn test_upload_failure_message_falls_back_to_transport() {
        let err = AppError::Transport("connection reset by peer".to_string());
        assert_eq!(err.upload_failure_message(), "connection reset by peer");
    }

    #[test]
    fn test_upload_failure_message_generic_fallback() {
        let blank = AppError::Api {
            status: 500,
            message: "  ".to_string(),
        };
        assert_eq!(blank.upload_failure_message(), "Upload failed");

        let internal = AppError::Internal("oops".to_string());
        assert_eq!(internal.upload_failure_message(), "Upload failed");
    }

    #[test]
    fn test_cache_error_is_soft() {
        let err = AppError::Cache("UNIQUE constraint failed".to_string());
        assert_eq!(err.error_code(), "CACHE_ERROR");
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert_eq!(err.user_message(), "Local cache error");
    }
}
