//! Configuration module
//!
//! This module provides the client configuration, loaded from the environment
//! with sensible defaults for local development.

use std::env;

const REQUEST_TIMEOUT_SECS: u64 = 60;
const PROGRESS_DISPLAY_OFFSET: u8 = 10;
const COMPLETED_TASK_TTL_SECS: u64 = 10;
const COMPLETED_REAP_INTERVAL_MS: u64 = 1000;
const MAX_FILE_SIZE_MB: usize = 500;
const CACHE_MAX_CONNECTIONS: u32 = 1;

/// Client configuration shared by all Drivekit components.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// SQLite connection string for the persistent local cache.
    pub cache_database_url: String,
    pub cache_max_connections: u32,
    /// Subtracted from raw upload progress before display, floored at zero.
    pub progress_display_offset: u8,
    /// How long completed upload tasks stay visible before auto-removal.
    pub completed_task_ttl_secs: u64,
    pub completed_reap_interval_ms: u64,
    pub max_file_size_bytes: usize,
    /// When true, listing and search responses are shape-validated after parsing.
    pub validate_responses: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            cache_database_url: "sqlite::memory:".to_string(),
            cache_max_connections: CACHE_MAX_CONNECTIONS,
            progress_display_offset: PROGRESS_DISPLAY_OFFSET,
            completed_task_ttl_secs: COMPLETED_TASK_TTL_SECS,
            completed_reap_interval_ms: COMPLETED_REAP_INTERVAL_MS,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            validate_responses: true,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let config = ClientConfig {
            api_base_url: env::var("DRIVEKIT_API_URL")
                .or_else(|_| env::var("API_URL"))
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REQUEST_TIMEOUT_SECS),
            cache_database_url: env::var("DRIVEKIT_CACHE_URL")
                .unwrap_or_else(|_| "sqlite::memory:".to_string()),
            cache_max_connections: env::var("CACHE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| CACHE_MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(CACHE_MAX_CONNECTIONS),
            progress_display_offset: env::var("PROGRESS_DISPLAY_OFFSET")
                .unwrap_or_else(|_| PROGRESS_DISPLAY_OFFSET.to_string())
                .parse()
                .unwrap_or(PROGRESS_DISPLAY_OFFSET),
            completed_task_ttl_secs: env::var("COMPLETED_TASK_TTL_SECS")
                .unwrap_or_else(|_| COMPLETED_TASK_TTL_SECS.to_string())
                .parse()
                .unwrap_or(COMPLETED_TASK_TTL_SECS),
            completed_reap_interval_ms: env::var("COMPLETED_REAP_INTERVAL_MS")
                .unwrap_or_else(|_| COMPLETED_REAP_INTERVAL_MS.to_string())
                .parse()
                .unwrap_or(COMPLETED_REAP_INTERVAL_MS),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            validate_responses: env::var("VALIDATE_RESPONSES")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.api_base_url.is_empty() {
            return Err(anyhow::anyhow!("DRIVEKIT_API_URL must not be empty"));
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "DRIVEKIT_API_URL must be an http(s) URL, got: {}",
                self.api_base_url
            ));
        }

        if self.progress_display_offset > 100 {
            return Err(anyhow::anyhow!(
                "PROGRESS_DISPLAY_OFFSET must be at most 100"
            ));
        }

        if self.completed_task_ttl_secs == 0 {
            return Err(anyhow::anyhow!(
                "COMPLETED_TASK_TTL_SECS must be greater than zero"
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }

        Ok(())
    }
}
