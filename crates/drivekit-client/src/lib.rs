//! Typed HTTP client for the Drivekit API.
//!
//! Provides a minimal client with cookie-based credential attachment, generic
//! GET/POST/PATCH/DELETE helpers, and domain methods (upload, listing, search,
//! privacy, dashboard, session tokens). The sync layer calls through this
//! client for every remote interaction.

pub mod api;
pub mod progress;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use drivekit_core::{AppError, ClientConfig};

/// API version prefix (e.g. "/api/v1"). Set DRIVEKIT_API_VERSION to match the server.
pub fn api_prefix() -> String {
    let version = std::env::var("DRIVEKIT_API_VERSION").unwrap_or_else(|_| "v1".to_string());
    format!("/api/{}", version)
}

pub(crate) fn transport_err(err: reqwest::Error) -> AppError {
    AppError::Transport(err.to_string())
}

/// HTTP client for the Drivekit API.
///
/// Credentials travel as cookies; the underlying client keeps a cookie store
/// so the auth exchange performed elsewhere is attached to every request.
#[derive(Clone, Debug)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    validate_responses: bool,
}

impl DriveClient {
    pub fn new(config: &ClientConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            validate_responses: config.validate_responses,
        })
    }

    /// Create client from environment via [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self, AppError> {
        let config = ClientConfig::from_env()?;
        Self::new(&config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn validate_responses(&self) -> bool {
        self.validate_responses
    }

    /// Extract a best-effort error message from a non-2xx response.
    ///
    /// Prefers the `message` field of a JSON body; falls back to the raw body.
    pub(crate) async fn error_from_response(response: reqwest::Response) -> AppError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or(text);
        AppError::Api { status, message }
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = self.build_url(path);
        let mut request = self.client.get(&url);

        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(transport_err)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: T = response
            .json()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to parse response: {}", e)))?;

        Ok(body)
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, AppError> {
        let url = self.build_url(path);
        let mut request = self.client.post(&url).json(body);

        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(transport_err)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: T = response
            .json()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to parse response: {}", e)))?;

        Ok(body)
    }

    /// PATCH JSON body. Discards the response body on success.
    pub async fn patch_json<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), AppError> {
        let url = self.build_url(path);
        let request = self.client.patch(&url).json(body);

        let response = request.send().await.map_err(transport_err)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str) -> Result<(), AppError> {
        let url = self.build_url(path);
        let request = self.client.delete(&url);

        let response = request.send().await.map_err(transport_err)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

pub use progress::{ProgressFn, ProgressStream};
