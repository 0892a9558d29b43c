//! Typed errors for gateway operations
//!
//! Every fault the Gemini gateway can raise is mapped onto one of these
//! variants so controllers can log something meaningful before swapping in
//! their fixed user-facing message.

use std::time::Duration;
use thiserror::Error;

/// Gateway errors with typed variants
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No API key in the config file or the environment
    #[error("No Gemini API key configured (set GEMINI_API_KEY or api_key in config.json)")]
    MissingApiKey,

    /// API key rejected (HTTP 401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Quota exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed request (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side error (HTTP 5xx) or an error object inside the stream
    #[error("Service error: {0}")]
    Service(String),

    /// Connection refused, DNS failure, reset
    #[error("Network error: {0}")]
    Network(String),

    /// Request or stream went quiet for longer than the configured bound
    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Response body did not match the expected shape
    #[error("Could not decode response: {0}")]
    Decode(String),

    /// Stream broke after it started
    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// Convert HTTP status code and error text into a typed error
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        match status.as_u16() {
            401 | 403 => GatewayError::Unauthorized(error_text),
            429 => GatewayError::RateLimited(error_text),
            400 => GatewayError::BadRequest(error_text),
            500..=599 => GatewayError::Service(error_text),
            _ => GatewayError::Other(format!("HTTP {}: {}", status, error_text)),
        }
    }

    /// Convert network/connection errors into a typed error
    pub fn from_network_error(e: reqwest::Error, limit: Duration) -> Self {
        // Request urls stay out of error text
        let e = e.without_url();
        if e.is_timeout() {
            GatewayError::Timeout(limit)
        } else if e.is_connect() {
            GatewayError::Network(format!("Connection failed: {}", e))
        } else if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

/// Draft store failures. Callers log these and carry on.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Draft database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Draft store IO error: {0}")]
    Io(#[from] std::io::Error),
}
