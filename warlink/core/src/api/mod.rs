//! HTTP Collaborators
//!
//! Request/response clients for the services that sit next to the streaming
//! link: the backend's command and health endpoints, and the voice
//! transcription service. These are ordinary typed HTTP calls; nothing here
//! touches the WebSocket.
//!
//! Unlike the link's advisory error strings, these clients return real
//! `Result`s with [`ApiError`], because callers invoke them directly and can
//! handle failure in place.

use thiserror::Error;

mod backend;
mod health;
mod whisper;

pub use backend::BackendClient;
pub use health::{format_uptime, GpuHealth, HealthMonitor, HealthSnapshot, SystemHealth};
pub use whisper::{AudioClip, WhisperClient};

/// Errors from the HTTP collaborator clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (connect failure, timeout, bad body)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("{service} returned {status}: {body}")]
    Status {
        /// Which collaborator answered
        service: &'static str,
        /// The HTTP status code
        status: reqwest::StatusCode,
        /// Response body, for diagnostics
        body: String,
    },

    /// The service answered 200 but the payload did not match the schema
    #[error("Malformed response from {service}: {source}")]
    Decode {
        /// Which collaborator answered
        service: &'static str,
        /// The underlying deserialization error
        source: serde_json::Error,
    },

    /// The health endpoint reported an unhealthy collection run
    #[error("Health report failed: {0}")]
    Health(String),

    /// The transcription service rejected the clip
    #[error("Transcription failed: {0}")]
    Transcription(String),
}
