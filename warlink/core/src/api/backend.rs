//! Backend HTTP Client
//!
//! Typed client for the war-room backend's REST endpoints:
//! - `/api/command` - run one command as a request/response exchange
//! - `/api/system/health` - host and GPU telemetry snapshot
//!
//! The command endpoint is the non-streaming alternative to the link: the
//! same `{text, profile}` payload, answered in one shot.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::health::SystemHealth;
use super::ApiError;

/// One-shot command request payload
#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    text: &'a str,
    profile: &'a str,
}

/// One-shot command response payload
#[derive(Debug, Deserialize)]
struct CommandResponse {
    response: String,
}

/// Client for the backend's REST endpoints
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    /// Create a client for the given base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    fn command_url(&self) -> String {
        format!("{}/api/command", self.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/api/system/health", self.base_url)
    }

    /// Run one command and wait for the full response
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails, the backend answers with
    /// a non-success status, or the response body is malformed.
    pub async fn run_command(&self, text: &str, profile: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.command_url())
            .json(&CommandRequest { text, profile })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                service: "backend",
                status,
                body,
            });
        }

        let data: CommandResponse = response.json().await?;
        Ok(data.response)
    }

    /// Fetch one system health snapshot
    ///
    /// The backend wraps the snapshot in a success envelope; an unhealthy
    /// collection run comes back as `success = false` with an error string.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails, the status is not
    /// success, the envelope reports a failed run, or the snapshot does not
    /// deserialize.
    pub async fn fetch_health(&self) -> Result<SystemHealth, ApiError> {
        let response = self.client.get(self.health_url()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                service: "backend",
                status,
                body,
            });
        }

        let data: Value = response.json().await?;

        if !data.get("success").and_then(Value::as_bool).unwrap_or(false) {
            let message = data
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return Err(ApiError::Health(message));
        }

        serde_json::from_value(data).map_err(|e| ApiError::Decode {
            service: "backend",
            source: e,
        })
    }
}
