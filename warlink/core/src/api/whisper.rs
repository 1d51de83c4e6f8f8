//! Voice Transcription Client
//!
//! Uploads a recorded audio clip to the whisper service's `/voice-command`
//! endpoint as a multipart form (an `audio` file part plus a `profile` text
//! part) and returns the transcribed text.

use std::time::Duration;

use serde::Deserialize;

use super::ApiError;

/// A recorded audio clip ready for upload
#[derive(Clone, Debug)]
pub struct AudioClip {
    /// Raw encoded audio bytes
    pub bytes: Vec<u8>,
    /// File name presented to the service
    pub file_name: String,
    /// MIME type of the encoding
    pub mime_type: String,
}

impl AudioClip {
    /// A WAV clip with the standard upload name
    #[must_use]
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: "recording.wav".to_string(),
            mime_type: "audio/wav".to_string(),
        }
    }
}

/// Response envelope from the transcription endpoint
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    success: bool,
    transcribed_text: Option<String>,
    error: Option<String>,
}

/// Client for the voice transcription service
#[derive(Clone)]
pub struct WhisperClient {
    base_url: String,
    client: reqwest::Client,
}

impl WhisperClient {
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

    fn voice_command_url(&self) -> String {
        format!("{}/voice-command", self.base_url)
    }

    /// Transcribe one audio clip
    ///
    /// The profile rides along so the service can bias transcription toward
    /// the persona's vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transcription`] when the service processed the
    /// upload but produced no text, and other [`ApiError`] variants for
    /// transport and status failures.
    pub async fn transcribe(&self, clip: AudioClip, profile: &str) -> Result<String, ApiError> {
        let part = reqwest::multipart::Part::bytes(clip.bytes)
            .file_name(clip.file_name)
            .mime_str(&clip.mime_type)?;
        let form = reqwest::multipart::Form::new()
            .part("audio", part)
            .text("profile", profile.to_string());

        let response = self
            .client
            .post(self.voice_command_url())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                service: "whisper",
                status,
                body,
            });
        }

        let result: TranscriptionResponse = response.json().await?;

        if result.success {
            if let Some(text) = result.transcribed_text.filter(|t| !t.is_empty()) {
                tracing::debug!(chars = text.len(), "Transcription received");
                return Ok(text);
            }
        }

        Err(ApiError::Transcription(
            result
                .error
                .unwrap_or_else(|| "Transcription failed".to_string()),
        ))
    }
}
