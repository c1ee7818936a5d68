//! Speech-to-Text
//!
//! Voice notes are transcribed before they enter history or a prompt. The
//! default provider is a local Whisper server reached over multipart HTTP.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Error type for transcription operations
#[derive(Debug, thiserror::Error)]
pub enum TranscriberError {
    #[error("request error: {0}")]
    Request(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("empty transcription")]
    Empty,
}

/// Trait for audio transcription providers
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe raw audio bytes (OGG/Opus voice notes)
    async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriberError>;
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// Self-hosted Whisper server exposing `POST /transcribe`
#[derive(Debug, Clone)]
pub struct WhisperServer {
    base_url: String,
    client: reqwest::Client,
}

impl WhisperServer {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperServer {
    fn name(&self) -> &str {
        "whisper-server"
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriberError> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("voice.ogg")
            .mime_str("audio/ogg")
            .map_err(|e| TranscriberError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriberError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriberError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| TranscriberError::Request(e.to_string()))?;

        let text = result.text.trim().to_string();
        if text.is_empty() {
            return Err(TranscriberError::Empty);
        }

        debug!(
            "Transcribed {} bytes ({}): {} chars",
            audio.len(),
            result.language.as_deref().unwrap_or("?"),
            text.len()
        );
        Ok(text)
    }
}
