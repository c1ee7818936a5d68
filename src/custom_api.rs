//! Custom completion API
//!
//! Keyless `GET {url}?message=<prompt>` endpoint answering
//! `{"response": "...", "status": "..."}`. Selected by the operator with
//! model mode 2; the credential chain remains the fallback.

use crate::generator::{CompletionEndpoint, GenerationError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CustomResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    status: Option<String>,
}

/// Client for the keyless endpoint
#[derive(Debug, Clone)]
pub struct CustomApiClient {
    url: String,
    client: reqwest::Client,
}

impl CustomApiClient {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            url: url.to_string(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl CompletionEndpoint for CustomApiClient {
    fn name(&self) -> &str {
        "custom-api"
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("message", prompt)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: CustomResponse = response.json().await?;
        debug!(
            "Custom API status={}, {} chars",
            result.status.as_deref().unwrap_or("-"),
            result.response.len()
        );
        Ok(result.response)
    }
}
