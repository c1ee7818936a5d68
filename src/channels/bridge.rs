//! HTTP Bridge Transport
//!
//! Talks JSON to a messaging sidecar that owns the actual protocol session
//! (login, encryption, media). The sidecar pushes inbound messages to our
//! webhook and exposes these endpoints for outbound actions:
//!
//! - `POST /send`     `{chat, text, reply_to}` -> `{id}`
//! - `POST /presence` `{chat, state}`
//! - `POST /receipt`  `{chat, sender, message_ids, kind}`
//! - `POST /download` `{media}` -> raw bytes
//! - `GET  /contacts/{sender}` -> `{full_name}`

use super::traits::*;
use crate::message::MediaRef;
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Bridge transport configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Sidecar base URL, without trailing slash
    pub base_url: String,
    /// Account id (phone number / JID user part)
    pub account_id: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// How long contact-book lookups are cached
    pub contact_cache_ttl: Duration,
}

impl BridgeConfig {
    pub fn new(base_url: &str, account_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            request_timeout: Duration::from_secs(15),
            contact_cache_ttl: Duration::from_secs(600),
        }
    }
}

/// Transport backed by the HTTP sidecar
pub struct BridgeTransport {
    config: BridgeConfig,
    client: reqwest::Client,
    contacts: Cache<String, Option<String>>,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    chat: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct PresenceRequest<'a> {
    chat: &'a str,
    state: Presence,
}

#[derive(Debug, Serialize)]
struct ReceiptRequest<'a> {
    chat: &'a str,
    sender: &'a str,
    message_ids: [&'a str; 1],
    kind: ReceiptKind,
}

#[derive(Debug, Serialize)]
struct DownloadRequest<'a> {
    media: &'a MediaRef,
}

#[derive(Debug, Deserialize)]
struct ContactResponse {
    #[serde(default)]
    full_name: Option<String>,
}

impl BridgeTransport {
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let contacts = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(config.contact_cache_ttl)
            .build();
        Ok(Self {
            config,
            client,
            contacts,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ChannelError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status.as_u16() == 429 {
            Err(ChannelError::RateLimited(60))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    fn name(&self) -> &str {
        "bridge"
    }

    fn account_id(&self) -> &str {
        &self.config.account_id
    }

    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ChannelError> {
        let response = self
            .post(
                "send",
                &SendRequest {
                    chat: chat_id,
                    text,
                    reply_to,
                },
            )
            .await
            .map_err(|e| match e {
                ChannelError::ConnectionFailed(msg) => ChannelError::SendFailed(msg),
                other => other,
            })?;

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Internal(e.to_string()))?;
        debug!("Sent message {} to {}", sent.id, chat_id);
        Ok(sent.id)
    }

    async fn send_presence(&self, chat_id: &str, presence: Presence) -> Result<(), ChannelError> {
        self.post(
            "presence",
            &PresenceRequest {
                chat: chat_id,
                state: presence,
            },
        )
        .await?;
        Ok(())
    }

    async fn mark_receipt(
        &self,
        chat_id: &str,
        sender_id: &str,
        message_id: &str,
        kind: ReceiptKind,
    ) -> Result<(), ChannelError> {
        self.post(
            "receipt",
            &ReceiptRequest {
                chat: chat_id,
                sender: sender_id,
                message_ids: [message_id],
                kind,
            },
        )
        .await?;
        Ok(())
    }

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>, ChannelError> {
        let response = self
            .post("download", &DownloadRequest { media })
            .await
            .map_err(|e| ChannelError::MediaDownloadFailed(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChannelError::MediaDownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn contact_name(&self, sender_id: &str) -> Option<String> {
        if let Some(cached) = self.contacts.get(sender_id).await {
            return cached;
        }

        let result = self
            .client
            .get(self.url(&format!("contacts/{}", sender_id)))
            .send()
            .await;

        let name = match result {
            Ok(response) if response.status().is_success() => response
                .json::<ContactResponse>()
                .await
                .ok()
                .and_then(|c| c.full_name)
                .filter(|n| !n.trim().is_empty()),
            Ok(response) if response.status().as_u16() == 404 => None,
            Ok(response) => {
                warn!("Contact lookup for {} returned {}", sender_id, response.status());
                return None;
            }
            Err(e) => {
                warn!("Contact lookup for {} failed: {}", sender_id, e);
                return None;
            }
        };

        self.contacts.insert(sender_id.to_string(), name.clone()).await;
        name
    }
}
