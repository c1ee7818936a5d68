//! Transport Trait Definitions
//!
//! The messaging transport is an external collaborator. The engine only needs
//! the primitives below: send, presence, receipts, media download and a
//! contact-book lookup.

use crate::message::MediaRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error types for transport operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Media download failed: {0}")]
    MediaDownloadFailed(String),

    #[error("Bridge returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Presence states the automation can announce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Online
    Available,
    /// Offline / last seen
    Unavailable,
    /// "typing..."
    Composing,
    /// Stopped typing
    Paused,
}

/// Receipt kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptKind {
    /// Blue ticks
    Read,
    /// Voice note listened to
    Played,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::Available => write!(f, "available"),
            Presence::Unavailable => write!(f, "unavailable"),
            Presence::Composing => write!(f, "composing"),
            Presence::Paused => write!(f, "paused"),
        }
    }
}

impl fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptKind::Read => write!(f, "read"),
            ReceiptKind::Played => write!(f, "played"),
        }
    }
}

/// Transport trait - implement for each messaging backend
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name identifier
    fn name(&self) -> &str;

    /// Identifier of the account the automation speaks for
    fn account_id(&self) -> &str;

    /// Send a text message, optionally quoting `reply_to`; returns the new message id
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ChannelError>;

    /// Announce presence in a chat
    async fn send_presence(&self, chat_id: &str, presence: Presence) -> Result<(), ChannelError>;

    /// Send a read/played receipt for one message
    async fn mark_receipt(
        &self,
        chat_id: &str,
        sender_id: &str,
        message_id: &str,
        kind: ReceiptKind,
    ) -> Result<(), ChannelError>;

    /// Fetch media bytes
    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>, ChannelError>;

    /// Full name saved in the account's contact book, if any
    async fn contact_name(&self, sender_id: &str) -> Option<String>;
}
