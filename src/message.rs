//! Message Model
//!
//! Inbound messages arrive from the bridge as JSON and are parsed exactly once
//! into [`InboundMessage`]. The payload shape is resolved into the
//! [`MessageContent`] sum type at that point, so every later phase
//! pattern-matches instead of re-inspecting optional wrapper fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a history line that came from a transcribed voice note
pub const VOICE_MARKER: &str = "[Voice]:";

/// Opaque media handle; only the transport knows how to resolve it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

/// Non-conversational media kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Sticker,
    Document,
    #[serde(other)]
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Sticker => "sticker",
            Self::Document => "document",
            Self::Other => "media",
        }
    }
}

/// Message body, resolved at ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain or extended text
    Text { text: String },
    /// Voice note (push-to-talk audio); duration is missing on some clients
    Voice {
        #[serde(default)]
        duration_secs: Option<u32>,
        media: MediaRef,
    },
    /// Image, video, sticker, document and anything else with no text to answer
    Media { kind: MediaKind },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn voice(duration_secs: Option<u32>, media: impl Into<String>) -> Self {
        Self::Voice {
            duration_secs,
            media: MediaRef(media.into()),
        }
    }

    pub fn input_kind(&self) -> InputKind {
        match self {
            Self::Text { .. } => InputKind::Text,
            Self::Voice { .. } => InputKind::Voice,
            Self::Media { .. } => InputKind::Media,
        }
    }
}

/// What kind of input the reply generator is answering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Voice,
    Media,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Media => "media",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound message as delivered by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport message id
    pub id: String,

    /// Chat identifier (e.g. `123456@s.whatsapp.net`)
    pub chat_id: String,

    /// Sender identifier, possibly with `:device` and `@server` parts
    pub sender_id: String,

    /// Display ("push") name chosen by the sender
    #[serde(default)]
    pub sender_name: Option<String>,

    /// Unix timestamp assigned by the server
    pub timestamp: i64,

    /// Authored by the account owner (from any of their devices)
    #[serde(default)]
    pub is_from_me: bool,

    #[serde(default)]
    pub is_group: bool,

    pub content: MessageContent,
}

impl InboundMessage {
    /// Literal text, if this is a text message
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Newsletter and status-broadcast chats are never conversations
    pub fn is_broadcast(&self) -> bool {
        self.chat_id.contains("@newsletter") || self.chat_id.contains("@broadcast")
    }

    /// Seconds between the server timestamp and `now`
    pub fn age_secs(&self, now: i64) -> i64 {
        now - self.timestamp
    }

    /// Bare user part of the sender id
    pub fn sender_user(&self) -> &str {
        bare_user(&self.sender_id)
    }
}

/// Strip `:device` and `@server` suffixes from a transport id
pub fn bare_user(raw: &str) -> &str {
    let user = raw.split('@').next().unwrap_or(raw);
    user.split(':').next().unwrap_or(user)
}

/// Scope of all per-chat state: (automation account, chat)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey {
    account: String,
    chat: String,
}

impl ConversationKey {
    /// The account id is normalized so every device of one account shares state
    pub fn new(account: &str, chat: &str) -> Self {
        Self {
            account: bare_user(account).to_string(),
            chat: chat.to_string(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn chat(&self) -> &str {
        &self.chat
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account, self.chat)
    }
}

/// One line of conversation history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub speaker: String,
    pub text: String,
}

impl HistoryEntry {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }

    /// Voice entries carry the transcription behind [`VOICE_MARKER`]
    pub fn voice(speaker: impl Into<String>, transcription: &str) -> Self {
        Self::new(speaker, format!("{} {}", VOICE_MARKER, transcription.trim()))
    }

    /// Serialized form stored in the history list and replayed into prompts
    pub fn to_line(&self) -> String {
        format!("{}: {}", self.speaker, self.text)
    }
}
