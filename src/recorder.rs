//! History Recorder
//!
//! Appends every conversational turn to the bounded per-chat history and
//! stamps owner activity when the real human writes. Callers run it
//! fire-and-forget: failures are logged, never propagated.

use crate::channels::Transport;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::message::{ConversationKey, HistoryEntry, InboundMessage, MediaRef, MessageContent};
use crate::store::{keys, write_timestamp, ConversationStore};
use crate::transcription::Transcriber;
use std::sync::Arc;
use tracing::{debug, warn};

/// Speaker label used for the owner's own turns
pub const OWNER_LABEL: &str = "Me";

#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn ConversationStore>,
    transport: Arc<dyn Transport>,
    transcriber: Arc<dyn Transcriber>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl HistoryRecorder {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        transport: Arc<dyn Transport>,
        transcriber: Arc<dyn Transcriber>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            transport,
            transcriber,
            clock,
            config,
        }
    }

    /// Record one inbound turn
    pub async fn record(&self, key: &ConversationKey, speaker: &str, message: &InboundMessage) {
        if message.is_from_me {
            self.stamp_owner(key).await;
        }

        let Some(text) = self.describe(&message.content).await else {
            return;
        };
        let entry = match &message.content {
            MessageContent::Voice { .. } => HistoryEntry::voice(speaker, &text),
            _ => HistoryEntry::new(speaker, text),
        };
        self.append(key, &entry).await;
    }

    /// Record a reply the engine sent
    pub async fn record_outgoing(&self, key: &ConversationKey, reply: &str) {
        self.append(key, &HistoryEntry::new(OWNER_LABEL, reply)).await;
    }

    /// Owner spoke: owner stamp for the watchdog and matcher, automation
    /// stamp so the keep-alive loop stays up
    pub async fn stamp_owner(&self, key: &ConversationKey) {
        let now = self.clock.now();
        let store = self.store.as_ref();
        let owner_ttl = Some(self.config.owner_activity_ttl());
        write_timestamp(store, &keys::owner_activity(key), now, owner_ttl).await;
        let ttl = Some(self.config.activity_ttl());
        write_timestamp(store, &keys::automation_activity(key), now, ttl).await;
    }

    /// Download and transcribe a voice note
    pub async fn transcribe(&self, media: &MediaRef) -> Option<String> {
        let audio = match self.transport.download_media(media).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Voice download failed: {}", e);
                return None;
            }
        };
        match self.transcriber.transcribe(&audio).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Transcription via {} failed: {}", self.transcriber.name(), e);
                None
            }
        }
    }

    /// Text representation of a message; `None` when nothing should be recorded
    async fn describe(&self, content: &MessageContent) -> Option<String> {
        match content {
            MessageContent::Text { text } if text.trim().is_empty() => None,
            MessageContent::Text { text } => Some(text.clone()),
            MessageContent::Voice { media, .. } => self.transcribe(media).await,
            MessageContent::Media { kind } => Some(format!("[{} message]", kind.as_str())),
        }
    }

    async fn append(&self, key: &ConversationKey, entry: &HistoryEntry) {
        let list = keys::history(key);
        if let Err(e) = self.store.list_append(&list, &entry.to_line()).await {
            warn!("History append failed for {}: {}", key, e);
            return;
        }
        let limit = self.config.history_limit as isize;
        if let Err(e) = self.store.list_trim(&list, -limit, -1).await {
            warn!("History trim failed for {}: {}", key, e);
        }
        debug!("History +1 for {} ({})", key, entry.speaker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{read_timestamp, MemoryStore};
    use crate::test_support::{FakeTranscriber, FakeTransport, ACCOUNT, CHAT, T0};
    use crate::TokioClock;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_owner_stamp_lives_through_long_owner_grace() {
        let clock = Arc::new(TokioClock::starting_at(T0));
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig {
            owner_grace_secs: 300,
            ..EngineConfig::default()
        };
        let recorder = HistoryRecorder::new(
            store.clone(),
            Arc::new(FakeTransport::new(clock.clone())),
            Arc::new(FakeTranscriber::default()),
            clock,
            config,
        );
        let key = ConversationKey::new(ACCOUNT, CHAT);

        recorder.stamp_owner(&key).await;
        tokio::time::sleep(Duration::from_secs(200)).await;

        assert_eq!(
            read_timestamp(store.as_ref(), &keys::owner_activity(&key)).await,
            Some(T0)
        );
        assert_eq!(
            read_timestamp(store.as_ref(), &keys::automation_activity(&key)).await,
            None
        );
    }
}
