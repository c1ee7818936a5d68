//! In-memory collaborators for engine tests

use crate::channels::{ChannelError, Presence, ReceiptKind, Transport};
use crate::clock::{Clock, TokioClock};
use crate::config::EngineConfig;
use crate::engine::{EngineDeps, ReplyEngine};
use crate::generator::{Credential, GenerationBackend, GenerationError, ReplyGenerator};
use crate::message::{ConversationKey, InboundMessage, MediaRef, MessageContent};
use crate::roster::{AutomationTarget, Roster};
use crate::store::{keys, write_timestamp, ConversationStore, MemoryStore};
use crate::transcription::{Transcriber, TranscriberError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const T0: i64 = 1_700_000_000;
pub const ACCOUNT: &str = "923000000000:7@s.whatsapp.net";
pub const CHAT: &str = "923111111111@s.whatsapp.net";

/// Visible transport call, stamped with seconds since T0
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Sent {
        text: String,
        reply_to: Option<String>,
    },
    Presence(Presence),
    Receipt(ReceiptKind),
}

#[derive(Debug)]
pub struct FakeTransport {
    clock: Arc<TokioClock>,
    events: Mutex<Vec<(i64, Event)>>,
    contacts: Mutex<HashMap<String, String>>,
    next_id: AtomicUsize,
    pub fail_sends: AtomicBool,
}

impl FakeTransport {
    pub fn new(clock: Arc<TokioClock>) -> Self {
        Self {
            clock,
            events: Mutex::new(Vec::new()),
            contacts: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            fail_sends: AtomicBool::new(false),
        }
    }

    fn push(&self, event: Event) {
        let at = self.clock.now() - T0;
        self.events.lock().push((at, event));
    }

    pub fn events(&self) -> Vec<(i64, Event)> {
        self.events.lock().clone()
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.events()
            .into_iter()
            .filter_map(|(at, e)| match e {
                Event::Sent { text, .. } => Some((at, text)),
                _ => None,
            })
            .collect()
    }

    pub fn receipts(&self) -> Vec<(i64, ReceiptKind)> {
        self.events()
            .into_iter()
            .filter_map(|(at, e)| match e {
                Event::Receipt(kind) => Some((at, kind)),
                _ => None,
            })
            .collect()
    }

    pub fn presences(&self) -> Vec<(i64, Presence)> {
        self.events()
            .into_iter()
            .filter_map(|(at, e)| match e {
                Event::Presence(p) => Some((at, p)),
                _ => None,
            })
            .collect()
    }

    pub fn add_contact(&self, sender_id: &str, name: &str) {
        self.contacts
            .lock()
            .insert(sender_id.to_string(), name.to_string());
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &str {
        "fake"
    }

    fn account_id(&self) -> &str {
        ACCOUNT
    }

    async fn send_text(
        &self,
        _chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ChannelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed("offline".to_string()));
        }
        self.push(Event::Sent {
            text: text.to_string(),
            reply_to: reply_to.map(String::from),
        });
        Ok(format!("sent-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn send_presence(&self, _chat_id: &str, presence: Presence) -> Result<(), ChannelError> {
        self.push(Event::Presence(presence));
        Ok(())
    }

    async fn mark_receipt(
        &self,
        _chat_id: &str,
        _sender_id: &str,
        _message_id: &str,
        kind: ReceiptKind,
    ) -> Result<(), ChannelError> {
        self.push(Event::Receipt(kind));
        Ok(())
    }

    async fn download_media(&self, _media: &MediaRef) -> Result<Vec<u8>, ChannelError> {
        Ok(b"OggS".to_vec())
    }

    async fn contact_name(&self, sender_id: &str) -> Option<String> {
        self.contacts.lock().get(sender_id).cloned()
    }
}

/// Transcriber returning a fixed text, or failing when unset
#[derive(Debug, Default)]
pub struct FakeTranscriber {
    pub text: Mutex<Option<String>>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    fn name(&self) -> &str {
        "fake-stt"
    }

    async fn transcribe(&self, _audio: &[u8]) -> Result<String, TranscriberError> {
        self.text.lock().clone().ok_or(TranscriberError::Empty)
    }
}

/// Backend that fails for listed credentials and records every call
#[derive(Debug)]
pub struct ScriptedBackend {
    reply: String,
    failing: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(reply: &str, failing: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            failing,
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        self.calls.lock().push(credential.expose().to_string());
        self.prompts.lock().push(prompt.to_string());
        if self.failing.iter().any(|f| *f == credential.expose()) {
            Err(GenerationError::RateLimited)
        } else {
            Ok(self.reply.clone())
        }
    }
}

/// Engine wired to in-memory collaborators on a paused-time clock
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub transport: Arc<FakeTransport>,
    pub transcriber: Arc<FakeTranscriber>,
    pub backend: Arc<ScriptedBackend>,
    pub clock: Arc<TokioClock>,
    pub engine: ReplyEngine,
    pub key: ConversationKey,
    next_msg: AtomicUsize,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_backend(ScriptedBackend::new("theek hoon yaar", vec![]), &["k1"])
    }

    pub fn with_backend(backend: Arc<ScriptedBackend>, credentials: &[&str]) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(TokioClock::starting_at(T0));
        let transport = Arc::new(FakeTransport::new(clock.clone()));
        let transcriber = Arc::new(FakeTranscriber::default());

        let generator = ReplyGenerator::new(
            store.clone(),
            backend.clone(),
            credentials.iter().map(|c| Credential::new(*c)).collect(),
        );
        let engine = ReplyEngine::new(
            EngineConfig::default(),
            EngineDeps {
                store: store.clone(),
                transport: transport.clone(),
                transcriber: transcriber.clone(),
                generator,
                clock: clock.clone(),
            },
        );

        Self {
            key: ConversationKey::new(ACCOUNT, CHAT),
            store,
            transport,
            transcriber,
            backend,
            clock,
            engine,
            next_msg: AtomicUsize::new(1),
        }
    }

    pub async fn add_target(&self, name: &str) {
        Roster::new(self.store.clone())
            .add(self.key.account(), &AutomationTarget::new(name).unwrap())
            .await
            .unwrap();
    }

    pub fn inbound(&self, sender_name: &str, content: MessageContent) -> InboundMessage {
        InboundMessage {
            id: format!("in-{}", self.next_msg.fetch_add(1, Ordering::SeqCst)),
            chat_id: CHAT.to_string(),
            sender_id: CHAT.to_string(),
            sender_name: Some(sender_name.to_string()),
            timestamp: self.clock.now(),
            is_from_me: false,
            is_group: false,
            content,
        }
    }

    pub fn owner_message(&self, text: &str) -> InboundMessage {
        InboundMessage {
            id: format!("own-{}", self.next_msg.fetch_add(1, Ordering::SeqCst)),
            chat_id: CHAT.to_string(),
            sender_id: ACCOUNT.to_string(),
            sender_name: None,
            timestamp: self.clock.now(),
            is_from_me: true,
            is_group: false,
            content: MessageContent::text(text),
        }
    }

    /// Mark the automation as last active `secs_ago` seconds before now
    pub async fn set_automation_activity(&self, secs_ago: i64) {
        write_timestamp(
            self.store.as_ref(),
            &keys::automation_activity(&self.key),
            self.clock.now() - secs_ago,
            None,
        )
        .await;
    }

    pub async fn set_owner_activity(&self, secs_ago: i64) {
        write_timestamp(
            self.store.as_ref(),
            &keys::owner_activity(&self.key),
            self.clock.now() - secs_ago,
            None,
        )
        .await;
    }

    pub async fn history(&self) -> Vec<String> {
        self.store.list_range(&keys::history(&self.key)).await.unwrap()
    }
}
