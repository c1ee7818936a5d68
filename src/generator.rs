//! Reply Generator
//!
//! Builds a bounded-context prompt from the conversation history and asks the
//! generation backend for a reply in the owner's voice.
//!
//! Credentials are tried in order until one succeeds. The index of the last
//! credential that worked is remembered for the life of the process, and the
//! next call starts there, so an exhausted key at the head of the list is not
//! hit on every message. Exhausting the list yields an empty reply, which the
//! engine treats as "say nothing".

use crate::message::{ConversationKey, InputKind};
use crate::store::{keys, ConversationStore};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Generation backend errors; any of them moves rotation to the next credential
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out")]
    Timeout,

    #[error("quota exhausted")]
    RateLimited,

    #[error("backend error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// One API key for the generation backend
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(***{} chars)", self.0.len())
    }
}

/// Credentialed text-generation backend
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, credential: &Credential, prompt: &str)
        -> Result<String, GenerationError>;
}

/// Keyless completion endpoint (operator-selected alternative)
#[async_trait]
pub trait CompletionEndpoint: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Generation mode chosen by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelMode {
    /// Credential chain only
    #[default]
    CredentialChain,
    /// Keyless endpoint first, credential chain as fallback
    CustomFirst,
}

impl ModelMode {
    pub fn as_store_value(&self) -> &'static str {
        match self {
            Self::CredentialChain => "1",
            Self::CustomFirst => "2",
        }
    }

    pub fn from_store_value(raw: &str) -> Self {
        match raw.trim() {
            "2" => Self::CustomFirst,
            _ => Self::CredentialChain,
        }
    }
}

/// Reply generator with sticky credential rotation
pub struct ReplyGenerator {
    store: Arc<dyn ConversationStore>,
    backend: Arc<dyn GenerationBackend>,
    credentials: Vec<Credential>,
    custom: Option<Arc<dyn CompletionEndpoint>>,
    last_good: AtomicUsize,
}

impl ReplyGenerator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        backend: Arc<dyn GenerationBackend>,
        credentials: Vec<Credential>,
    ) -> Self {
        if credentials.is_empty() {
            warn!("No generation credentials configured - replies will be silent");
        }
        Self {
            store,
            backend,
            credentials,
            custom: None,
            last_good: AtomicUsize::new(0),
        }
    }

    /// Attach the keyless endpoint used in [`ModelMode::CustomFirst`]
    pub fn with_custom_endpoint(mut self, endpoint: Arc<dyn CompletionEndpoint>) -> Self {
        self.custom = Some(endpoint);
        self
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    /// Produce a reply, or an empty string to stay silent
    pub async fn generate(
        &self,
        key: &ConversationKey,
        incoming: &str,
        sender_label: &str,
        kind: InputKind,
    ) -> String {
        let history = match self.store.list_range(&keys::history(key)).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!("History unavailable for {}: {}", key, e);
                Vec::new()
            }
        };
        let prompt = build_prompt(sender_label, kind, &history, incoming);

        if self.selected_mode(key.account()).await == ModelMode::CustomFirst {
            if let Some(custom) = &self.custom {
                match custom.complete(&prompt).await {
                    Ok(reply) if !reply.trim().is_empty() => {
                        info!("Reply generated via {}", custom.name());
                        return reply;
                    }
                    Ok(_) => warn!("{} returned empty reply, using credential chain", custom.name()),
                    Err(e) => warn!("{} failed ({}), using credential chain", custom.name(), e),
                }
            }
        }

        self.generate_with_rotation(&prompt).await
    }

    async fn selected_mode(&self, account: &str) -> ModelMode {
        match self.store.get(&keys::selected_model(account)).await {
            Ok(Some(raw)) => ModelMode::from_store_value(&raw),
            Ok(None) => ModelMode::default(),
            Err(e) => {
                debug!("Model selection unreadable ({}), using default", e);
                ModelMode::default()
            }
        }
    }

    /// Try each credential once, starting from the last one that worked
    pub async fn generate_with_rotation(&self, prompt: &str) -> String {
        let count = self.credentials.len();
        if count == 0 {
            return String::new();
        }

        let start = self.last_good.load(Ordering::Relaxed) % count;
        for offset in 0..count {
            let index = (start + offset) % count;
            match self.backend.generate(&self.credentials[index], prompt).await {
                Ok(reply) => {
                    self.last_good.store(index, Ordering::Relaxed);
                    debug!(
                        "Reply generated via {} with credential #{}",
                        self.backend.name(),
                        index
                    );
                    return reply;
                }
                Err(e) => {
                    warn!(
                        "{} credential #{} failed: {}",
                        self.backend.name(),
                        index,
                        e
                    );
                }
            }
        }

        warn!("All {} credentials failed - staying silent", count);
        String::new()
    }
}

/// Assemble the persona prompt; history lines are replayed verbatim in order
pub fn build_prompt(sender_label: &str, kind: InputKind, history: &[String], incoming: &str) -> String {
    let input_note = match kind {
        InputKind::Voice => {
            "They sent a VOICE NOTE; the text below is its transcription. Answer what they said, naturally."
        }
        _ => "They sent a text message.",
    };

    format!(
        "You are \"Me\", the owner of this account, chatting with \"{sender}\".\n\
         Reply exactly the way \"Me\" would.\n\
         \n\
         GUIDELINES:\n\
         1. Copy my tone, language and message length from the history.\n\
         2. {input_note}\n\
         3. Be brief and human. Never say you are an assistant or a bot.\n\
         4. If the conversation has reached a natural end, close it briefly.\n\
         \n\
         HISTORY:\n\
         {history}\n\
         ---\n\
         USER ({kind}): {incoming}\n\
         ME:",
        sender = sender_label,
        input_note = input_note,
        history = history.join("\n"),
        kind = kind,
        incoming = incoming,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use parking_lot::Mutex;

    /// Backend that fails for listed credentials and records every call
    struct ScriptedBackend {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(failing: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                failing,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
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
            _prompt: &str,
        ) -> Result<String, GenerationError> {
            self.calls.lock().push(credential.expose().to_string());
            if self.failing.contains(&credential.expose()) {
                Err(GenerationError::RateLimited)
            } else {
                Ok(format!("reply from {}", credential.expose()))
            }
        }
    }

    struct FixedEndpoint(Result<&'static str, ()>);

    #[async_trait]
    impl CompletionEndpoint for FixedEndpoint {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.0
                .map(str::to_string)
                .map_err(|_| GenerationError::Request("down".into()))
        }
    }

    fn creds(names: &[&str]) -> Vec<Credential> {
        names.iter().map(|n| Credential::new(*n)).collect()
    }

    fn generator(backend: Arc<ScriptedBackend>, names: &[&str]) -> ReplyGenerator {
        ReplyGenerator::new(Arc::new(MemoryStore::new()), backend, creds(names))
    }

    #[tokio::test]
    async fn test_fallback_makes_exactly_k_calls() {
        let backend = ScriptedBackend::new(vec!["k1", "k2", "k3"]);
        let gen = generator(backend.clone(), &["k1", "k2", "k3", "k4", "k5"]);

        let reply = gen.generate_with_rotation("prompt").await;

        assert_eq!(reply, "reply from k4");
        assert_eq!(backend.calls(), vec!["k1", "k2", "k3", "k4"]);
    }

    #[tokio::test]
    async fn test_total_failure_is_silent() {
        let backend = ScriptedBackend::new(vec!["k1", "k2"]);
        let gen = generator(backend.clone(), &["k1", "k2"]);

        assert_eq!(gen.generate_with_rotation("prompt").await, "");
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_no_credentials_is_silent() {
        let backend = ScriptedBackend::new(vec![]);
        let gen = generator(backend.clone(), &[]);

        assert_eq!(gen.generate_with_rotation("prompt").await, "");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rotation_starts_at_last_good() {
        let backend = ScriptedBackend::new(vec!["k1"]);
        let gen = generator(backend.clone(), &["k1", "k2", "k3"]);

        gen.generate_with_rotation("first").await;
        gen.generate_with_rotation("second").await;

        // second call skips the exhausted head of the list
        assert_eq!(backend.calls(), vec!["k1", "k2", "k2"]);
    }

    #[tokio::test]
    async fn test_rotation_wraps_around() {
        let backend = ScriptedBackend::new(vec!["k1", "k3"]);
        let gen = generator(backend.clone(), &["k1", "k2", "k3"]);
        gen.last_good.store(2, Ordering::Relaxed);

        let reply = gen.generate_with_rotation("p").await;
        assert_eq!(reply, "reply from k2");
        assert_eq!(backend.calls(), vec!["k3", "k1", "k2"]);
        assert_eq!(gen.last_good.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_custom_first_mode_and_fallback() {
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new());
        let key = ConversationKey::new("111", "chat");
        store
            .set(&keys::selected_model("111"), ModelMode::CustomFirst.as_store_value(), None)
            .await
            .unwrap();

        let backend = ScriptedBackend::new(vec![]);
        let gen = ReplyGenerator::new(store.clone(), backend.clone(), creds(&["k1"]))
            .with_custom_endpoint(Arc::new(FixedEndpoint(Ok("custom reply"))));
        assert_eq!(gen.generate(&key, "hi", "Ali", InputKind::Text).await, "custom reply");
        assert!(backend.calls().is_empty());

        let gen = ReplyGenerator::new(store, backend.clone(), creds(&["k1"]))
            .with_custom_endpoint(Arc::new(FixedEndpoint(Err(()))));
        assert_eq!(gen.generate(&key, "hi", "Ali", InputKind::Text).await, "reply from k1");
        assert_eq!(backend.calls(), vec!["k1"]);
    }

    #[tokio::test]
    async fn test_default_mode_ignores_custom_endpoint() {
        let backend = ScriptedBackend::new(vec![]);
        let gen = generator(backend.clone(), &["k1"])
            .with_custom_endpoint(Arc::new(FixedEndpoint(Ok("custom reply"))));
        let key = ConversationKey::new("111", "chat");

        assert_eq!(gen.generate(&key, "hi", "Ali", InputKind::Text).await, "reply from k1");
    }

    #[test]
    fn test_prompt_layout() {
        let history = vec!["Ali: kahan ho".to_string(), "Me: ghar".to_string()];
        let prompt = build_prompt("Ali", InputKind::Voice, &history, "acha theek hai");

        assert!(prompt.contains("chatting with \"Ali\""));
        assert!(prompt.contains("VOICE NOTE"));
        assert!(prompt.contains("HISTORY:\nAli: kahan ho\nMe: ghar\n---"));
        assert!(prompt.ends_with("USER (voice): acha theek hai\nME:"));

        let text_prompt = build_prompt("Ali", InputKind::Text, &[], "hello");
        assert!(!text_prompt.contains("VOICE NOTE"));
    }

    #[test]
    fn test_credential_debug_is_masked() {
        let debug = format!("{:?}", Credential::new("AIzaSySecret"));
        assert!(!debug.contains("Secret"));
    }

    #[test]
    fn test_model_mode_values() {
        assert_eq!(ModelMode::from_store_value("2"), ModelMode::CustomFirst);
        assert_eq!(ModelMode::from_store_value("1"), ModelMode::CredentialChain);
        assert_eq!(ModelMode::from_store_value("junk"), ModelMode::CredentialChain);
    }
}
