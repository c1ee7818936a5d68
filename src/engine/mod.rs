//! Reply Engine
//!
//! Entry point for every inbound message. Filters out chats and messages the
//! engine never touches, records the turn in the background, runs operator
//! commands, and hands matched messages to a per-conversation worker that
//! drives [`job::ReplyJob`]s one at a time.

pub mod coordinator;
pub mod job;
pub mod presence;
pub mod stats;

pub use coordinator::{Admission, JobCoordinator};
pub use job::{JobOutcome, Phase, ReplyJob, SilentReason, Trigger};
pub use presence::{KeepAliveExit, PresenceKeeper};
pub use stats::{EngineStats, StatsSnapshot};

use crate::channels::Transport;
use crate::clock::Clock;
use crate::commands::{self, CommandHandler};
use crate::config::EngineConfig;
use crate::generator::ReplyGenerator;
use crate::matcher::{SenderIdentity, TargetMatcher};
use crate::message::{ConversationKey, InboundMessage};
use crate::recorder::{HistoryRecorder, OWNER_LABEL};
use crate::roster::Roster;
use crate::store::ConversationStore;
use crate::transcription::Transcriber;
use crate::watchdog::InterruptWatchdog;
use moka::future::Cache;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long sent messages are remembered for echo suppression
const SENT_MEMORY: Duration = Duration::from_secs(600);

/// Why an inbound message was not acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Group,
    Broadcast,
    /// Older than the stale cutoff (history replay after reconnect)
    Stale,
    /// Our own sent message coming back from the transport
    Echo,
    Disabled,
    NoMatch,
}

/// What `handle_inbound` did with a message
#[derive(Debug)]
pub enum Dispatch {
    Ignored(IgnoreReason),
    /// Operator command executed and confirmed
    Command,
    /// Owner turn recorded; never automated
    Recorded,
    /// New worker for this conversation
    Started(JoinHandle<Vec<JobOutcome>>),
    /// Parked behind the active job of this conversation
    Queued { replaced: bool },
}

impl Dispatch {
    pub fn label(&self) -> &'static str {
        match self {
            Dispatch::Ignored(_) => "ignored",
            Dispatch::Command => "command",
            Dispatch::Recorded => "recorded",
            Dispatch::Started(_) => "started",
            Dispatch::Queued { .. } => "queued",
        }
    }
}

/// Collaborators the engine is wired to
pub struct EngineDeps {
    pub store: Arc<dyn ConversationStore>,
    pub transport: Arc<dyn Transport>,
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: ReplyGenerator,
    pub clock: Arc<dyn Clock>,
}

/// Shared state behind every worker
pub struct EngineCore {
    config: EngineConfig,
    store: Arc<dyn ConversationStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    generator: ReplyGenerator,
    recorder: HistoryRecorder,
    matcher: TargetMatcher,
    watchdog: InterruptWatchdog,
    presence: PresenceKeeper,
    commands: CommandHandler,
    coordinator: JobCoordinator<ConversationKey, Trigger>,
    stats: EngineStats,
    sent: Cache<String, ()>,
    rng: Mutex<StdRng>,
}

impl EngineCore {
    /// Remember text about to be sent so its echo is recognized before the id is known
    async fn remember_outgoing(&self, chat: &str, text: &str) {
        self.sent.insert(outgoing_fingerprint(chat, text), ()).await;
    }

    /// Swap the text fingerprint for the transport id once the send returns
    async fn remember_sent_id(&self, chat: &str, text: &str, message_id: &str) {
        self.sent.invalidate(&outgoing_fingerprint(chat, text)).await;
        self.sent.insert(message_id.to_string(), ()).await;
    }

    /// Each sent message suppresses exactly one echo
    async fn is_echo(&self, message: &InboundMessage) -> bool {
        let by_text = message
            .text()
            .map(|text| outgoing_fingerprint(&message.chat_id, text.trim()));
        if self.sent.remove(&message.id).await.is_some() {
            if let Some(fingerprint) = &by_text {
                self.sent.invalidate(fingerprint).await;
            }
            return true;
        }
        match by_text {
            Some(fingerprint) => self.sent.remove(&fingerprint).await.is_some(),
            None => false,
        }
    }
}

fn outgoing_fingerprint(chat: &str, text: &str) -> String {
    format!("{}\u{1f}{}", chat, text)
}

/// Releases the conversation slot if a worker dies mid-job
struct SlotGuard {
    core: Arc<EngineCore>,
    key: ConversationKey,
    armed: bool,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("Reply worker for {} ended abnormally", self.key);
            self.core.coordinator.release(&self.key);
        }
    }
}

/// Presence-simulating auto-reply engine
#[derive(Clone)]
pub struct ReplyEngine {
    core: Arc<EngineCore>,
}

impl ReplyEngine {
    pub fn new(config: EngineConfig, deps: EngineDeps) -> Self {
        let config = config.normalized();
        let EngineDeps {
            store,
            transport,
            transcriber,
            generator,
            clock,
        } = deps;

        let recorder = HistoryRecorder::new(
            store.clone(),
            transport.clone(),
            transcriber,
            clock.clone(),
            config.clone(),
        );
        let matcher = TargetMatcher::new(store.clone(), clock.clone(), &config);
        let watchdog = InterruptWatchdog::new(store.clone(), clock.clone(), &config);
        let presence =
            PresenceKeeper::new(store.clone(), transport.clone(), clock.clone(), config.clone());

        Self {
            core: Arc::new(EngineCore {
                commands: CommandHandler::new(store.clone()),
                sent: Cache::builder()
                    .max_capacity(10_000)
                    .time_to_live(SENT_MEMORY)
                    .build(),
                coordinator: JobCoordinator::new(),
                stats: EngineStats::default(),
                rng: Mutex::new(StdRng::from_entropy()),
                config,
                store,
                transport,
                clock,
                generator,
                recorder,
                matcher,
                watchdog,
                presence,
            }),
        }
    }

    /// Process one inbound message from the transport
    pub async fn handle_inbound(&self, message: InboundMessage) -> Dispatch {
        let core = &self.core;
        let key = ConversationKey::new(core.transport.account_id(), &message.chat_id);

        if message.is_group {
            return Dispatch::Ignored(IgnoreReason::Group);
        }
        if message.is_broadcast() {
            return Dispatch::Ignored(IgnoreReason::Broadcast);
        }
        if message.age_secs(core.clock.now()) > core.config.stale_message_secs as i64 {
            debug!("Stale message {} in {}", message.id, key);
            return Dispatch::Ignored(IgnoreReason::Stale);
        }
        if message.is_from_me && core.is_echo(&message).await {
            return Dispatch::Ignored(IgnoreReason::Echo);
        }

        if message.is_from_me {
            if let Some(text) = message.text() {
                if let Some(parsed) = commands::parse(text, &core.config.command_prefix) {
                    self.run_command(&key, &message, parsed).await;
                    return Dispatch::Command;
                }
            }
        }

        let sender = if message.is_from_me {
            SenderIdentity {
                display_name: Some(OWNER_LABEL.to_string()),
                contact_name: None,
                user_id: message.sender_user().to_string(),
            }
        } else {
            SenderIdentity {
                display_name: message.sender_name.clone(),
                contact_name: core.transport.contact_name(&message.sender_id).await,
                user_id: message.sender_user().to_string(),
            }
        };

        {
            let recorder = core.recorder.clone();
            let key = key.clone();
            let label = sender.label().to_string();
            let message = message.clone();
            tokio::spawn(async move { recorder.record(&key, &label, &message).await });
        }

        if message.is_from_me {
            return Dispatch::Recorded;
        }
        if !core.commands.is_enabled(key.account()).await {
            return Dispatch::Ignored(IgnoreReason::Disabled);
        }
        let Some(matched) = core.matcher.should_automate(&key, &sender).await else {
            return Dispatch::Ignored(IgnoreReason::NoMatch);
        };

        core.stats.record_match();
        info!(
            "{} matched target {} in {}",
            matched.sender_label, matched.target, key
        );
        let trigger = Trigger {
            message,
            sender_label: matched.sender_label,
            target: matched.target,
        };

        match core.coordinator.admit(&key, trigger) {
            Admission::Start(trigger) => Dispatch::Started(self.spawn_worker(key, trigger)),
            Admission::Queued { replaced } => {
                if replaced {
                    core.stats.record_coalesced();
                }
                debug!("Job active in {} - trigger queued (replaced: {})", key, replaced);
                Dispatch::Queued { replaced }
            }
        }
    }

    /// Run jobs for `key` until its pending slot is empty
    fn spawn_worker(&self, key: ConversationKey, first: Trigger) -> JoinHandle<Vec<JobOutcome>> {
        let core = self.core.clone();
        tokio::spawn(async move {
            let mut guard = SlotGuard {
                core: core.clone(),
                key: key.clone(),
                armed: true,
            };
            let mut outcomes = Vec::new();
            let mut next = Some(first);
            while let Some(trigger) = next {
                outcomes.push(ReplyJob::new(&core, key.clone(), trigger).run().await);
                next = core.coordinator.finish(&key);
            }
            guard.armed = false;
            outcomes
        })
    }

    async fn run_command(
        &self,
        key: &ConversationKey,
        message: &InboundMessage,
        parsed: Result<commands::AutoAiCommand, commands::CommandError>,
    ) {
        let core = &self.core;
        let reply = match parsed {
            Ok(command) => match core.commands.execute(key.account(), &command).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("autoai command failed for {}: {}", key.account(), e);
                    "⚠️ Store unavailable, try again.".to_string()
                }
            },
            Err(e) => e.usage(),
        };

        core.remember_outgoing(key.chat(), &reply).await;
        match core.transport.send_text(key.chat(), &reply, Some(&message.id)).await {
            Ok(id) => core.remember_sent_id(key.chat(), &reply, &id).await,
            Err(e) => warn!("Command reply failed in {}: {}", key, e),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }

    pub fn active_jobs(&self) -> usize {
        self.core.coordinator.active_count()
    }

    pub fn roster(&self) -> Roster {
        Roster::new(self.core.store.clone())
    }

    pub fn recorder(&self) -> &HistoryRecorder {
        &self.core.recorder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }
}
