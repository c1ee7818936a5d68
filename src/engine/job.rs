//! Reply job state machine
//!
//! One job per accepted trigger. Phases run strictly in order:
//!
//! ```text
//! MatchAccepted -> ColdStartWait | ActiveWait -> OnlineAnnounce -> Perceiving
//!     -> Thinking -> TypingSim -> Sending -> Done
//! ```
//!
//! Every wait goes through the interrupt watchdog; an interrupted wait ends
//! the job in `Aborted` with no further visible side effect. Pace (cold or
//! warm) is classified once at `MatchAccepted` and held for the whole job.

use super::EngineCore;
use crate::channels::{Presence, ReceiptKind};
use crate::message::{ConversationKey, InboundMessage, InputKind, MessageContent};
use crate::roster::AutomationTarget;
use crate::store::{keys, read_timestamp, write_timestamp};
use crate::timing::{self, Pace};
use std::fmt;
use tracing::{debug, info, warn};

/// Accepted inbound message waiting to be answered
#[derive(Debug, Clone)]
pub struct Trigger {
    pub message: InboundMessage,
    pub sender_label: String,
    pub target: AutomationTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    MatchAccepted,
    ColdStartWait,
    ActiveWait,
    OnlineAnnounce,
    Perceiving,
    Thinking,
    TypingSim,
    Sending,
    Aborted,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::MatchAccepted => "match_accepted",
            Phase::ColdStartWait => "cold_start_wait",
            Phase::ActiveWait => "active_wait",
            Phase::OnlineAnnounce => "online_announce",
            Phase::Perceiving => "perceiving",
            Phase::Thinking => "thinking",
            Phase::TypingSim => "typing_sim",
            Phase::Sending => "sending",
            Phase::Aborted => "aborted",
            Phase::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Aborted | Phase::Done)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job finished without sending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilentReason {
    /// Stickers, images and the like are looked at, never answered
    NonConversational,
    EmptyInput,
    TranscriptionFailed,
    /// Generator returned nothing (all credentials failed, or chose silence)
    NoReply,
    SendFailed,
}

/// Terminal result of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Sent { message_id: String },
    Silent(SilentReason),
    /// Owner took over; `phase` is where the job was when it noticed
    Aborted { phase: Phase },
}

impl JobOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, JobOutcome::Sent { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, JobOutcome::Aborted { .. })
    }
}

pub struct ReplyJob<'a> {
    core: &'a EngineCore,
    key: ConversationKey,
    trigger: Trigger,
    pace: Pace,
    phase: Phase,
    composing: bool,
}

impl<'a> ReplyJob<'a> {
    pub fn new(core: &'a EngineCore, key: ConversationKey, trigger: Trigger) -> Self {
        Self {
            core,
            key,
            trigger,
            pace: Pace::Cold,
            phase: Phase::MatchAccepted,
            composing: false,
        }
    }

    /// Drive the job to a terminal phase
    pub async fn run(mut self) -> JobOutcome {
        let outcome = self.drive().await;
        self.enter(if outcome.is_aborted() {
            Phase::Aborted
        } else {
            Phase::Done
        });

        let stats = &self.core.stats;
        match &outcome {
            JobOutcome::Sent { message_id } => {
                stats.record_sent();
                info!(
                    "Replied to {} in {} ({} pace, id {})",
                    self.trigger.sender_label,
                    self.key,
                    self.pace.as_str(),
                    message_id
                );
            }
            JobOutcome::Silent(reason) => {
                stats.record_silent();
                info!("No reply in {}: {:?}", self.key, reason);
            }
            JobOutcome::Aborted { phase } => {
                stats.record_aborted();
                info!("Owner took over {} during {}", self.key, phase);
            }
        }
        outcome
    }

    async fn drive(&mut self) -> JobOutcome {
        let core = self.core;
        let config = &core.config;

        // MATCH_ACCEPTED
        let now = core.clock.now();
        let last = read_timestamp(core.store.as_ref(), &keys::automation_activity(&self.key)).await;
        self.pace = Pace::classify(now, last, config);
        debug!(
            "Job for {} (target {}) starts {}",
            self.key,
            self.trigger.target,
            self.pace.as_str()
        );

        // COLD_START_WAIT / ACTIVE_WAIT
        let (phase, secs) = match self.pace {
            Pace::Cold => (
                Phase::ColdStartWait,
                timing::cold_start_secs(&mut *core.rng.lock(), config),
            ),
            Pace::Warm => (Phase::ActiveWait, timing::active_jitter_secs(config)),
        };
        self.enter(phase);
        if self.wait(secs).await {
            return self.abort().await;
        }

        // ONLINE_ANNOUNCE
        self.enter(Phase::OnlineAnnounce);
        self.stamp_automation().await;
        self.presence(Presence::Available).await;
        core.presence.ensure(&self.key);

        // PERCEIVING
        self.enter(Phase::Perceiving);
        let content = self.trigger.message.content.clone();
        let (input, kind) = match content {
            MessageContent::Text { text } => {
                self.receipt(ReceiptKind::Read).await;
                if self.wait(timing::read_secs(&text, self.pace, config)).await {
                    return self.abort().await;
                }
                if text.trim().is_empty() {
                    return JobOutcome::Silent(SilentReason::EmptyInput);
                }
                (text, InputKind::Text)
            }
            MessageContent::Voice {
                duration_secs,
                media,
            } => {
                self.receipt(ReceiptKind::Read).await;
                let listen = timing::listen_secs(&mut *core.rng.lock(), duration_secs, config);
                if self.wait(listen).await {
                    return self.abort().await;
                }
                self.receipt(ReceiptKind::Played).await;
                match core.recorder.transcribe(&media).await {
                    Some(text) => (text, InputKind::Voice),
                    None => return JobOutcome::Silent(SilentReason::TranscriptionFailed),
                }
            }
            MessageContent::Media { kind } => {
                debug!("{} sent {} in {}", self.trigger.sender_label, kind.as_str(), self.key);
                if self.wait(timing::media_dwell_secs(config)).await {
                    return self.abort().await;
                }
                return JobOutcome::Silent(SilentReason::NonConversational);
            }
        };

        // THINKING
        self.enter(Phase::Thinking);
        let reply = core
            .generator
            .generate(&self.key, &input, &self.trigger.sender_label, kind)
            .await;
        // The call is never cancelled; its result is dropped if the owner acted meanwhile
        if self.interrupted().await {
            return self.abort().await;
        }
        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return JobOutcome::Silent(SilentReason::NoReply);
        }

        // TYPING_SIM
        self.enter(Phase::TypingSim);
        self.presence(Presence::Composing).await;
        self.composing = true;
        if self.wait(timing::typing_secs(&reply, self.pace, config)).await {
            return self.abort().await;
        }

        // SENDING
        self.enter(Phase::Sending);
        self.presence(Presence::Paused).await;
        self.composing = false;
        core.remember_outgoing(self.key.chat(), &reply).await;
        let chat = self.key.chat().to_string();
        match core
            .transport
            .send_text(&chat, &reply, Some(&self.trigger.message.id))
            .await
        {
            Ok(message_id) => {
                core.remember_sent_id(&chat, &reply, &message_id).await;
                core.recorder.record_outgoing(&self.key, &reply).await;
                self.stamp_automation().await;
                core.presence.ensure(&self.key);
                JobOutcome::Sent { message_id }
            }
            Err(e) => {
                warn!("Send failed in {}: {}", self.key, e);
                JobOutcome::Silent(SilentReason::SendFailed)
            }
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!("{}: {} -> {}", self.key, self.phase, phase);
        self.phase = phase;
    }

    /// Watched wait; true if the owner interrupted
    async fn wait(&self, secs: u64) -> bool {
        self.core
            .watchdog
            .wait_since(&self.key, secs, Some(self.trigger.message.timestamp))
            .await
            .is_interrupted()
    }

    async fn interrupted(&self) -> bool {
        self.core
            .watchdog
            .is_interrupted(&self.key, Some(self.trigger.message.timestamp))
            .await
    }

    async fn abort(&mut self) -> JobOutcome {
        let phase = self.phase;
        if self.composing {
            self.presence(Presence::Paused).await;
            self.composing = false;
        }
        JobOutcome::Aborted { phase }
    }

    async fn stamp_automation(&self) {
        write_timestamp(
            self.core.store.as_ref(),
            &keys::automation_activity(&self.key),
            self.core.clock.now(),
            Some(self.core.config.activity_ttl()),
        )
        .await;
    }

    async fn presence(&self, presence: Presence) {
        if let Err(e) = self
            .core
            .transport
            .send_presence(self.key.chat(), presence)
            .await
        {
            warn!("Presence {} failed in {}: {}", presence, self.key, e);
        }
    }

    async fn receipt(&self, kind: ReceiptKind) {
        let message = &self.trigger.message;
        if let Err(e) = self
            .core
            .transport
            .mark_receipt(self.key.chat(), &message.sender_id, &message.id, kind)
            .await
        {
            warn!("Receipt {} failed in {}: {}", kind, self.key, e);
        }
    }
}
