//! Clonebot
//!
//! Presence-simulating auto-reply engine for a personal messaging account.
//! Answers configured contacts on the owner's behalf with human-plausible
//! timing, and yields the moment the owner acts.
//!
//! # Features
//!
//! - **Target Matching**: case-insensitive roster of sender-name patterns
//! - **Timing Simulation**: cold/warm pickup, reading, listening, typing
//! - **Interrupt Watchdog**: every wait polls for owner activity
//! - **Reply Generation**: Gemini with sticky credential rotation, optional custom API
//! - **Bounded History**: last 50 turns per chat, voice notes transcribed
//! - **Keep-Alive Presence**: stays "online" across rapid-fire messages
//!
//! # Architecture
//!
//! ```text
//! Bridge ──► Webhook ──► ReplyEngine ──┬── HistoryRecorder ──► Store (Redis / memory)
//!  (HTTP)    (axum)                    ├── TargetMatcher
//!                                      └── per-chat worker ──► ReplyJob
//!                                                               ├── InterruptWatchdog
//!                                                               ├── ReplyGenerator ──► Gemini
//!                                                               └── Transport ──► Bridge
//! ```

pub mod channels;
pub mod clock;
pub mod commands;
pub mod config;
pub mod custom_api;
pub mod engine;
pub mod gemini;
pub mod generator;
pub mod matcher;
pub mod message;
pub mod recorder;
pub mod roster;
pub mod server;
pub mod store;
pub mod timing;
pub mod transcription;
pub mod watchdog;

#[cfg(test)]
mod test_support;


pub use channels::{BridgeConfig, BridgeTransport, Presence, ReceiptKind, Transport};
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{Config, EngineConfig};
pub use engine::{Dispatch, EngineDeps, JobOutcome, ReplyEngine};
pub use generator::{Credential, ModelMode, ReplyGenerator};
pub use matcher::{SenderIdentity, TargetMatcher};
pub use message::{ConversationKey, InboundMessage, MessageContent};
pub use recorder::HistoryRecorder;
pub use roster::{AutomationTarget, Roster};
pub use server::WebhookServer;
pub use store::{ConversationStore, MemoryStore, RedisStore};
pub use watchdog::{InterruptWatchdog, WaitOutcome};
