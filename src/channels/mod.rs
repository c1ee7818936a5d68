//! Messaging Transport Layer
//!
//! The engine never talks to a messaging protocol directly. Everything it
//! needs goes through the [`Transport`] trait:
//! - HTTP bridge to a protocol sidecar (implemented)
//!
//! Inbound delivery is the other half of the bridge and lives in
//! [`crate::server`].

pub mod bridge;
pub mod traits;

pub use bridge::{BridgeConfig, BridgeTransport};
pub use traits::{ChannelError, Presence, ReceiptKind, Transport};
