//! Keep-alive presence loop
//!
//! One background task per ConversationKey keeps the account "available"
//! across rapid-fire messages. It ends itself, announcing "unavailable", once
//! the automation session goes stale or the owner takes over.

use crate::channels::{Presence, Transport};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::message::ConversationKey;
use crate::store::{keys, read_timestamp, ConversationStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Why a keep-alive loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveExit {
    SessionStale,
    OwnerActive,
}

#[derive(Clone)]
pub struct PresenceKeeper {
    store: Arc<dyn ConversationStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    running: Arc<Mutex<HashSet<ConversationKey>>>,
}

/// Releases the per-key claim however the loop ends
struct Claim {
    running: Arc<Mutex<HashSet<ConversationKey>>>,
    key: ConversationKey,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.running.lock().remove(&self.key);
    }
}

impl PresenceKeeper {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            config,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start the loop for `key` unless one is already running
    pub fn ensure(&self, key: &ConversationKey) -> Option<JoinHandle<KeepAliveExit>> {
        if !self.running.lock().insert(key.clone()) {
            return None;
        }
        let claim = Claim {
            running: self.running.clone(),
            key: key.clone(),
        };
        let keeper = self.clone();
        debug!("Keep-alive started for {}", key);
        Some(tokio::spawn(async move {
            let exit = keeper.run(&claim.key).await;
            debug!("Keep-alive for {} ended: {:?}", claim.key, exit);
            drop(claim);
            exit
        }))
    }

    pub fn is_running(&self, key: &ConversationKey) -> bool {
        self.running.lock().contains(key)
    }

    async fn run(&self, key: &ConversationKey) -> KeepAliveExit {
        let interval = Duration::from_secs(self.config.keep_alive_interval_secs);
        loop {
            tokio::time::sleep(interval).await;

            let now = self.clock.now();
            let last = read_timestamp(self.store.as_ref(), &keys::automation_activity(key)).await;
            let owner = read_timestamp(self.store.as_ref(), &keys::owner_activity(key)).await;

            let exit = if last.map_or(true, |t| now - t > self.config.session_timeout_secs as i64) {
                Some(KeepAliveExit::SessionStale)
            } else if owner
                .is_some_and(|t| now - t < self.config.keep_alive_owner_window_secs as i64)
            {
                Some(KeepAliveExit::OwnerActive)
            } else {
                None
            };

            let presence = if exit.is_some() {
                Presence::Unavailable
            } else {
                Presence::Available
            };
            if let Err(e) = self.transport.send_presence(key.chat(), presence).await {
                warn!("Keep-alive presence failed for {}: {}", key, e);
            }
            if let Some(exit) = exit {
                return exit;
            }
        }
    }
}
