//! Target Matcher
//!
//! Read-only decision for one inbound message: is the owner present (then
//! never automate), and otherwise does any identifier of the sender contain
//! a roster pattern. Store failures fail safe: an unreadable roster is no
//! match, an unreadable owner stamp is "owner absent".

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::message::ConversationKey;
use crate::roster::{AutomationTarget, Roster};
use crate::store::{keys, read_timestamp, ConversationStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Sender identifiers in match priority order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderIdentity {
    pub display_name: Option<String>,
    pub contact_name: Option<String>,
    pub user_id: String,
}

impl SenderIdentity {
    /// Display name, contact full name, raw user id; blanks skipped
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        [self.display_name.as_deref(), self.contact_name.as_deref()]
            .into_iter()
            .flatten()
            .chain(std::iter::once(self.user_id.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Label used in history and prompts
    pub fn label(&self) -> &str {
        self.candidates().next().unwrap_or("Unknown")
    }
}

/// Accepted match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatch {
    pub target: AutomationTarget,
    pub sender_label: String,
}

pub struct TargetMatcher {
    store: Arc<dyn ConversationStore>,
    roster: Roster,
    clock: Arc<dyn Clock>,
    owner_grace_secs: i64,
}

impl TargetMatcher {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            roster: Roster::new(store.clone()),
            store,
            clock,
            owner_grace_secs: config.owner_grace_secs as i64,
        }
    }

    /// Matched target, or `None` when the owner is present or nobody matches
    pub async fn should_automate(
        &self,
        key: &ConversationKey,
        sender: &SenderIdentity,
    ) -> Option<TargetMatch> {
        if self.owner_present(key).await {
            debug!("Owner active in {} - not automating", key);
            return None;
        }

        let targets = match self.roster.list(key.account()).await {
            Ok(targets) => targets,
            Err(e) => {
                warn!("Roster unavailable for {}: {}", key.account(), e);
                return None;
            }
        };

        for candidate in sender.candidates() {
            if let Some(target) = targets.iter().find(|t| t.matches(candidate)) {
                return Some(TargetMatch {
                    target: target.clone(),
                    sender_label: sender.label().to_string(),
                });
            }
        }
        None
    }

    async fn owner_present(&self, key: &ConversationKey) -> bool {
        match read_timestamp(self.store.as_ref(), &keys::owner_activity(key)).await {
            Some(ts) => self.clock.now() - ts < self.owner_grace_secs,
            None => false,
        }
    }
}
