//! Automation target roster
//!
//! Per-account set of sender-name patterns the engine answers for. Patterns
//! are stored as first typed; two patterns differing only in case are the
//! same target.

use crate::store::{keys, ConversationStore, StoreResult};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// A sender-name pattern the engine may answer for
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AutomationTarget(String);

impl AutomationTarget {
    /// Trimmed pattern; `None` for blank input
    pub fn new(pattern: &str) -> Option<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn pattern(&self) -> &str {
        &self.0
    }

    /// Same target regardless of case
    pub fn same_pattern(&self, raw: &str) -> bool {
        self.0.to_lowercase() == raw.trim().to_lowercase()
    }

    /// Case-insensitive substring test against one sender identifier
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.to_lowercase().contains(&self.0.to_lowercase())
    }
}

impl fmt::Display for AutomationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// CRUD over the roster set in the conversation store
#[derive(Clone)]
pub struct Roster {
    store: Arc<dyn ConversationStore>,
}

impl Roster {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Returns true if no target with the same pattern was present
    pub async fn add(&self, account: &str, target: &AutomationTarget) -> StoreResult<bool> {
        let key = keys::targets(account);
        let members = self.store.set_members(&key).await?;
        if members.iter().any(|m| target.same_pattern(m)) {
            return Ok(false);
        }
        let added = self.store.set_add(&key, target.pattern()).await?;
        if added {
            info!("Automation target added for {}: {}", account, target);
        }
        Ok(added)
    }

    /// Removes every stored spelling of the target; true if any was present
    pub async fn remove(&self, account: &str, target: &AutomationTarget) -> StoreResult<bool> {
        let key = keys::targets(account);
        let mut removed = false;
        for member in self.store.set_members(&key).await? {
            if target.same_pattern(&member) {
                removed |= self.store.set_remove(&key, &member).await?;
            }
        }
        if removed {
            info!("Automation target removed for {}: {}", account, target);
        }
        Ok(removed)
    }

    /// All targets, sorted
    pub async fn list(&self, account: &str) -> StoreResult<Vec<AutomationTarget>> {
        let mut targets: Vec<AutomationTarget> = self
            .store
            .set_members(&keys::targets(account))
            .await?
            .iter()
            .filter_map(|raw| AutomationTarget::new(raw))
            .collect();
        targets.sort();
        Ok(targets)
    }

    pub async fn clear(&self, account: &str) -> StoreResult<()> {
        self.store.delete(&keys::targets(account)).await?;
        info!("Automation roster cleared for {}", account);
        Ok(())
    }
}
