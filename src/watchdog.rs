//! Interrupt Watchdog
//!
//! The only way a reply job sleeps. Waits in poll-sized steps and re-reads
//! the owner-activity stamp before each one, returning early as soon as the
//! owner is seen acting. Preemption latency is bounded by one poll step.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::message::ConversationKey;
use crate::store::{keys, read_timestamp, ConversationStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result of a watched wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    Interrupted,
}

impl WaitOutcome {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, WaitOutcome::Interrupted)
    }
}

/// Polling wait that yields to the owner
#[derive(Clone)]
pub struct InterruptWatchdog {
    store: Arc<dyn ConversationStore>,
    clock: Arc<dyn Clock>,
    grace_secs: i64,
    poll: Duration,
}

impl InterruptWatchdog {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            grace_secs: config.interrupt_grace_secs as i64,
            poll: config.poll_interval,
        }
    }

    /// Wait up to `secs` poll steps; interrupted on fresh owner activity
    pub async fn wait(&self, key: &ConversationKey, secs: u64) -> WaitOutcome {
        self.wait_since(key, secs, None).await
    }

    /// Like [`wait`](Self::wait), also interrupted by any owner activity at or
    /// after `baseline` (the trigger's timestamp), however old it has become.
    pub async fn wait_since(
        &self,
        key: &ConversationKey,
        secs: u64,
        baseline: Option<i64>,
    ) -> WaitOutcome {
        let owner_key = keys::owner_activity(key);
        for _ in 0..secs {
            if self.owner_active(&owner_key, baseline).await {
                debug!("Owner activity in {} - interrupting wait", key);
                return WaitOutcome::Interrupted;
            }
            tokio::time::sleep(self.poll).await;
        }
        // Last look so activity during the final step is not missed
        if secs > 0 && self.owner_active(&owner_key, baseline).await {
            debug!("Owner activity in {} at end of wait", key);
            return WaitOutcome::Interrupted;
        }
        WaitOutcome::Completed
    }

    /// Single non-sleeping check
    pub async fn is_interrupted(&self, key: &ConversationKey, baseline: Option<i64>) -> bool {
        self.owner_active(&keys::owner_activity(key), baseline).await
    }

    async fn owner_active(&self, owner_key: &str, baseline: Option<i64>) -> bool {
        let Some(owner_ts) = read_timestamp(self.store.as_ref(), owner_key).await else {
            return false;
        };
        let now = self.clock.now();
        if now - owner_ts < self.grace_secs {
            return true;
        }
        baseline.is_some_and(|b| owner_ts >= b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::store::{write_timestamp, MemoryStore};

    const T0: i64 = 1_700_000_000;

    fn setup() -> (Arc<MemoryStore>, Arc<TokioClock>, InterruptWatchdog) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(TokioClock::starting_at(T0));
        let watchdog = InterruptWatchdog::new(store.clone(), clock.clone(), &EngineConfig::default());
        (store, clock, watchdog)
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_completes_without_owner() {
        let (_store, clock, watchdog) = setup();
        let key = ConversationKey::new("acct", "chat");

        let outcome = watchdog.wait(&key, 10).await;
        assert_eq!(outcome, WaitOutcome::Completed);
        assert_eq!(clock.now(), T0 + 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_owner_activity_does_not_interrupt() {
        let (store, _clock, watchdog) = setup();
        let key = ConversationKey::new("acct", "chat");
        write_timestamp(store.as_ref(), &keys::owner_activity(&key), T0 - 30, None).await;

        assert_eq!(watchdog.wait(&key, 3).await, WaitOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_within_a_step() {
        let (store, clock, watchdog) = setup();
        let key = ConversationKey::new("acct", "chat");

        let writer = {
            let store = store.clone();
            let clock = clock.clone();
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(4500)).await;
                write_timestamp(store.as_ref(), &keys::owner_activity(&key), clock.now(), None)
                    .await;
            })
        };

        let outcome = watchdog.wait(&key, 20).await;
        writer.await.unwrap();
        assert_eq!(outcome, WaitOutcome::Interrupted);
        assert!(clock.now() <= T0 + 6, "stopped at {}", clock.now() - T0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_baseline_catches_stale_grace() {
        let (store, _clock, watchdog) = setup();
        let key = ConversationKey::new("acct", "chat");
        // Outside the grace window but after the trigger
        write_timestamp(store.as_ref(), &keys::owner_activity(&key), T0 - 20, None).await;

        assert_eq!(watchdog.wait(&key, 2).await, WaitOutcome::Completed);
        assert_eq!(
            watchdog.wait_since(&key, 2, Some(T0 - 25)).await,
            WaitOutcome::Interrupted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_wait_is_immediate() {
        let (store, clock, watchdog) = setup();
        let key = ConversationKey::new("acct", "chat");
        write_timestamp(store.as_ref(), &keys::owner_activity(&key), T0, None).await;

        assert_eq!(watchdog.wait(&key, 0).await, WaitOutcome::Completed);
        assert_eq!(clock.now(), T0);
        assert!(watchdog.is_interrupted(&key, None).await);
    }
}
