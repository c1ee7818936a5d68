//! Wall-clock source for activity timestamps
//!
//! Activity stamps are Unix seconds shared through the store, so every
//! component reads "now" through one [`Clock`]. Sleeping always goes through
//! `tokio::time`, which lets tests run on paused time with [`TokioClock`].

use std::fmt::Debug;
use tokio::time::Instant;

/// Source of Unix time in whole seconds
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> i64;
}

/// System UTC clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Unix time anchored at construction and advanced by tokio's clock.
///
/// Under `tokio::time::pause()` this clock only moves when the runtime
/// auto-advances, so it stays consistent with `tokio::time::sleep`.
#[derive(Debug, Clone)]
pub struct TokioClock {
    base: i64,
    start: Instant,
}

impl TokioClock {
    pub fn starting_at(base: i64) -> Self {
        Self {
            base,
            start: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp())
    }
}

impl Clock for TokioClock {
    fn now(&self) -> i64 {
        self.base + self.start.elapsed().as_secs() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::starting_at(1_000);
        assert_eq!(clock.now(), 1_000);

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(clock.now(), 1_007);
    }

    #[test]
    fn test_system_clock_is_unix_seconds() {
        let now = SystemClock.now();
        assert!(now > 1_600_000_000);
    }
}
