//! Engine counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineStats {
    matched: AtomicU64,
    sent: AtomicU64,
    aborted: AtomicU64,
    silent: AtomicU64,
    coalesced: AtomicU64,
}

/// Point-in-time copy for `/health`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub matched: u64,
    pub sent: u64,
    pub aborted: u64,
    pub silent: u64,
    pub coalesced: u64,
}

impl EngineStats {
    pub fn record_match(&self) {
        self.matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_silent(&self) {
        self.silent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            matched: self.matched.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            silent: self.silent.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}
