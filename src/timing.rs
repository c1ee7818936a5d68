//! Human-plausible phase durations
//!
//! Pure functions of the message, the reply and the session pace. Randomness
//! is injected so the engine can be driven by a seeded RNG in tests.

use crate::config::EngineConfig;
use rand::Rng;

/// Session classification, fixed for the whole life of a reply job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Automation idle past the session timeout (or never active)
    Cold,
    /// Automation was active recently
    Warm,
}

impl Pace {
    /// Classify from the automation-activity stamp
    pub fn classify(now: i64, last_automation: Option<i64>, config: &EngineConfig) -> Self {
        match last_automation {
            Some(last) if now - last <= config.session_timeout_secs as i64 => Pace::Warm,
            _ => Pace::Cold,
        }
    }

    pub fn is_cold(&self) -> bool {
        matches!(self, Pace::Cold)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pace::Cold => "cold",
            Pace::Warm => "warm",
        }
    }
}

/// Invisible delay before a cold pickup
pub fn cold_start_secs<R: Rng + ?Sized>(rng: &mut R, config: &EngineConfig) -> u64 {
    rng.gen_range(config.cold_start_min_secs..=config.cold_start_max_secs)
}

/// Pickup delay in a warm session
pub fn active_jitter_secs(config: &EngineConfig) -> u64 {
    config.active_jitter_secs
}

/// Reading time: one second per `read_words_per_sec` words, rounded up
pub fn read_secs(text: &str, pace: Pace, config: &EngineConfig) -> u64 {
    let words = text.split_whitespace().count() as u64;
    let secs = words.div_ceil(config.read_words_per_sec).max(1);
    match pace {
        Pace::Warm => secs.min(config.warm_read_cap_secs),
        Pace::Cold => secs,
    }
}

/// Listening time: the note's own duration, or a short random fallback
pub fn listen_secs<R: Rng + ?Sized>(
    rng: &mut R,
    duration_secs: Option<u32>,
    config: &EngineConfig,
) -> u64 {
    match duration_secs {
        Some(d) if d > 0 => d as u64,
        _ => rng.gen_range(config.voice_fallback_min_secs..=config.voice_fallback_max_secs),
    }
}

/// Glance time for stickers, images and other non-conversational media
pub fn media_dwell_secs(config: &EngineConfig) -> u64 {
    config.media_dwell_secs
}

/// Typing time for `reply`, faster when warm, clamped to the indicator window
pub fn typing_secs(reply: &str, pace: Pace, config: &EngineConfig) -> u64 {
    let cps = match pace {
        Pace::Cold => config.typing_cps_cold,
        Pace::Warm => config.typing_cps_warm,
    };
    let chars = reply.chars().count() as u64;
    (chars / cps).clamp(config.typing_min_secs, config.typing_max_secs)
}
