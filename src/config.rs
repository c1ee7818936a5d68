//! Configuration management
//!
//! [`Config`] holds process wiring (URLs, credentials); [`EngineConfig`] holds
//! every timing tunable of the reply engine in one place so no phase embeds
//! its own literals.

use crate::generator::Credential;
use anyhow::Result;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Highest numbered `GOOGLE_API_KEY_<n>` that is read
const MAX_NUMBERED_KEYS: usize = 50;

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis URL for conversation state (optional - in-process store otherwise)
    pub redis_url: Option<String>,

    /// Messaging sidecar base URL
    pub bridge_url: String,

    /// Account the automation speaks for
    pub account_id: String,

    /// Webhook listen address
    pub listen_addr: SocketAddr,

    /// Whisper server base URL
    pub transcribe_url: String,

    /// Keyless completion endpoint (model mode 2)
    pub custom_api_url: Option<String>,

    /// Gemini model id
    pub gemini_model: String,

    /// Per-call generation timeout
    pub generation_timeout: Duration,

    /// Ordered generation credentials
    pub credentials: Vec<Credential>,

    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let account_id = lookup("BRIDGE_ACCOUNT_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("BRIDGE_ACCOUNT_ID not set"))?;

        let listen_addr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8090".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid LISTEN_ADDR: {}", e))?;

        let generation_timeout = Duration::from_secs(
            lookup("GENERATION_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        );

        Ok(Self {
            redis_url: lookup("REDIS_URL").filter(|v| !v.is_empty()),
            bridge_url: lookup("BRIDGE_URL")
                .unwrap_or_else(|| "http://localhost:8081".to_string()),
            account_id,
            listen_addr,
            transcribe_url: lookup("TRANSCRIBE_URL")
                .unwrap_or_else(|| "http://localhost:5000".to_string()),
            custom_api_url: lookup("CUSTOM_API_URL").filter(|v| !v.is_empty()),
            gemini_model: lookup("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            generation_timeout,
            credentials: load_credentials(&lookup),
            engine: EngineConfig::from_lookup(&lookup),
        })
    }
}

/// `GOOGLE_API_KEY` first, then `GOOGLE_API_KEY_1..=50`; blanks skipped
pub fn load_credentials(lookup: impl Fn(&str) -> Option<String>) -> Vec<Credential> {
    std::iter::once("GOOGLE_API_KEY".to_string())
        .chain((1..=MAX_NUMBERED_KEYS).map(|i| format!("GOOGLE_API_KEY_{}", i)))
        .filter_map(|name| lookup(&name))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(Credential::new)
        .collect()
}

/// Reply engine tunables (all durations in whole seconds)
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Owner activity this recent suppresses matching
    pub owner_grace_secs: u64,
    /// Owner activity this recent interrupts a running wait
    pub interrupt_grace_secs: u64,
    /// Automation idle longer than this makes a session cold; also the activity TTL
    pub session_timeout_secs: u64,
    /// Invisible delay before a cold-start pickup
    pub cold_start_min_secs: u64,
    pub cold_start_max_secs: u64,
    /// Pickup delay in a warm session
    pub active_jitter_secs: u64,
    /// Reading speed
    pub read_words_per_sec: u64,
    /// Cap on reading time once warm
    pub warm_read_cap_secs: u64,
    /// Listening time when a voice note reports no duration
    pub voice_fallback_min_secs: u64,
    pub voice_fallback_max_secs: u64,
    /// Glance time for non-conversational media
    pub media_dwell_secs: u64,
    /// Typing speed (chars per second)
    pub typing_cps_cold: u64,
    pub typing_cps_warm: u64,
    /// Typing indicator clamp
    pub typing_min_secs: u64,
    pub typing_max_secs: u64,
    /// Keep-alive re-announce interval
    pub keep_alive_interval_secs: u64,
    /// Owner activity this recent ends the keep-alive loop
    pub keep_alive_owner_window_secs: u64,
    /// Watchdog poll step
    pub poll_interval: Duration,
    /// History list cap
    pub history_limit: usize,
    /// Messages older than this are replays and are ignored
    pub stale_message_secs: u64,
    /// Prefix of operator commands
    pub command_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            owner_grace_secs: 60,
            interrupt_grace_secs: 5,
            session_timeout_secs: 120,
            cold_start_min_secs: 8,
            cold_start_max_secs: 15,
            active_jitter_secs: 1,
            read_words_per_sec: 4,
            warm_read_cap_secs: 3,
            voice_fallback_min_secs: 3,
            voice_fallback_max_secs: 5,
            media_dwell_secs: 3,
            typing_cps_cold: 10,
            typing_cps_warm: 15,
            typing_min_secs: 2,
            typing_max_secs: 12,
            keep_alive_interval_secs: 5,
            keep_alive_owner_window_secs: 10,
            poll_interval: Duration::from_secs(1),
            history_limit: 50,
            stale_message_secs: 60,
            command_prefix: ".".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `AUTOREPLY_*` variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let read = |name: &str, slot: &mut u64| override_from(&lookup, name, slot);

        read("AUTOREPLY_OWNER_GRACE_SECS", &mut config.owner_grace_secs);
        read("AUTOREPLY_INTERRUPT_GRACE_SECS", &mut config.interrupt_grace_secs);
        read("AUTOREPLY_SESSION_TIMEOUT_SECS", &mut config.session_timeout_secs);
        read("AUTOREPLY_COLD_START_MIN_SECS", &mut config.cold_start_min_secs);
        read("AUTOREPLY_COLD_START_MAX_SECS", &mut config.cold_start_max_secs);
        read("AUTOREPLY_ACTIVE_JITTER_SECS", &mut config.active_jitter_secs);
        read("AUTOREPLY_READ_WORDS_PER_SEC", &mut config.read_words_per_sec);
        read("AUTOREPLY_WARM_READ_CAP_SECS", &mut config.warm_read_cap_secs);
        read("AUTOREPLY_VOICE_FALLBACK_MIN_SECS", &mut config.voice_fallback_min_secs);
        read("AUTOREPLY_VOICE_FALLBACK_MAX_SECS", &mut config.voice_fallback_max_secs);
        read("AUTOREPLY_MEDIA_DWELL_SECS", &mut config.media_dwell_secs);
        read("AUTOREPLY_TYPING_CPS_COLD", &mut config.typing_cps_cold);
        read("AUTOREPLY_TYPING_CPS_WARM", &mut config.typing_cps_warm);
        read("AUTOREPLY_TYPING_MIN_SECS", &mut config.typing_min_secs);
        read("AUTOREPLY_TYPING_MAX_SECS", &mut config.typing_max_secs);
        read("AUTOREPLY_KEEP_ALIVE_SECS", &mut config.keep_alive_interval_secs);
        read(
            "AUTOREPLY_KEEP_ALIVE_OWNER_WINDOW_SECS",
            &mut config.keep_alive_owner_window_secs,
        );
        read("AUTOREPLY_STALE_MESSAGE_SECS", &mut config.stale_message_secs);
        override_from(&lookup, "AUTOREPLY_HISTORY_LIMIT", &mut config.history_limit);
        if let Some(prefix) = lookup("COMMAND_PREFIX").filter(|p| !p.trim().is_empty()) {
            config.command_prefix = prefix.trim().to_string();
        }

        config.normalized()
    }

    /// Repair inverted ranges and zero divisors
    pub fn normalized(mut self) -> Self {
        if self.cold_start_max_secs < self.cold_start_min_secs {
            self.cold_start_max_secs = self.cold_start_min_secs;
        }
        if self.voice_fallback_max_secs < self.voice_fallback_min_secs {
            self.voice_fallback_max_secs = self.voice_fallback_min_secs;
        }
        if self.typing_max_secs < self.typing_min_secs {
            self.typing_max_secs = self.typing_min_secs;
        }
        self.read_words_per_sec = self.read_words_per_sec.max(1);
        self.typing_cps_cold = self.typing_cps_cold.max(1);
        self.typing_cps_warm = self.typing_cps_warm.max(1);
        self.keep_alive_interval_secs = self.keep_alive_interval_secs.max(1);
        self.history_limit = self.history_limit.max(1);
        self
    }

    /// TTL applied to the automation activity stamp
    pub fn activity_ttl(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// TTL applied to the owner stamp; outlives every window that reads it
    pub fn owner_activity_ttl(&self) -> Duration {
        let longest = self
            .session_timeout_secs
            .max(self.owner_grace_secs)
            .max(self.interrupt_grace_secs)
            .max(self.keep_alive_owner_window_secs);
        Duration::from_secs(longest)
    }
}

fn override_from<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut T) {
    if let Some(v) = lookup(name).and_then(|v| v.trim().parse().ok()) {
        *slot = v;
    }
}
