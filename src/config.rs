use crate::retry::RetryPolicy;
use std::time::Duration;

/// Session tuning knobs.
///
/// Defaults match the hosted backend's expectations; individual values can
/// be overridden through `PLAYHEAD_*` environment variables (in debug
/// builds a `.env` file is picked up first).
#[derive(Clone, Debug)]
pub struct Config {
    /// Idle window for collapsing remote progress writes
    pub debounce_interval: Duration,
    /// Fraction of the duration at which a lesson counts as completed
    pub completion_threshold: f64,
    /// How long before credential expiry the proactive renewal fires
    pub renewal_lead: Duration,
    /// Minimum distance between acquiring a credential and renewing it
    pub renewal_floor: Duration,
    /// Resume seeks landing closer than this to the end are skipped
    pub end_guard: Duration,
    /// Backoff ladder for credential acquisition
    pub token_retry: RetryPolicy,
    /// Backoff ladder for media reload after network/decode errors
    pub media_retry: RetryPolicy,
    /// Pause the player when the tab is hidden
    pub pause_on_hide: bool,
    /// Resume playback when the tab becomes visible again
    pub resume_on_show: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_interval: Duration::from_secs(15),
            completion_threshold: 0.9,
            renewal_lead: Duration::from_secs(60),
            renewal_floor: Duration::from_secs(30),
            end_guard: Duration::from_millis(500),
            token_retry: RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(5)),
            media_retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(5)),
            pause_on_hide: true,
            resume_on_show: true,
        }
    }
}

impl Config {
    /// Load configuration, applying environment overrides to the defaults.
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        if dotenvy::dotenv().is_ok() {
            tracing::info!("Config: dev mode, loaded .env file");
        }

        Self::from_env()
    }

    /// Build a config from `PLAYHEAD_*` environment variables.
    fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("PLAYHEAD_DEBOUNCE_SECS") {
            config.debounce_interval = Duration::from_secs(secs);
        }
        if let Some(threshold) = env_f64("PLAYHEAD_COMPLETION_THRESHOLD") {
            config.completion_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(secs) = env_u64("PLAYHEAD_RENEWAL_LEAD_SECS") {
            config.renewal_lead = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("PLAYHEAD_RENEWAL_FLOOR_SECS") {
            config.renewal_floor = Duration::from_secs(secs);
        }
        if let Ok(value) = std::env::var("PLAYHEAD_PAUSE_ON_HIDE") {
            config.pause_on_hide = value.to_lowercase() != "false";
        }
        if let Ok(value) = std::env::var("PLAYHEAD_RESUME_ON_SHOW") {
            config.resume_on_show = value.to_lowercase() != "false";
        }

        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
