//! Configuration loading and parsing.
//!
//! Defines the engine config schema and resolves defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level engine configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct EngineConfig {
    /// Remote playback service base URL.
    pub service_base_url: Option<String>,
    /// Recommendation service base URL.
    pub recommender_base_url: Option<String>,
    /// Recommendation model identifier passed through to the service.
    pub recommender_model: Option<String>,
    /// Queue poll interval while playing, in milliseconds (default: 3000).
    pub queue_poll_playing_ms: Option<u64>,
    /// Queue poll interval while idle, in milliseconds (default: 10000).
    pub queue_poll_idle_ms: Option<u64>,
    /// Playback poll interval while playing, in milliseconds (default: 1000).
    pub playback_poll_playing_ms: Option<u64>,
    /// Playback poll interval while idle, in milliseconds (default: 5000).
    pub playback_poll_idle_ms: Option<u64>,
    /// Settle delay before optimistic state reconciles, in milliseconds (default: 2000).
    pub settle_delay_ms: Option<u64>,
    /// Delay between primitive skip calls, in milliseconds (default: 150).
    pub skip_step_delay_ms: Option<u64>,
    /// Delay before forced refresh after a skip, in milliseconds (default: 1000).
    pub post_skip_refresh_ms: Option<u64>,
    /// Queue membership retention window, in seconds (default: 3600).
    pub membership_retention_secs: Option<u64>,
}

/// Engine configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct EngineConfigResolved {
    /// Remote playback service base URL.
    pub service_base_url: String,
    /// Recommendation service base URL.
    pub recommender_base_url: String,
    /// Recommendation model identifier.
    pub recommender_model: Option<String>,
    /// Queue poll interval while playing.
    pub queue_poll_playing: Duration,
    /// Queue poll interval while idle.
    pub queue_poll_idle: Duration,
    /// Playback poll interval while playing.
    pub playback_poll_playing: Duration,
    /// Playback poll interval while idle.
    pub playback_poll_idle: Duration,
    /// Settle delay before optimistic state reconciles.
    pub settle_delay: Duration,
    /// Delay between primitive skip calls.
    pub skip_step_delay: Duration,
    /// Delay before forced refresh after a skip.
    pub post_skip_refresh: Duration,
    /// Queue membership retention window.
    pub membership_retention: Duration,
}

impl EngineConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<EngineConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    /// Apply defaults to unset fields.
    pub fn resolve(self) -> EngineConfigResolved {
        EngineConfigResolved {
            service_base_url: self
                .service_base_url
                .unwrap_or_else(|| "https://api.streaming.example/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            recommender_base_url: self
                .recommender_base_url
                .unwrap_or_else(|| "https://recommender.example/api".to_string())
                .trim_end_matches('/')
                .to_string(),
            recommender_model: self.recommender_model,
            queue_poll_playing: Duration::from_millis(self.queue_poll_playing_ms.unwrap_or(3_000)),
            queue_poll_idle: Duration::from_millis(self.queue_poll_idle_ms.unwrap_or(10_000)),
            playback_poll_playing: Duration::from_millis(
                self.playback_poll_playing_ms.unwrap_or(1_000),
            ),
            playback_poll_idle: Duration::from_millis(self.playback_poll_idle_ms.unwrap_or(5_000)),
            settle_delay: Duration::from_millis(self.settle_delay_ms.unwrap_or(2_000)),
            skip_step_delay: Duration::from_millis(self.skip_step_delay_ms.unwrap_or(150)),
            post_skip_refresh: Duration::from_millis(self.post_skip_refresh_ms.unwrap_or(1_000)),
            membership_retention: Duration::from_secs(
                self.membership_retention_secs.unwrap_or(3_600),
            ),
        }
    }
}

impl EngineConfigResolved {
    /// Resolved defaults with no config file.
    pub fn default_values() -> Self {
        EngineConfig::default().resolve()
    }

    /// Variant with all delays zeroed, for deterministic tests.
    #[cfg(test)]
    pub(crate) fn zero_delays() -> Self {
        let mut cfg = Self::default_values();
        cfg.settle_delay = Duration::ZERO;
        cfg.skip_step_delay = Duration::ZERO;
        cfg.post_skip_refresh = Duration::ZERO;
        cfg
    }
}
