//! Scheduler configuration.
//!
//! Every timing constant and presentation tunable lives here. Configuration
//! can be loaded from and saved to a TOML file.

use salvo_common::{Millis, SalvoError, SalvoResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "salvo-audio.toml";

/// Scheduler configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    // === Commentary Channel ===
    /// Wall-clock delay before a paused, busy commentary channel is forced
    /// to re-check.
    pub fallback_interval_ms: Millis,
    /// Game-time gap before each continuing sequence step.
    pub sequence_gap_ms: Millis,
    /// Head-of-queue age after which a busy channel is reported as stuck.
    pub stuck_threshold_ms: Millis,
    /// Max delay applied when neither the sound nor the request sets one.
    pub default_max_delay_ms: Option<Millis>,
    /// Locator fragment that marks commentary-only assets.
    pub commentary_marker: String,

    // === Presentation ===
    /// Maximum absolute pan for off-screen sounds.
    pub max_pan: f32,
    /// World width in world units, used for falloff and pan scaling.
    pub world_width: f32,
    /// Half-width of the visible viewport in world units.
    pub view_half_width: f32,
    /// Half-height of the visible viewport in world units.
    pub view_half_height: f32,
    /// Off-screen volume as a fraction of the on-screen volume.
    pub off_screen_volume_ratio: f32,

    // === Resolution ===
    /// Pools shorter than this are never reshuffled.
    pub reshuffle_min_len: usize,
    /// Maximum nesting of pools and selectors before giving up.
    pub selector_depth_limit: usize,
    /// Seed for pool reshuffles (None = from entropy).
    pub shuffle_seed: Option<u64>,

    // === Throttling ===
    /// Throttle ledger entries older than this are pruned.
    pub throttle_retention_ms: Millis,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            // Commentary
            fallback_interval_ms: 500,
            sequence_gap_ms: 500,
            stuck_threshold_ms: 30_000,
            default_max_delay_ms: None,
            commentary_marker: "commentary/".to_string(),

            // Presentation
            max_pan: 0.75,
            world_width: 2000.0,
            view_half_width: 640.0,
            view_half_height: 360.0,
            off_screen_volume_ratio: 0.25,

            // Resolution
            reshuffle_min_len: 4,
            selector_depth_limit: 16,
            shuffle_seed: None,

            // Throttling
            throttle_retention_ms: 60_000,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Audio config not found at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => {
                info!("Loaded audio config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to load audio config: {e}");
                Self::default()
            },
        }
    }

    /// Load and validate configuration, reporting unreadable or malformed
    /// files instead of falling back.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> SalvoResult<Self> {
        let mut contents = String::new();
        fs::File::open(path.as_ref())?.read_to_string(&mut contents)?;

        let mut config =
            toml::from_str::<Self>(&contents).map_err(|e| SalvoError::Config(e.to_string()))?;
        config.validate();
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> SalvoResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| SalvoError::Config(e.to_string()))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved audio config to {}", path.display());
        Ok(())
    }

    /// Clamp values to usable ranges.
    pub fn validate(&mut self) {
        self.max_pan = self.max_pan.clamp(0.0, 1.0);
        self.off_screen_volume_ratio = self.off_screen_volume_ratio.clamp(0.0, 1.0);
        if !self.world_width.is_finite() || self.world_width <= 0.0 {
            self.world_width = Self::default().world_width;
        }
        self.view_half_width = self.view_half_width.max(0.0);
        self.view_half_height = self.view_half_height.max(0.0);
        self.reshuffle_min_len = self.reshuffle_min_len.max(2);
        self.selector_depth_limit = self.selector_depth_limit.clamp(1, 256);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = SchedulerConfig::default();
        assert_eq!(config.fallback_interval_ms, 500);
        assert_eq!(config.sequence_gap_ms, 500);
        assert!((config.max_pan - 0.75).abs() < f32::EPSILON);
        assert!(config.default_max_delay_ms.is_none());
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = SchedulerConfig {
            max_pan: 3.0,
            world_width: -1.0,
            reshuffle_min_len: 0,
            ..SchedulerConfig::default()
        };
        config.validate();
        assert!((config.max_pan - 1.0).abs() < f32::EPSILON);
        assert!(config.world_width > 0.0);
        assert_eq!(config.reshuffle_min_len, 2);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SchedulerConfig::load_from(dir.path().join("absent.toml"));
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audio").join(CONFIG_FILE);

        let config = SchedulerConfig {
            stuck_threshold_ms: 12_000,
            shuffle_seed: Some(42),
            ..SchedulerConfig::default()
        };
        config.save_to(&path).expect("save");

        let loaded = SchedulerConfig::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "fallback_interval_ms = 250\n").expect("write");

        let loaded = SchedulerConfig::load_from(&path);
        assert_eq!(loaded.fallback_interval_ms, 250);
        assert_eq!(loaded.sequence_gap_ms, 500);
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "fallback_interval_ms = \"soon\"\n").expect("write");

        assert_eq!(SchedulerConfig::load_from(&path), SchedulerConfig::default());
    }

    #[test]
    fn test_try_load_reports_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = SchedulerConfig::try_load_from(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(SalvoError::Io(_))));

        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "fallback_interval_ms = \"soon\"\n").expect("write");
        let malformed = SchedulerConfig::try_load_from(&path);
        assert!(matches!(malformed, Err(SalvoError::Config(_))));
    }
}
