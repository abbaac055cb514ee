//! Simulation configuration.

use std::path::Path;

use salvo_audio::{SchedulerConfig, StaticPreferences};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "salvo-sim.toml";

/// Simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Scheduler tunables.
    pub scheduler: SchedulerConfig,
    /// Starting preference flags.
    pub preferences: StaticPreferences,
    /// Length of one simulated frame.
    pub frame_ms: u64,
    /// Number of frames to run.
    pub frames: u32,
    /// Length of every simulated clip.
    pub clip_ms: u64,
    /// Locators whose completions the simulated engine never reports.
    pub lost_completions: Vec<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig {
                shuffle_seed: Some(42),
                ..SchedulerConfig::default()
            },
            preferences: StaticPreferences::default(),
            frame_ms: 16,
            frames: 2700,
            clip_ms: 1200,
            lost_completions: vec!["commentary/off_air.ogg".to_string()],
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path, falling back to defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!("Loaded sim config from {:?}", path);
                    config
                },
                Err(e) => {
                    warn!("Failed to parse sim config {:?}: {}", path, e);
                    Self::default()
                },
            },
            Err(_) => {
                info!("No sim config at {:?}, using defaults", path);
                Self::default()
            },
        };
        config.validate();
        config
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, contents)
    }

    /// Clamp values the simulation cannot run with.
    pub fn validate(&mut self) {
        self.frame_ms = self.frame_ms.clamp(1, 1000);
        self.clip_ms = self.clip_ms.max(self.frame_ms);
        self.scheduler.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SimConfig::load_from(dir.path().join("absent.toml"));
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let mut config = SimConfig::default();
        config.frames = 120;
        config.preferences.commentary_enabled = false;

        config.save_to(&path).expect("save");
        assert_eq!(SimConfig::load_from(&path), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "frame_ms = 0\n[scheduler]\nsequence_gap_ms = 250\n")
            .expect("write");

        let config = SimConfig::load_from(&path);
        assert_eq!(config.frame_ms, 1);
        assert_eq!(config.scheduler.sequence_gap_ms, 250);
        assert_eq!(config.clip_ms, 1200);
    }
}
