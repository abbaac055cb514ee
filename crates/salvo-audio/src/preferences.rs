//! Player preference flags that gate playback.

use serde::{Deserialize, Serialize};

/// Preference source consulted on every resolution and drain.
pub trait Preferences {
    /// Whether any sound may play.
    fn sound_enabled(&self) -> bool;

    /// Whether commentary lines may play.
    fn commentary_enabled(&self) -> bool;
}

/// Plain preference values, as loaded from the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticPreferences {
    /// Master sound switch.
    pub sound_enabled: bool,
    /// Commentary switch.
    pub commentary_enabled: bool,
}

impl Default for StaticPreferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            commentary_enabled: true,
        }
    }
}

impl StaticPreferences {
    /// Preferences with everything switched off.
    #[must_use]
    pub const fn muted() -> Self {
        Self {
            sound_enabled: false,
            commentary_enabled: false,
        }
    }
}

impl Preferences for StaticPreferences {
    fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    fn commentary_enabled(&self) -> bool {
        self.sound_enabled && self.commentary_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commentary_requires_sound() {
        let prefs = StaticPreferences {
            sound_enabled: false,
            commentary_enabled: true,
        };
        assert!(!prefs.commentary_enabled());
        assert!(StaticPreferences::default().commentary_enabled());
    }

    #[test]
    fn test_preferences_deserialize_with_defaults() {
        let prefs: StaticPreferences =
            serde_json::from_str(r#"{"commentary_enabled": false}"#).expect("valid json");
        assert!(prefs.sound_enabled);
        assert!(!prefs.commentary_enabled);
    }
}
