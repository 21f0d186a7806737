use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::midi::DataBytePolicy;

pub const DEFAULT_SETTINGS_FILE: &str = "midikeys.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name the MIDI client registers with the system.
    pub client_name: String,
    pub default_velocity: u8,
    pub data_bytes: DataBytePolicy,
    /// MIDI note of the leftmost key.
    pub first_key: u8,
    pub key_count: u8,
    /// Connect on start-up to the first output port whose name contains this.
    pub preferred_port: Option<String>,
    /// 0-based.
    pub channel: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_name: "midikeys".to_string(),
            default_velocity: 64,
            data_bytes: DataBytePolicy::default(),
            first_key: 48,
            key_count: 25,
            preferred_port: None,
            channel: 0,
        }
    }
}

impl Settings {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        info!(path = %path.display(), "settings saved");

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let ron_string = fs::read_to_string(path)?;
        let settings: Settings = ron::from_str(&ron_string)?;

        Ok(settings)
    }

    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "no settings file, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => {
                info!(path = %path.display(), "settings loaded");
                settings
            }
            Err(e) => {
                warn!(path = %path.display(), "ignoring settings: {}", e);
                Self::default()
            }
        }
    }

    /// Highest MIDI note on the keyboard, kept within 0..=127.
    pub fn last_key(&self) -> u8 {
        let last = u16::from(self.first_key) + u16::from(self.key_count.max(1)) - 1;
        last.min(127) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("midikeys-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = ron::from_str("(default_velocity: 100, data_bytes: Reject)").unwrap();
        assert_eq!(settings.default_velocity, 100);
        assert_eq!(settings.data_bytes, DataBytePolicy::Reject);
        assert_eq!(settings.client_name, "midikeys");
        assert_eq!(settings.key_count, 25);
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("roundtrip.ron");
        let settings = Settings {
            preferred_port: Some("FluidSynth".to_string()),
            channel: 9,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn bad_file_falls_back_to_defaults() {
        let path = temp_path("broken.ron");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "(default_velocity: \"loud\")").unwrap();
        assert!(Settings::load(&path).is_err());
        assert_eq!(Settings::load_or_default(&path), Settings::default());
        let _ = fs::remove_file(&path);

        assert_eq!(
            Settings::load_or_default(&temp_path("absent.ron")),
            Settings::default()
        );
    }

    #[test]
    fn last_key_stays_in_range() {
        assert_eq!(Settings::default().last_key(), 72);
        let high = Settings {
            first_key: 120,
            key_count: 25,
            ..Settings::default()
        };
        assert_eq!(high.last_key(), 127);
    }
}
