//! Configuration file management for vmsg.
//!
//! Configuration lives in `~/.config/vmsg/vmsg.toml`. Every field has a
//! default, so a missing file or a partial one is fine.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::capture::EncodingFormat;

/// Widget behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Maximum recording length in seconds
    pub max_recording_secs: u32,
    /// Encodings to try for recordings, most preferred first
    pub formats: Vec<EncodingFormat>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            max_recording_secs: default_max_recording_secs(),
            formats: EncodingFormat::DEFAULT_PREFERENCE.to_vec(),
        }
    }
}

fn default_max_recording_secs() -> u32 {
    300
}

/// Audio input configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `vmsg list-devices`
    /// - device name from `vmsg list-devices`
    pub device: String,
    /// Requested sample rate in Hz; the device's native rate is used if it differs
    pub sample_rate: u32,
    /// Reference level in dBFS for a 100% level meter (typical: -20 to -6 dBFS)
    pub reference_level_db: i8,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            sample_rate: 16000,
            reference_level_db: -20,
        }
    }
}

/// Playback of attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Player command; the platform opener is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmsgConfig {
    pub widget: WidgetConfig,
    pub audio: AudioConfig,
    pub playback: PlaybackConfig,
}

impl VmsgConfig {
    /// Loads configuration from the user's config directory, or defaults when
    /// there is no config file yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read or the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Loads configuration from `path`, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        let config: VmsgConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file at {}", path.display()))?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    /// - If the maximum recording length is zero
    /// - If no recording format is listed
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.widget.max_recording_secs == 0 {
            return Err(anyhow!("widget.max_recording_secs must be at least 1"));
        }
        if self.widget.formats.is_empty() {
            return Err(anyhow!("widget.formats must list at least one format"));
        }
        Ok(())
    }
}

/// Path of the config file, `~/.config/vmsg/vmsg.toml`.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(".config").join("vmsg").join("vmsg.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VmsgConfig::default();
        assert_eq!(config.widget.max_recording_secs, 300);
        assert_eq!(config.widget.formats[0], EncodingFormat::Webm);
        assert_eq!(config.widget.formats.last(), Some(&EncodingFormat::Wav));
        assert_eq!(config.audio.device, "default");
        assert!(config.playback.player.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: VmsgConfig = toml::from_str("[widget]\nmax_recording_secs = 5\n").unwrap();
        assert_eq!(config.widget.max_recording_secs, 5);
        assert_eq!(config.widget.formats, EncodingFormat::DEFAULT_PREFERENCE.to_vec());
        assert_eq!(config.audio.sample_rate, 16000);
    }

    #[test]
    fn test_validation() {
        let mut config = VmsgConfig::default();
        config.widget.max_recording_secs = 0;
        assert!(config.validate().is_err());

        let mut config = VmsgConfig::default();
        config.widget.formats.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vmsg.toml");

        assert_eq!(VmsgConfig::load_from(&path).unwrap(), VmsgConfig::default());

        let mut config = VmsgConfig::default();
        config.widget.formats = vec![EncodingFormat::Mp3, EncodingFormat::Wav];
        config.playback.player = Some("mpv".to_string());
        config.save_to(&path).unwrap();

        assert_eq!(VmsgConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vmsg.toml");
        fs::write(&path, "[widget]\nmax_recording_secs = 0\n").unwrap();
        assert!(VmsgConfig::load_from(&path).is_err());

        fs::write(&path, "[widget]\nformats = [\"flac\"]\n").unwrap();
        assert!(VmsgConfig::load_from(&path).is_err());
    }
}
