//! Configuration management for Ohm64 GW
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::board::InputPolicy;
use crate::ohm64::sysex::Polarity;
use crate::surface::SurfaceOptions;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
}

/// MIDI port configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Case-insensitive substring of the input port name
    pub input_port: String,
    /// Case-insensitive substring of the output port name
    pub output_port: String,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: default_port(),
            output_port: default_port(),
        }
    }
}

/// Button grid behaviour
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SurfaceConfig {
    #[serde(default)]
    pub policy: InputPolicy,
    #[serde(default = "default_blink_period_ms")]
    pub blink_period_ms: u64,
    #[serde(default)]
    pub polarity: Polarity,
    #[serde(default = "default_true")]
    pub sync_on_connect: bool,
    #[serde(default)]
    pub note_channel: u8,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            policy: InputPolicy::default(),
            blink_period_ms: default_blink_period_ms(),
            polarity: Polarity::default(),
            sync_on_connect: true,
            note_channel: 0,
        }
    }
}

impl SurfaceConfig {
    pub fn blink_period(&self) -> Duration {
        Duration::from_millis(self.blink_period_ms.max(1))
    }

    pub fn options(&self) -> SurfaceOptions {
        SurfaceOptions {
            policy: self.policy,
            blink_period: self.blink_period(),
            polarity: self.polarity,
            note_channel: self.note_channel,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse YAML config: {}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.surface.note_channel > 15 {
            anyhow::bail!(
                "surface.note_channel must be 0-15, got {}",
                self.surface.note_channel
            );
        }
        if self.surface.blink_period_ms == 0 {
            anyhow::bail!("surface.blink_period_ms must be greater than 0");
        }
        Ok(())
    }
}

// Default value functions
fn default_port() -> String { "Ohm64".to_string() }
fn default_blink_period_ms() -> u64 { 100 }
fn default_true() -> bool { true }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::parse(
            r#"
midi:
  input_port: "Ohm64 In"
  output_port: "Ohm64 Out"
"#,
        )
        .unwrap();

        assert_eq!(config.midi.input_port, "Ohm64 In");
        assert_eq!(config.surface, SurfaceConfig::default());
        assert_eq!(config.surface.blink_period(), Duration::from_millis(100));
    }

    #[test]
    fn test_full_surface_section() {
        let config = AppConfig::parse(
            r#"
midi:
  input_port: "Ohm64"
  output_port: "Ohm64"
surface:
  policy: blink
  blink_period_ms: 250
  polarity: inverted
  sync_on_connect: false
  note_channel: 3
"#,
        )
        .unwrap();

        let options = config.surface.options();
        assert_eq!(options.policy, InputPolicy::Blink);
        assert_eq!(options.blink_period, Duration::from_millis(250));
        assert_eq!(options.polarity, Polarity::Inverted);
        assert_eq!(options.note_channel, 3);
        assert!(!config.surface.sync_on_connect);
    }

    #[test]
    fn test_rejects_unknown_policy_and_bad_values() {
        let base = "midi:\n  input_port: a\n  output_port: b\nsurface:\n";
        assert!(AppConfig::parse(&format!("{base}  policy: strobe\n")).is_err());
        assert!(AppConfig::parse(&format!("{base}  note_channel: 16\n")).is_err());
        assert!(AppConfig::parse(&format!("{base}  blink_period_ms: 0\n")).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "midi:\n  input_port: x\n  output_port: y\n")?;

        let config = AppConfig::load(&path.to_string_lossy()).await?;
        assert_eq!(config.midi.output_port, "y");

        assert!(AppConfig::load("/nonexistent/ohm64.yaml").await.is_err());
        Ok(())
    }
}
