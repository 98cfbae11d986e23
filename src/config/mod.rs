//! Configuration management
//!
//! Loads the YAML configuration file. Every section is optional; a missing
//! file means built-in defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

use crate::pacer::DEFAULT_MIN_SPACING_MS;
use crate::roland::DeviceProfile;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub device: DeviceProfile,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

/// MIDI port configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Case-insensitive substring of the input port name
    #[serde(default = "default_port")]
    pub input_port: String,
    #[serde(default = "default_port")]
    pub output_port: String,
    /// How often port presence is checked
    #[serde(default = "default_port_poll_ms")]
    pub port_poll_ms: u64,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: default_port(),
            output_port: default_port(),
            port_poll_ms: default_port_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PacingConfig {
    #[serde(default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_spacing_ms: default_min_spacing_ms(),
        }
    }
}

impl PacingConfig {
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }
}

/// Local audition of a newly selected tone
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PreviewConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 0-based MIDI channel
    #[serde(default)]
    pub channel: u8,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: 0,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            warn!("Config file '{}' not found, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.is_empty() {
            anyhow::bail!("MIDI input_port cannot be empty");
        }
        if self.midi.output_port.is_empty() {
            anyhow::bail!("MIDI output_port cannot be empty");
        }
        if self.midi.port_poll_ms == 0 {
            anyhow::bail!("MIDI port_poll_ms must be greater than 0");
        }

        let device = &self.device;
        if device.manufacturer_id >= 0x80 {
            anyhow::bail!("device.manufacturer_id must be a 7-bit value");
        }
        if device.device_id >= 0x80 {
            anyhow::bail!("device.device_id must be a 7-bit value");
        }
        if device.model_id.is_empty() {
            anyhow::bail!("device.model_id cannot be empty");
        }
        if let Some(b) = device.model_id.iter().find(|&&b| b >= 0x80) {
            anyhow::bail!("device.model_id byte {:#04x} is not a 7-bit value", b);
        }

        if self.pacing.min_spacing_ms == 0 {
            anyhow::bail!("pacing.min_spacing_ms must be greater than 0");
        }
        if self.preview.channel > 15 {
            anyhow::bail!(
                "preview.channel {} out of range (0-15)",
                self.preview.channel
            );
        }

        Ok(())
    }
}

fn default_port() -> String { "Roland Digital Piano".to_string() }
fn default_port_poll_ms() -> u64 { 1000 }
fn default_min_spacing_ms() -> u64 { DEFAULT_MIN_SPACING_MS }
fn default_true() -> bool { true }
