//! Configuration loading and validation.
//!
//! The sender reads a JSON document once at start. Only the `whatsapp`
//! section is consumed; other top-level keys are ignored so the same file can
//! be shared with the tools that invoke the sender.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::delivery::classify::DEFAULT_BENIGN_PATTERNS;
use crate::delivery::target::{TargetDescriptor, TargetKind};
use crate::delivery::DeliverySettings;
use crate::whatsapp::client::DEFAULT_BRIDGE_PORT;

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Top-level configuration document.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// WhatsApp sender settings. Missing means disabled.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// WhatsApp sender settings.
#[derive(Debug, Deserialize)]
pub struct WhatsAppConfig {
    /// Whether sending is enabled at all.
    #[serde(default)]
    pub enabled: bool,

    /// Group name/id or contact phone number.
    #[serde(default)]
    pub target: String,

    /// How `target` is interpreted.
    #[serde(rename = "type", default)]
    pub kind: TargetKind,

    /// Base URL of the WhatsApp bridge sidecar.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// How long to wait for a server acknowledgment.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Pause after sending before the session is released.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Hard limit on the whole run, including authentication.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Substrings identifying benign errors thrown after a message went out.
    #[serde(default = "default_benign_patterns")]
    pub benign_error_patterns: Vec<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target: String::new(),
            kind: TargetKind::default(),
            bridge_url: default_bridge_url(),
            ack_timeout_ms: default_ack_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            deadline_secs: default_deadline_secs(),
            benign_error_patterns: default_benign_patterns(),
        }
    }
}

impl WhatsAppConfig {
    /// The configured destination.
    pub fn target_descriptor(&self) -> TargetDescriptor {
        TargetDescriptor::new(self.kind, self.target.clone())
    }

    /// Timing and classification settings for the delivery pipeline.
    pub fn delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            deadline: Duration::from_secs(self.deadline_secs),
            benign_patterns: self.benign_error_patterns.clone(),
        }
    }

    /// Check the settings needed to actually send.
    ///
    /// Disabled configs are always valid.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.target.trim().is_empty() {
            anyhow::bail!("whatsapp.target must not be empty");
        }
        url::Url::parse(&self.bridge_url)
            .map_err(|e| anyhow::anyhow!("whatsapp.bridge_url is not a valid URL: {e}"))?;
        if self.deadline_secs == 0 {
            anyhow::bail!("whatsapp.deadline_secs must be greater than zero");
        }
        Ok(())
    }
}

// Default value functions for serde

fn default_bridge_url() -> String {
    format!("http://127.0.0.1:{DEFAULT_BRIDGE_PORT}")
}
fn default_ack_timeout_ms() -> u64 {
    20_000
}
fn default_settle_delay_ms() -> u64 {
    1_000
}
fn default_deadline_secs() -> u64 {
    120
}
fn default_benign_patterns() -> Vec<String> {
    DEFAULT_BENIGN_PATTERNS
        .iter()
        .map(|p| (*p).to_owned())
        .collect()
}

/// Load and validate the config from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    config
        .whatsapp
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Resolve the default config directory (`~/.wasend/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".wasend"))
}

/// Pick the config file to load when none was given explicitly.
///
/// Prefers `./config.json`, then `~/.wasend/config.json`. When neither
/// exists the local path is returned so the read error names it.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    match config_dir() {
        Ok(dir) if dir.join(CONFIG_FILE_NAME).exists() => dir.join(CONFIG_FILE_NAME),
        _ => local,
    }
}
