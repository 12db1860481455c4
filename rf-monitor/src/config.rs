//! Monitor configuration

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rf_protocol::{BitStringParser, FieldLayoutParser, FieldSpec, IdentityField, PayloadParser};
use rf_signal::{RegistryConfig, SignalConfig};
use rf_sim::VirtualChannelConfig;
use serde::{Deserialize, Serialize};

/// How a subscriber decodes frames
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParserConfig {
    /// Raw frames only, never device data
    #[default]
    BitString,
    /// Fixed field layout
    Fields {
        fields: Vec<FieldSpec>,
        /// Field copied into `id`
        #[serde(default)]
        identity: Option<String>,
    },
}

impl ParserConfig {
    /// Build the parser
    pub fn build(&self) -> Arc<dyn PayloadParser> {
        match self {
            ParserConfig::BitString => Arc::new(BitStringParser),
            ParserConfig::Fields { fields, identity } => {
                let layout = FieldLayoutParser::new(fields.clone());
                match identity {
                    Some(field) => Arc::new(IdentityField::new(layout, field.clone())),
                    None => Arc::new(layout),
                }
            }
        }
    }
}

/// One subscriber on a shared channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Name used by replay scripts and in logs
    pub name: String,
    #[serde(flatten)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Behaviour of every virtual channel
    #[serde(default)]
    pub channels: VirtualChannelConfig,
    /// Time to let in-flight frames drain before shutdown
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
    #[serde(default)]
    pub subscribers: Vec<SubscriberConfig>,
}

fn default_linger_ms() -> u64 {
    100
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            channels: VirtualChannelConfig::default(),
            linger_ms: default_linger_ms(),
            subscribers: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Get the XDG config directory for rf-monitor
    /// Uses $XDG_CONFIG_HOME/rf-monitor, falls back to ~/.config/rf-monitor
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("rf-monitor"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("rf-monitor"))
    }

    /// Default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Parse and validate a configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from the default path
    ///
    /// A missing default file yields the default configuration; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for subscriber in &self.subscribers {
            if subscriber.signal.signature.is_empty() {
                bail!("subscriber '{}' has an empty signature", subscriber.name);
            }
            if !names.insert(subscriber.name.as_str()) {
                bail!("duplicate subscriber name '{}'", subscriber.name);
            }
        }
        Ok(())
    }
}
