//! Configuration types for tailflare
//!
//! This module defines all configuration structures used throughout the crate.
//!
//! The config file only names the zone and the aliases; credentials for the
//! directory and the store arrive through [`DirectoryConfig`] and
//! [`StoreConfig`], built by the binary from the environment.
//!
//! ```yaml
//! zone: example.com
//! aliases:
//!   "@": [web-1, web-2]
//!   nas: [nas]
//! engine:
//!   call_timeout_secs: 20
//! ```

use crate::record::APEX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Main tailflare configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// DNS zone name to resolve
    pub zone: String,

    /// Alias name → device names whose addresses populate it
    pub aliases: BTreeMap<String, Vec<String>>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a new configuration for `zone` with no aliases
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            aliases: BTreeMap::new(),
            engine: EngineConfig::default(),
        }
    }

    /// Add an alias
    pub fn with_alias<I, S>(mut self, alias: impl Into<String>, devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases
            .insert(alias.into(), devices.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the engine settings
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Parse a YAML document
    pub fn from_yaml_str(raw: &str) -> Result<Self, crate::Error> {
        serde_yaml::from_str(raw)
            .map_err(|e| crate::Error::config(format!("failed to parse config: {}", e)))
    }

    /// Read and parse a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone.trim().is_empty() {
            return Err(crate::Error::config("Zone name cannot be empty"));
        }
        validate_dns_name(&self.zone)
            .map_err(|e| crate::Error::config(format!("Invalid zone name '{}': {}", self.zone, e)))?;

        for (alias, devices) in &self.aliases {
            if alias != APEX {
                validate_dns_name(alias).map_err(|e| {
                    crate::Error::config(format!("Invalid alias name '{}': {}", alias, e))
                })?;
            }

            if devices.iter().any(|d| d.trim().is_empty()) {
                return Err(crate::Error::config(format!(
                    "Alias '{}' lists an empty device name",
                    alias
                )));
            }
        }

        self.engine.validate()
    }
}

/// Basic DNS name validation per RFC 1035 (a trailing dot is allowed)
fn validate_dns_name(name: &str) -> Result<(), String> {
    let name = name.strip_suffix('.').unwrap_or(name);

    if name.is_empty() {
        return Err("name cannot be empty".to_string());
    }
    if name.len() > 253 {
        return Err(format!("name too long: {} chars (max 253)", name.len()));
    }

    for label in name.split('.') {
        if label.is_empty() {
            return Err("empty label".to_string());
        }
        if label.len() > 63 {
            return Err(format!("label '{}' too long (max 63)", label));
        }
        // '_' and '*' show up in service and wildcard names
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '*')
        {
            return Err(format!("label '{}' contains invalid characters", label));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label '{}' cannot start or end with hyphen", label));
        }
    }

    Ok(())
}

/// Device directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryConfig {
    /// Tailscale API (OAuth client credentials)
    Tailscale {
        /// Tailnet name, `-` for the default tailnet of the credentials
        tailnet: String,
        /// OAuth client id
        client_id: String,
        /// OAuth client secret
        client_secret: String,
    },

    /// Custom directory
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl DirectoryConfig {
    /// Validate the directory configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            DirectoryConfig::Tailscale {
                client_id,
                client_secret,
                ..
            } => {
                if client_id.is_empty() {
                    return Err(crate::Error::config("Tailscale OAuth client id cannot be empty"));
                }
                if client_secret.is_empty() {
                    return Err(crate::Error::config(
                        "Tailscale OAuth client secret cannot be empty",
                    ));
                }
                Ok(())
            }
            DirectoryConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom directory factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom directory config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the directory type name
    pub fn type_name(&self) -> &str {
        match self {
            DirectoryConfig::Tailscale { .. } => "tailscale",
            DirectoryConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Cloudflare API v4
    Cloudflare {
        /// Cloudflare API token with Zone:Read and DNS:Edit permissions
        api_token: String,
        /// Perform reads but only log batches
        #[serde(default)]
        dry_run: bool,
    },

    /// In-memory store (not persistent)
    Memory {
        /// Zones the store knows about
        zones: Vec<String>,
    },

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Memory { .. } => Ok(()),
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Cloudflare { .. } => "cloudflare",
            StoreConfig::Memory { .. } => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Deadline for each remote call (in seconds)
    ///
    /// Covers the directory fetch, the zone lookup, one full record listing
    /// and one batch apply. Set to 0 to rely on cancellation alone.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Fail the run when a configured device is missing from the directory
    ///
    /// Missing devices never stop an alias from converging; they are always
    /// logged and reported. By default they also fail the run. Set to `false`
    /// to treat them as warnings only.
    #[serde(default = "default_fail_on_missing_device")]
    pub fail_on_missing_device: bool,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Per-call deadline, if enabled
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            call_timeout_secs: default_call_timeout_secs(),
            fail_on_missing_device: default_fail_on_missing_device(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_fail_on_missing_device() -> bool {
    true
}
