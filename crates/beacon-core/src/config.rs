//! Configuration for a Beacon node.
//!
//! Configuration is stored in TOML. Every section is optional and falls
//! back to its defaults.
//!
//! # Example TOML
//!
//! ```toml
//! [app]
//! name = "My dApp"
//! icon = "https://example.com/icon.png"
//! url = "https://example.com"
//!
//! [p2p]
//! relay_nodes = ["beacon-node-1.sky.papers.tech"]
//! replication_count = 1
//! timeout_seconds = 30
//!
//! [messaging]
//! blockchains = ["tezos"]
//! compat_blockchain = "tezos"
//! serializer = "base58check"  # "base58check" | "json"
//!
//! [logging]
//! level = "warn"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeaconConfig {
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub p2p: P2pConfig,

    #[serde(default)]
    pub messaging: MessagingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How this party presents itself to peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

fn default_app_name() -> String {
    "beacon".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            icon: None,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2pConfig {
    /// Relay node pool. Every party must use the same pool.
    #[serde(default = "default_relay_nodes")]
    pub relay_nodes: Vec<String>,

    /// Number of relays each message is published to.
    #[serde(default = "default_replication_count")]
    pub replication_count: usize,

    /// Timeout for a single relay call.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

pub const DEFAULT_RELAY_NODES: &[&str] = &[
    "beacon-node-1.diamond.papers.tech",
    "beacon-node-1.sky.papers.tech",
    "beacon-node-2.sky.papers.tech",
    "beacon-node-1.hope.papers.tech",
    "beacon-node-1.hope-2.papers.tech",
    "beacon-node-1.hope-3.papers.tech",
    "beacon-node-1.hope-4.papers.tech",
    "beacon-node-1.hope-5.papers.tech",
];

fn default_relay_nodes() -> Vec<String> {
    DEFAULT_RELAY_NODES.iter().map(|s| s.to_string()).collect()
}

fn default_replication_count() -> usize {
    1
}

fn default_timeout() -> u64 {
    30
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            relay_nodes: default_relay_nodes(),
            replication_count: default_replication_count(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl P2pConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Blockchains with a registered compatibility strategy.
    #[serde(default = "default_blockchains")]
    pub blockchains: Vec<String>,

    /// Blockchain owning revision 1 and 2 messages.
    #[serde(default = "default_compat_blockchain")]
    pub compat_blockchain: String,

    /// Wire encoding: "base58check" or "json".
    #[serde(default = "default_serializer")]
    pub serializer: String,
}

fn default_blockchains() -> Vec<String> {
    vec![default_compat_blockchain()]
}

fn default_compat_blockchain() -> String {
    "tezos".to_string()
}

fn default_serializer() -> String {
    "base58check".to_string()
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            blockchains: default_blockchains(),
            compat_blockchain: default_compat_blockchain(),
            serializer: default_serializer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl BeaconConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BeaconConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "app name must not be empty".to_string(),
            ));
        }

        if self.p2p.relay_nodes.is_empty() {
            return Err(ConfigError::ValidationError(
                "relay node pool must not be empty".to_string(),
            ));
        }
        if self.p2p.relay_nodes.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "relay node names must not be empty".to_string(),
            ));
        }

        if self.p2p.replication_count == 0 {
            return Err(ConfigError::ValidationError(
                "replication count must be at least 1".to_string(),
            ));
        }

        if self.p2p.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if !self
            .messaging
            .blockchains
            .contains(&self.messaging.compat_blockchain)
        {
            return Err(ConfigError::ValidationError(format!(
                "compat blockchain '{}' is not in the blockchain list",
                self.messaging.compat_blockchain
            )));
        }

        let valid_serializers = ["base58check", "json"];
        if !valid_serializers.contains(&self.messaging.serializer.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid serializer '{}'. Must be one of: {:?}",
                self.messaging.serializer, valid_serializers
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        Ok(())
    }
}
