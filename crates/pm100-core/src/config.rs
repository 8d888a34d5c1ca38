//! Runtime configuration for the scanner and the telemetry server.
//!
//! Stored as JSON. Every field has a default so partial files are accepted.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::ConfigError;
use crate::net::SEARCH_MASK;
use crate::protocol::DISCOVERY_PORT;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// UDP discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfig {
    /// Port devices listen on; the scan socket binds the same port
    #[serde(default = "default_discovery_port")]
    pub port: u16,

    /// Mask applied to local addresses to derive broadcast targets
    #[serde(default = "default_search_mask")]
    pub search_mask: Ipv4Addr,

    /// Delay between discovery sends
    #[serde(default = "default_resend_interval")]
    pub resend_interval_ms: u64,

    /// Total discovery sends per scan, the first one included
    #[serde(default = "default_send_count")]
    pub send_count: u32,

    /// Explicit targets; when non-empty they replace the interface-derived
    /// broadcast addresses
    #[serde(default)]
    pub targets: Vec<Ipv4Addr>,

    /// Receive buffer requested for the scan socket
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

/// Telemetry server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: Ipv4Addr,

    #[serde(default = "default_server_port")]
    pub port: u16,

    /// A connection that stays silent this long is force-closed
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,

    /// Grace period between half-close and force-close on shutdown
    #[serde(default = "default_close_grace")]
    pub close_grace_ms: u64,

    /// TCP keep-alive idle time
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
}

fn default_discovery_port() -> u16 {
    DISCOVERY_PORT
}

fn default_search_mask() -> Ipv4Addr {
    SEARCH_MASK
}

fn default_resend_interval() -> u64 {
    2000
}

fn default_send_count() -> u32 {
    5
}

fn default_recv_buffer_size() -> usize {
    1024 * 1024
}

fn default_bind_address() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_server_port() -> u16 {
    9002
}

fn default_idle_timeout() -> u64 {
    3000
}

fn default_close_grace() -> u64 {
    500
}

fn default_keepalive() -> u64 {
    5
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: default_discovery_port(),
            search_mask: default_search_mask(),
            resend_interval_ms: default_resend_interval(),
            send_count: default_send_count(),
            targets: Vec::new(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_server_port(),
            idle_timeout_ms: default_idle_timeout(),
            close_grace_ms: default_close_grace(),
            keepalive_secs: default_keepalive(),
        }
    }
}

impl DiscoveryConfig {
    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.resend_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("discovery.port must be non-zero".into()));
        }
        if self.send_count == 0 {
            return Err(ConfigError::Invalid("discovery.sendCount must be at least 1".into()));
        }
        if self.resend_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "discovery.resendIntervalMs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid("server.idleTimeoutMs must be non-zero".into()));
        }
        Ok(())
    }
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.discovery.validate()?;
        self.server.validate()
    }

    /// Load and validate a config file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path).await?;
        let config: CoreConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or return the defaults when it does not exist.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path).await {
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

/// Platform-specific default location of the config file.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "pm100", "pm100-tool")
        .map(|dirs| dirs.config_dir().join("config.json"))
}
