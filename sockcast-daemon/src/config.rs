//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sockcast_broadcaster::{Endpoint, SocketServerOptions, DEFAULT_SOCKET_PATH};
use std::path::{Path, PathBuf};

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Socket path, or `tcp://host:port`
    pub endpoint: String,

    /// Most verbose level forwarded to clients
    pub level: String,

    /// Server name used in diagnostics
    pub name: String,

    /// Prefix lines with an ISO-8601 timestamp
    pub timestamp: bool,

    /// Restrict the socket file to its owner (0600)
    pub secure_socket: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            endpoint: DEFAULT_SOCKET_PATH.to_string(),
            level: "silly".to_string(),
            name: "socket server".to_string(),
            timestamp: false,
            secure_socket: true,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Load configuration from `path`, writing the defaults there if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            let mut config: DaemonConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;

            config.config_path = path.to_path_buf();
            Ok(config)
        } else {
            let config = Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Server options derived from this configuration
    pub fn server_options(&self) -> Result<SocketServerOptions> {
        let endpoint: Endpoint = self
            .endpoint
            .parse()
            .with_context(|| format!("Invalid endpoint in config: {}", self.endpoint))?;

        Ok(SocketServerOptions {
            endpoint,
            level: self.level.clone(),
            name: self.name.clone(),
            timestamp: self.timestamp,
            secure: self.secure_socket,
        })
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sockcast")
            .join("config.toml")
    }
}
