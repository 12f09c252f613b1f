pub mod secrets;

pub use secrets::{
    parse_bootstrap_user, resolve_bootstrap_credential, Credential, CredentialError, SecretStore,
    BOOTSTRAP_USER_KEY, DEFAULT_BOOTSTRAP_USERNAME,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port of the EMQX v4 management API
pub const DEFAULT_ADMIN_PORT: u16 = 8081;

/// Name of the broker container inside each pod
pub const DEFAULT_ADMIN_CONTAINER: &str = "emqx";

/// Upper bound on a single admin API request, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default config file location: ~/.emqx-bridge/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".emqx-bridge")
        .join("config.yaml")
}

/// Errors for loading and saving the config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Failed to write config: {0}")]
    WriteError(String),
}

/// Settings for reaching the admin API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Port the admin API listens on inside every broker pod
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    /// Timeout for one admin request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Container whose readiness makes a pod eligible as a request target
    #[serde(default = "default_admin_container")]
    pub admin_container: String,

    /// Username looked up in the bootstrap secret
    #[serde(default = "default_bootstrap_username")]
    pub bootstrap_username: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            admin_port: DEFAULT_ADMIN_PORT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            admin_container: DEFAULT_ADMIN_CONTAINER.to_string(),
            bootstrap_username: DEFAULT_BOOTSTRAP_USERNAME.to_string(),
        }
    }
}

fn default_admin_port() -> u16 {
    DEFAULT_ADMIN_PORT
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_admin_container() -> String {
    DEFAULT_ADMIN_CONTAINER.to_string()
}

fn default_bootstrap_username() -> String {
    DEFAULT_BOOTSTRAP_USERNAME.to_string()
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_admin_port(mut self, port: u16) -> Self {
        self.admin_port = port;
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }
}

// ============================================================================
// SBIO: Pure parsing (no I/O)
// ============================================================================

/// Parse config from YAML string
pub fn parse_config(content: &str) -> Result<BridgeConfig, ConfigError> {
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Serialize config to YAML string
pub fn serialize_config(config: &BridgeConfig) -> Result<String, ConfigError> {
    serde_yaml::to_string(config).map_err(|e| ConfigError::WriteError(e.to_string()))
}

// ============================================================================
// I/O boundary functions
// ============================================================================

/// Load config from a specific path. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<BridgeConfig, ConfigError> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load config from the default location
pub fn load_config() -> Result<BridgeConfig, ConfigError> {
    load_config_from(&default_config_path())
}

/// Save config to a specific path
pub fn save_config_to(config: &BridgeConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serialize_config(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
