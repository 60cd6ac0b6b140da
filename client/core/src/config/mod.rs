//! TOML Configuration File Support
//!
//! Centralized configuration loading for the client, supporting a TOML
//! file at `~/.config/furiabot/client.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Environment Variables
//!
//! - `FURIABOT_API_URL` (falls back to `API_URL`)
//! - `FURIABOT_REFETCH_DELAY_MS`
//! - `FURIABOT_AUTO_REFRESH_SECS`
//! - `FURIABOT_CREDENTIALS`
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! url = "https://furiabot.example.com"
//! request_timeout_secs = 120
//!
//! [chat]
//! refetch_delay_ms = 500
//! auto_refresh_secs = 60
//!
//! [storage]
//! credentials_path = "/home/me/.local/share/furiabot/credentials.json"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::{CredentialStore, DATA_DIR_NAME};

/// Default agent service URL
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Config file name within the config directory
pub const CONFIG_FILENAME: &str = "client.toml";

/// Longest accepted conversation list refresh interval
pub const MAX_AUTO_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// API section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Agent service base URL
    pub url: Option<String>,

    /// Timeout for non-streaming requests in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Chat section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Delay before the conversation list is refetched after a reply
    pub refetch_delay_ms: Option<u64>,

    /// Interval of the periodic conversation list refresh
    pub auto_refresh_secs: Option<u64>,
}

/// Storage section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Where credentials are persisted
    pub credentials_path: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// API section
    pub api: ApiToml,

    /// Chat section
    pub chat: ChatToml,

    /// Storage section
    pub storage: StorageToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Agent service base URL, without trailing slash
    pub api_url: String,

    /// Timeout for non-streaming requests
    pub request_timeout: Duration,

    /// Delay between the end of a reply and the conversation list refetch
    pub refetch_delay: Duration,

    /// Interval of the periodic conversation list refresh
    pub auto_refresh_interval: Duration,

    /// Where credentials are persisted
    pub credentials_path: PathBuf,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(120),
            refetch_delay: Duration::from_millis(500),
            auto_refresh_interval: Duration::from_secs(60),
            credentials_path: CredentialStore::default_path(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check values and normalize the API URL
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the API URL is not an
    /// http(s) URL or the auto-refresh interval is zero. An interval above
    /// [`MAX_AUTO_REFRESH_INTERVAL`] is clamped.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api url must start with http:// or https://, got {url:?}"
            )));
        }
        self.api_url = url.trim_end_matches('/').to_string();

        if self.auto_refresh_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "auto refresh interval must be at least one second".to_string(),
            ));
        }
        if self.auto_refresh_interval > MAX_AUTO_REFRESH_INTERVAL {
            tracing::warn!(
                secs = self.auto_refresh_interval.as_secs(),
                max_secs = MAX_AUTO_REFRESH_INTERVAL.as_secs(),
                "Clamping auto refresh interval"
            );
            self.auto_refresh_interval = MAX_AUTO_REFRESH_INTERVAL;
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/furiabot/client.toml` or
/// `~/.config/furiabot/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(DATA_DIR_NAME).join(CONFIG_FILENAME))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting values are invalid. A missing config file is not an error.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting values are invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment values through `env`
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<ClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref url) = toml.api.url {
        config.api_url = url.clone();
    }
    if let Some(secs) = toml.api.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = toml.chat.refetch_delay_ms {
        config.refetch_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = toml.chat.auto_refresh_secs {
        config.auto_refresh_interval = Duration::from_secs(secs);
    }
    if let Some(ref path) = toml.storage.credentials_path {
        config.credentials_path = path.clone();
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut ClientConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("FURIABOT_API_URL").or_else(|| env("API_URL")) {
        config.api_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(delay) = env("FURIABOT_REFETCH_DELAY_MS") {
        match delay.parse::<u64>() {
            Ok(ms) => {
                config.refetch_delay = Duration::from_millis(ms);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %delay, "Ignoring invalid FURIABOT_REFETCH_DELAY_MS"),
        }
    }
    if let Some(interval) = env("FURIABOT_AUTO_REFRESH_SECS") {
        match interval.parse::<u64>() {
            Ok(secs) => {
                config.auto_refresh_interval = Duration::from_secs(secs);
                config.source = ConfigSource::Env;
            }
            Err(_) => {
                tracing::warn!(value = %interval, "Ignoring invalid FURIABOT_AUTO_REFRESH_SECS");
            }
        }
    }
    if let Some(path) = env("FURIABOT_CREDENTIALS") {
        config.credentials_path = PathBuf::from(path);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// API URL override
    pub api_url: Option<String>,

    /// Credentials path override
    pub credentials_path: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set API URL override
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Set credentials path override
    #[must_use]
    pub fn with_credentials_path(mut self, path: PathBuf) -> Self {
        self.credentials_path = Some(path);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the overridden API URL is
    /// invalid.
    pub fn apply(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        if self.api_url.is_some() || self.credentials_path.is_some() {
            config.source = ConfigSource::Cli;
        }
        if let Some(ref url) = self.api_url {
            config.api_url = url.clone();
        }
        if let Some(ref path) = self.credentials_path {
            config.credentials_path = path.clone();
        }
        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
