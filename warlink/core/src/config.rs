//! Configuration loading and validation
//!
//! Warlink reads an optional TOML file, layers `WARLINK_*` environment
//! variables over it, and leaves CLI overrides to the binary. Everything
//! works with zero configuration; the file only pins down non-default
//! endpoints and timings.
//!
//! # Resolution order
//!
//! Highest priority first:
//! 1. CLI arguments (applied by the caller via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! The file lives at `$XDG_CONFIG_HOME/warlink/warlink.toml` (typically
//! `~/.config/warlink/warlink.toml`).
//!
//! # Example Configuration
//!
//! ```toml
//! [link]
//! url = "ws://10.0.0.5:8000/ws"
//! profile = "qwen"
//! heartbeat_interval_ms = 25000
//! reconnect_floor_ms = 1000
//! reconnect_ceiling_ms = 30000
//!
//! [endpoints]
//! backend_url = "http://10.0.0.5:8000"
//! transcriber_url = "http://10.0.0.5:8001"
//! health_poll_interval_ms = 5000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Errors produced while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("Cannot read config file {path}: {source}")]
    ReadError {
        /// Path of the unreadable file
        path: PathBuf,
        /// I/O error from the read
        source: std::io::Error,
    },

    /// The config file is not valid TOML
    #[error("Malformed config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value that cannot work at runtime
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Source Tracking
// =============================================================================

/// Where the effective configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Overridden on the command line
    Cli,
    /// Overridden by a `WARLINK_*` environment variable
    Env,
    /// Read from the TOML file
    File,
    /// Built-in defaults
    Default,
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self::Default
    }
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
// TOML File Structures
// =============================================================================

/// Link section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkToml {
    /// WebSocket URL of the backend agent
    pub url: Option<String>,

    /// Persona profile attached to outgoing messages
    pub profile: Option<String>,

    /// Connect attempt timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Heartbeat ping interval in milliseconds
    pub heartbeat_interval_ms: Option<u64>,

    /// Initial reconnect delay in milliseconds
    pub reconnect_floor_ms: Option<u64>,

    /// Maximum reconnect delay in milliseconds
    pub reconnect_ceiling_ms: Option<u64>,

    /// Grace delay before the finished response buffer is cleared, in milliseconds
    pub clear_grace_ms: Option<u64>,
}

/// Endpoints section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsToml {
    /// Base URL of the backend HTTP API
    pub backend_url: Option<String>,

    /// Base URL of the voice transcription service
    pub transcriber_url: Option<String>,

    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: Option<u64>,

    /// System health polling interval in milliseconds
    pub health_poll_interval_ms: Option<u64>,
}

/// Root of the TOML file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WarlinkToml {
    /// Link configuration section
    pub link: LinkToml,

    /// Endpoints configuration section
    pub endpoints: EndpointsToml,
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Configuration for the persistent agent link
#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// WebSocket URL of the backend agent
    pub url: String,

    /// Persona profile attached to outgoing messages
    pub profile: String,

    /// How long a single connect attempt may take before counting as a failure
    pub connect_timeout: Duration,

    /// Interval between heartbeat pings while connected
    pub heartbeat_interval: Duration,

    /// Initial reconnect delay after a transport loss
    pub reconnect_floor: Duration,

    /// Maximum reconnect delay the doubling backoff may reach
    pub reconnect_ceiling: Duration,

    /// Grace delay before the finished response buffer is cleared
    pub clear_grace: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".to_string(),
            profile: "qwen".to_string(),
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(25),
            reconnect_floor: Duration::from_secs(1),
            reconnect_ceiling: Duration::from_secs(30),
            clear_grace: Duration::from_millis(100),
        }
    }
}

impl LinkConfig {
    /// Create a link configuration with default timings for a given URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create a configuration with aggressively short timings for tests
    #[must_use]
    pub fn for_testing(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            profile: "test".to_string(),
            connect_timeout: Duration::from_millis(500),
            heartbeat_interval: Duration::from_millis(50),
            reconnect_floor: Duration::from_millis(25),
            reconnect_ceiling: Duration::from_millis(200),
            clear_grace: Duration::from_millis(20),
        }
    }
}

/// Configuration for the HTTP collaborator endpoints
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Base URL of the backend HTTP API
    pub backend_url: String,

    /// Base URL of the voice transcription service
    pub transcriber_url: String,

    /// HTTP request timeout
    pub request_timeout: Duration,

    /// System health polling interval
    pub health_poll_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            transcriber_url: "http://127.0.0.1:8001".to_string(),
            request_timeout: Duration::from_secs(30),
            health_poll_interval: Duration::from_secs(5),
        }
    }
}

/// Centralized configuration for warlink
///
/// Consolidates all configuration from multiple sources and tracks where the
/// values came from. Use [`load_config`] to load configuration with proper
/// priority handling.
#[derive(Clone, Debug, Default)]
pub struct WarlinkConfig {
    /// Persistent link configuration
    pub link: LinkConfig,

    /// HTTP endpoint configuration
    pub api: ApiConfig,

    /// File the values came from, when one was read
    pub config_file_path: Option<PathBuf>,

    /// Where the effective values came from
    source: ConfigSource,
}

impl WarlinkConfig {
    /// Construct with built-in defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source that contributed values
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check the configuration for values that cannot work at runtime
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when the WebSocket URL has a
    /// non-WebSocket scheme, when any timing is zero, or when the reconnect
    /// floor exceeds the ceiling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.link.url.starts_with("ws://") && !self.link.url.starts_with("wss://") {
            return Err(ConfigError::ValidationError(format!(
                "link url must use ws:// or wss://, got {}",
                self.link.url
            )));
        }
        if self.link.heartbeat_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "heartbeat interval must be non-zero".to_string(),
            ));
        }
        if self.link.reconnect_floor.is_zero() {
            return Err(ConfigError::ValidationError(
                "reconnect floor must be non-zero".to_string(),
            ));
        }
        if self.link.reconnect_floor > self.link.reconnect_ceiling {
            return Err(ConfigError::ValidationError(format!(
                "reconnect floor {:?} exceeds ceiling {:?}",
                self.link.reconnect_floor, self.link.reconnect_ceiling
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/warlink/warlink.toml` or
/// `~/.config/warlink/warlink.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("warlink").join("warlink.toml"))
}

/// Load configuration from the default file location
///
/// CLI overrides are not handled here; apply them afterwards with
/// [`ConfigOverrides`].
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting configuration fails validation. A missing config file is
/// not an error (defaults are used).
pub fn load_config() -> Result<WarlinkConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from an explicit file path
///
/// With `None`, only defaults and environment variables apply.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// resulting configuration fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<WarlinkConfig, ConfigError> {
    let mut config = WarlinkConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: WarlinkToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(path = %config_path.display(), "Applied config file");
        } else {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        }
    }

    // Environment wins over file values
    apply_env_config(&mut config);

    config.validate()?;
    Ok(config)
}

/// Fold file values into the runtime config
fn apply_toml_config(config: &mut WarlinkConfig, toml: &WarlinkToml) {
    // Link settings
    if let Some(ref url) = toml.link.url {
        config.link.url = url.clone();
    }
    if let Some(ref profile) = toml.link.profile {
        config.link.profile = profile.clone();
    }
    if let Some(ms) = toml.link.connect_timeout_ms {
        config.link.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.link.heartbeat_interval_ms {
        config.link.heartbeat_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.link.reconnect_floor_ms {
        config.link.reconnect_floor = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.link.reconnect_ceiling_ms {
        config.link.reconnect_ceiling = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.link.clear_grace_ms {
        config.link.clear_grace = Duration::from_millis(ms);
    }

    // Endpoint settings
    if let Some(ref url) = toml.endpoints.backend_url {
        config.api.backend_url = url.clone();
    }
    if let Some(ref url) = toml.endpoints.transcriber_url {
        config.api.transcriber_url = url.clone();
    }
    if let Some(ms) = toml.endpoints.request_timeout_ms {
        config.api.request_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.endpoints.health_poll_interval_ms {
        config.api.health_poll_interval = Duration::from_millis(ms);
    }
}

/// Fold WARLINK_* environment overrides into the runtime config
fn apply_env_config(config: &mut WarlinkConfig) {
    if let Ok(url) = std::env::var("WARLINK_WS_URL") {
        config.link.url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(profile) = std::env::var("WARLINK_PROFILE") {
        config.link.profile = profile;
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("WARLINK_CONNECT_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.link.connect_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(interval) = std::env::var("WARLINK_HEARTBEAT_INTERVAL_MS") {
        if let Ok(ms) = interval.parse::<u64>() {
            config.link.heartbeat_interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(floor) = std::env::var("WARLINK_RECONNECT_FLOOR_MS") {
        if let Ok(ms) = floor.parse::<u64>() {
            config.link.reconnect_floor = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(ceiling) = std::env::var("WARLINK_RECONNECT_CEILING_MS") {
        if let Ok(ms) = ceiling.parse::<u64>() {
            config.link.reconnect_ceiling = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(url) = std::env::var("WARLINK_BACKEND_URL") {
        config.api.backend_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(url) = std::env::var("WARLINK_TRANSCRIBER_URL") {
        config.api.transcriber_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(interval) = std::env::var("WARLINK_HEALTH_POLL_MS") {
        if let Ok(ms) = interval.parse::<u64>() {
            config.api.health_poll_interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Command-line overrides, applied on top of a loaded configuration
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// WebSocket URL override
    pub url: Option<String>,

    /// Profile override
    pub profile: Option<String>,

    /// Backend HTTP URL override
    pub backend_url: Option<String>,

    /// Transcriber URL override
    pub transcriber_url: Option<String>,

    /// Heartbeat interval override (milliseconds)
    pub heartbeat_interval_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Empty override set, applying it changes nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the WebSocket URL
    #[must_use]
    pub fn with_url(mut self, url: String) -> Self {
        self.url = Some(url);
        self
    }

    /// Override the persona profile
    #[must_use]
    pub fn with_profile(mut self, profile: String) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Override the backend HTTP URL
    #[must_use]
    pub fn with_backend_url(mut self, url: String) -> Self {
        self.backend_url = Some(url);
        self
    }

    /// Override the transcriber URL
    #[must_use]
    pub fn with_transcriber_url(mut self, url: String) -> Self {
        self.transcriber_url = Some(url);
        self
    }

    /// Override the heartbeat interval
    #[must_use]
    pub fn with_heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.heartbeat_interval_ms = Some(ms);
        self
    }

    /// Overlay these values on a loaded configuration
    pub fn apply(&self, config: &mut WarlinkConfig) {
        if self.url.is_some()
            || self.profile.is_some()
            || self.backend_url.is_some()
            || self.transcriber_url.is_some()
            || self.heartbeat_interval_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.url {
            config.link.url = url.clone();
        }

        if let Some(ref profile) = self.profile {
            config.link.profile = profile.clone();
        }

        if let Some(ref url) = self.backend_url {
            config.api.backend_url = url.clone();
        }

        if let Some(ref url) = self.transcriber_url {
            config.api.transcriber_url = url.clone();
        }

        if let Some(ms) = self.heartbeat_interval_ms {
            config.link.heartbeat_interval = Duration::from_millis(ms);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
