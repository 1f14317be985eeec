//! Bootstrap configuration loading
//!
//! Settings are resolved in the following priority order:
//! 1. Command-line arguments (applied by the binary via [`ConfigOverrides`])
//! 2. Environment variables (`ROLLCALL_PORT`, `ROLLCALL_SNAPSHOT_PATH`)
//! 3. TOML config file (`ROLLCALL_CONFIG`, or `<config_dir>/rollcall/config.toml`)
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: a warning is logged and defaults are used.
//! A TOML file that exists but cannot be parsed is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "ROLLCALL_CONFIG";
/// Environment variable overriding the HTTP port
pub const ENV_PORT: &str = "ROLLCALL_PORT";
/// Environment variable overriding the snapshot file path
pub const ENV_SNAPSHOT_PATH: &str = "ROLLCALL_SNAPSHOT_PATH";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Flat snapshot file the ledger is loaded from at startup and saved to
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Detection stream tuning
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            snapshot_path: default_snapshot_path(),
            logging: LoggingConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Detection stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Timeout for the connectivity probe issued before a stream is registered
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Reader gives up when no bytes arrive for this long. 0 disables the timeout.
    #[serde(default)]
    pub read_idle_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            read_idle_timeout_ms: 0,
        }
    }
}

impl StreamConfig {
    pub fn probe_timeout(&self) -> Duration {
        crate::time::millis_to_duration(self.probe_timeout_ms)
    }

    pub fn read_idle_timeout(&self) -> Option<Duration> {
        crate::time::optional_millis(self.read_idle_timeout_ms)
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1500
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("output.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

/// Command-line configuration overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub snapshot_path: Option<PathBuf>,
}

impl TomlConfig {
    /// Apply command-line overrides on top of the resolved configuration
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(bind_address) = overrides.bind_address {
            self.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(snapshot_path) = overrides.snapshot_path {
            self.snapshot_path = snapshot_path;
        }
        self
    }

    /// `host:port` string for binding the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Resolves the bootstrap configuration from file, environment and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit config file (from `--config`) instead of the env/default lookup
    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    /// Path of the TOML file that will be consulted, if any could be determined
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit_path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            return Some(PathBuf::from(path));
        }
        default_config_path()
    }

    /// Resolve TOML file (or defaults) then apply environment overrides
    pub fn resolve(&self) -> Result<TomlConfig> {
        self.resolve_with_source().map(|(config, _)| config)
    }

    /// Like [`resolve`](Self::resolve), also reporting where the file-level settings came from
    ///
    /// Nothing is logged here; callers usually resolve configuration before
    /// the tracing subscriber exists and log the returned [`ConfigSource`] afterwards.
    pub fn resolve_with_source(&self) -> Result<(TomlConfig, ConfigSource)> {
        let (config, source) = match self.config_path() {
            Some(path) if path.exists() => (load_toml_config(&path)?, ConfigSource::File(path)),
            Some(path) => (TomlConfig::default(), ConfigSource::Defaults(Some(path))),
            None => (TomlConfig::default(), ConfigSource::Defaults(None)),
        };

        Ok((apply_env_overrides(config)?, source))
    }
}

/// Origin of the file-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this TOML file
    File(PathBuf),
    /// No file found (at the given path, if one could be determined); compiled defaults used
    Defaults(Option<PathBuf>),
}

impl ConfigSource {
    /// Log the configuration origin (call once tracing is initialized)
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults(Some(path)) => {
                warn!("Config file {} not found, using defaults", path.display())
            }
            ConfigSource::Defaults(None) => {
                warn!("Could not determine config directory, using defaults")
            }
        }
    }
}

fn apply_env_overrides(mut config: TomlConfig) -> Result<TomlConfig> {
    if let Ok(port) = std::env::var(ENV_PORT) {
        config.port = port.parse().map_err(|e| {
            Error::Config(format!("{} must be a port number, got {:?}: {}", ENV_PORT, port, e))
        })?;
    }

    if let Ok(path) = std::env::var(ENV_SNAPSHOT_PATH) {
        config.snapshot_path = PathBuf::from(path);
    }

    Ok(config)
}

/// Platform config location: `<config_dir>/rollcall/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rollcall").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write a TOML config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
