//! Configuration management for esdump
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments (applied by the `cli` module)
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::query::{DEFAULT_PAGE_SIZE, parse_keepalive};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cluster connection configuration
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Export behaviour
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Node URLs, requests rotate across them
    #[serde(default = "default_addresses")]
    pub addresses: Vec<String>,

    /// Basic authentication user
    #[serde(default)]
    pub username: Option<String>,

    /// Basic authentication password
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Retries for transient fetch failures (0 disables retrying)
    #[serde(default)]
    pub retry_attempts: u32,
}

/// Export behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output file used unless printing to stdout
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Append to an existing output file instead of truncating it
    #[serde(default = "default_append")]
    pub append: bool,

    /// Scroll keep-alive, e.g. "30m"
    #[serde(default = "default_scroll")]
    pub scroll: String,

    /// Hits per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Fail the run on the first record that cannot be serialized
    #[serde(default)]
    pub strict: bool,

    /// Show a progress bar on stderr
    #[serde(default = "default_progress")]
    pub progress: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_addresses() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_timeout() -> u64 {
    60
}

fn default_output_file() -> PathBuf {
    PathBuf::from("./es.export.log")
}

fn default_append() -> bool {
    true
}

fn default_scroll() -> String {
    "30m".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_progress() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            addresses: default_addresses(),
            username: None,
            password: None,
            timeout: default_timeout(),
            retry_attempts: 0,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_file: default_output_file(),
            append: default_append(),
            scroll: default_scroll(),
            page_size: default_page_size(),
            strict: false,
            progress: default_progress(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".esdump")
            .join("config.toml")
    }

    /// Load configuration from a file
    ///
    /// With no explicit path a missing default file yields the defaults;
    /// an explicit path that does not exist is an error.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_config_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Apply `ESDUMP_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addresses) = lookup("ESDUMP_ADDRESSES") {
            self.cluster.addresses = split_addresses(&addresses);
        }
        if let Some(username) = lookup("ESDUMP_USERNAME") {
            self.cluster.username = Some(username);
        }
        if let Some(password) = lookup("ESDUMP_PASSWORD") {
            self.cluster.password = Some(password);
        }
        if let Some(level) = lookup("ESDUMP_LOG_LEVEL") {
            self.logging.level = LogLevel::parse(&level).ok_or(ConfigError::InvalidValue {
                field: "ESDUMP_LOG_LEVEL".to_string(),
                value: level,
            })?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cluster.addresses.is_empty() {
            return Err(ConfigError::MissingField("cluster.addresses".to_string()).into());
        }
        for address in &self.cluster.addresses {
            if !(address.starts_with("http://") || address.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: "cluster.addresses".to_string(),
                    value: address.clone(),
                }
                .into());
            }
        }
        if self.cluster.timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cluster.timeout".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.export.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "export.page_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        self.scroll_keepalive()?;
        Ok(())
    }

    /// Scroll keep-alive as a Duration
    pub fn scroll_keepalive(&self) -> Result<Duration> {
        parse_keepalive(&self.export.scroll).map_err(|_| {
            ConfigError::InvalidValue {
                field: "export.scroll".to_string(),
                value: self.export.scroll.clone(),
            }
            .into()
        })
    }
}

impl ClusterConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Split a comma-separated address list, skipping empty entries
pub fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl LogLevel {
    /// Parse a level name, case-insensitive
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
