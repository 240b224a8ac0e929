//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{MonitorError, Result};
use crate::protocol::wire::WireFormat;
use crate::transport::ConnectionTarget;

/// Largest accepted sample window
const MAX_BUFFER_CAPACITY: usize = 1 << 20;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub recording: RecordingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wattmeter connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub wire_format: WireFormat,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Sample window configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BufferConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// Sample recording configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_recording_dir")]
    pub dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path; empty logs to the console only
    #[serde(default)]
    pub file: String,

    #[serde(default = "default_status_interval_frames")]
    pub status_interval_frames: u64,
}

// Default value functions
fn default_url() -> String { "ws://192.168.1.46:8080/ws".to_string() }
fn default_connect_timeout_ms() -> u64 { 5000 }

fn default_capacity() -> usize { crate::samples::buffer::DEFAULT_CAPACITY }

fn default_recording_dir() -> String { "./recordings".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

fn default_log_level() -> String { "info".to_string() }
fn default_status_interval_frames() -> u64 { 100 }

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            wire_format: WireFormat::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: default_capacity() }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_recording_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
            status_interval_frames: default_status_interval_frames(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> MonitorError {
    MonitorError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wattmeter_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Connection target built from `connection.url`
    pub fn target(&self) -> Result<ConnectionTarget> {
        ConnectionTarget::parse(&self.connection.url)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if let Err(e) = self.target() {
            return Err(invalid(format!("connection url: {}", e)));
        }

        if self.connection.connect_timeout_ms == 0 || self.connection.connect_timeout_ms > 60000 {
            return Err(invalid("connect_timeout_ms must be between 1 and 60000"));
        }

        if self.buffer.capacity == 0 || self.buffer.capacity > MAX_BUFFER_CAPACITY {
            return Err(invalid(format!(
                "buffer capacity must be between 1 and {}",
                MAX_BUFFER_CAPACITY
            )));
        }

        if self.recording.enabled && self.recording.dir.is_empty() {
            return Err(invalid("recording dir cannot be empty when enabled"));
        }

        if self.recording.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.recording.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        if self.logging.status_interval_frames == 0 {
            return Err(invalid("status_interval_frames must be greater than 0"));
        }

        Ok(())
    }
}
