//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::port::{DataBits, Parity, PortConfig, StopBits};
use crate::session::{SessionOptions, WriteErrorPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port configuration
    pub serial: SerialConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check every section for out-of-range values.
    pub fn validate(&self) -> ConfigResult<()> {
        self.serial.validate()
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Default baud rate for new connections
    pub default_baud: u32,
    /// Default data bits (5-8)
    pub data_bits: DataBits,
    /// Default parity: "none", "even", "odd", "space", "mark"
    pub parity: Parity,
    /// Default stop bits: "1", "1.5", "2"
    pub stop_bits: StopBits,
    /// Read buffer size in bytes
    pub chunk_size: usize,
    /// Pause between idle pump iterations in milliseconds
    pub poll_interval_ms: u64,
    /// Bound on waiting for the pump during close, in milliseconds
    pub close_timeout_ms: u64,
    /// What to do with a buffer whose write failed: "stall" or "drop_head"
    pub write_error_policy: WriteErrorPolicy,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let options = SessionOptions::default();
        Self {
            default_baud: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            chunk_size: options.chunk_size,
            poll_interval_ms: options.poll_interval.as_millis() as u64,
            close_timeout_ms: options.close_timeout.as_millis() as u64,
            write_error_policy: options.write_error_policy,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Default link parameters for `open`.
    pub fn port_config(&self) -> PortConfig {
        PortConfig::new(self.default_baud)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits)
    }

    /// Session tunables described by this section.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            chunk_size: self.chunk_size,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
            write_error_policy: self.write_error_policy,
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.default_baud == 0 {
            return Err(ConfigError::validation("serial.default_baud", "must be positive"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::validation("serial.chunk_size", "must be positive"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "serial.poll_interval_ms",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "pretty", "compact", "full"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line format with colors
    Pretty,
    /// Single-line format without span context
    #[default]
    Compact,
    /// Single-line format with span context
    Full,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            _ => Err(format!("unknown log format '{s}'")),
        }
    }
}
