//! Errors raised while loading, validating or saving configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for the schema.
    #[error("Malformed config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Only `ConfigLoader::save_to` produces this.
    #[error("Cannot encode config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Cannot write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value parsed but is out of range, e.g. `serial.chunk_size = 0`.
    #[error("Invalid value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// A `SERIAL_DUPLEX_*` override did not parse as its field's type.
    #[error("Bad value in environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },
}

impl ConfigError {
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
