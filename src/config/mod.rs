//! Configuration module for serial-duplex.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_DUPLEX_CONFIG` environment variable (explicit path)
//! 2. `./serial-duplex.toml` (current directory)
//! 3. The platform config directory (`~/.config/serial-duplex/` on Linux,
//!    `%APPDATA%\serial-duplex\config\` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any configuration value can be overridden via environment variables.
//! The pattern is: `SERIAL_DUPLEX_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_DUPLEX_SERIAL_DEFAULT_BAUD=115200`
//! - `SERIAL_DUPLEX_SERIAL_CLOSE_TIMEOUT_MS=500`
//! - `SERIAL_DUPLEX_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_duplex::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Default link: {}", config.serial.port_config());
//! # Ok::<(), serial_duplex::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig};
