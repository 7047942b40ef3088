//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_DUPLEX";

/// Config file name
const CONFIG_FILE_NAME: &str = "serial-duplex.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_DUPLEX_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_DUPLEX_CONFIG` environment variable (explicit path)
    /// 2. `./serial-duplex.toml` (current directory)
    /// 3. The platform config directory (e.g. `~/.config/serial-duplex/`)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if apply_env_overrides(&mut config).is_err() || config.validate().is_err() {
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|path| path.exists())
}

/// Get the platform config directory for this application.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serial-duplex").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Overwrite `target` with `<ENV_PREFIX>_<key>` if that variable is set.
fn override_from_env<T>(key: &str, target: &mut T) -> ConfigResult<()>
where
    T: FromStr,
    T::Err: Display,
{
    let var = format!("{}_{}", ENV_PREFIX, key);
    if let Ok(val) = std::env::var(&var) {
        *target = val
            .parse()
            .map_err(|e: T::Err| ConfigError::env_parse(var, e.to_string()))?;
    }
    Ok(())
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_DUPLEX_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_DUPLEX_SERIAL_DEFAULT_BAUD=115200`
/// - `SERIAL_DUPLEX_SERIAL_WRITE_ERROR_POLICY=drop_head`
/// - `SERIAL_DUPLEX_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    let serial = &mut config.serial;
    override_from_env("SERIAL_DEFAULT_BAUD", &mut serial.default_baud)?;
    override_from_env("SERIAL_DATA_BITS", &mut serial.data_bits)?;
    override_from_env("SERIAL_PARITY", &mut serial.parity)?;
    override_from_env("SERIAL_STOP_BITS", &mut serial.stop_bits)?;
    override_from_env("SERIAL_CHUNK_SIZE", &mut serial.chunk_size)?;
    override_from_env("SERIAL_POLL_INTERVAL_MS", &mut serial.poll_interval_ms)?;
    override_from_env("SERIAL_CLOSE_TIMEOUT_MS", &mut serial.close_timeout_ms)?;
    override_from_env("SERIAL_WRITE_ERROR_POLICY", &mut serial.write_error_policy)?;

    let logging = &mut config.logging;
    override_from_env("LOGGING_LEVEL", &mut logging.level)?;
    override_from_env("LOGGING_FORMAT", &mut logging.format)?;

    Ok(())
}
