//! Port-specific error types.
//!
//! Defines error types for device-level operations, kept separate from the
//! session-level taxonomy so backends stay ignorant of the lifecycle.

use thiserror::Error;

/// Errors that can occur while talking to a serial device.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend cannot express the requested link setting.
    #[error("Unsupported setting: {0}")]
    Unsupported(String),

    /// A link parameter is outside its valid domain.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create an Unsupported error from a setting description.
    pub fn unsupported(setting: impl Into<String>) -> Self {
        Self::Unsupported(setting.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Whether this error only means "nothing transferred yet".
    ///
    /// Read and write calls on a port with a short timeout report an idle
    /// line this way; the pump treats it as "no completion" rather than a
    /// transport failure.
    pub fn is_pending(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
