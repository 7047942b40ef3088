use crate::port::PortError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Session-level errors.
///
/// None of these are returned to the caller of a session operation; each is
/// converted to an `ErrorOccurred` notification at the point it occurs.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `open` while the session is Opening or Open.
    #[error("Port is already open")]
    AlreadyOpen,

    /// The device could not be opened or configured.
    #[error("Failed to open port {port}: {source}")]
    DeviceOpen {
        port: String,
        #[source]
        source: PortError,
    },

    /// A read or write completed with a transport failure.
    #[error("Failed to {direction} data: {source}")]
    Io {
        direction: Direction,
        #[source]
        source: PortError,
    },

    /// `send` while the session is not Open.
    #[error("Port is not open")]
    NotOpen,

    /// Releasing the device failed. The session is closed regardless.
    #[error("Failed to close port: {0}")]
    Close(#[source] PortError),
}

impl SessionError {
    pub fn read(source: PortError) -> Self {
        Self::Io {
            direction: Direction::Read,
            source,
        }
    }

    pub fn write(source: PortError) -> Self {
        Self::Io {
            direction: Direction::Write,
            source,
        }
    }

    /// The coarse category carried alongside the message in notifications.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyOpen => ErrorKind::AlreadyOpen,
            Self::DeviceOpen { .. } => ErrorKind::DeviceOpen,
            Self::Io { .. } => ErrorKind::Io,
            Self::NotOpen => ErrorKind::NotOpen,
            Self::Close(_) => ErrorKind::Close,
        }
    }
}

/// Transfer direction of an I/O failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Category of an `ErrorOccurred` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AlreadyOpen,
    DeviceOpen,
    Io,
    NotOpen,
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_messages() {
        assert_eq!(SessionError::AlreadyOpen.to_string(), "Port is already open");
        assert_eq!(SessionError::NotOpen.to_string(), "Port is not open");

        let err = SessionError::DeviceOpen {
            port: "COM7".into(),
            source: PortError::not_found("COM7"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open port COM7: Serial port not found: COM7"
        );

        let err = SessionError::read(PortError::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "device removed",
        )));
        assert_eq!(err.to_string(), "Failed to read data: I/O error: device removed");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(SessionError::NotOpen.kind(), ErrorKind::NotOpen);
        assert_eq!(
            SessionError::write(PortError::timeout(std::time::Duration::from_secs(1))).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            SessionError::Close(PortError::config("x")).kind(),
            ErrorKind::Close
        );
    }
}
