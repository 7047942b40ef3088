//! Serial Duplex Library
//!
//! Non-blocking, full-duplex serial port sessions. A [`PortSession`] opens a
//! device with explicit link parameters, streams inbound bytes to its owner
//! from a background pump thread, and transmits outbound buffers strictly in
//! submission order.
//!
//! # Modules
//!
//! - `session`: Session lifecycle, read loop, write queue and event pump
//! - `port`: Port abstraction layer (OS backend, mock backend, name normalization)
//! - `state`: Lifecycle state machine and traffic counters
//! - `error`: Session error taxonomy
//! - `config`: Configuration management with TOML support
//! - `logging`: Tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod port;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, SessionError};
pub use port::{
    normalize_port_name, DataBits, MockOpener, MockSerialPort, Parity, PortConfig, PortError,
    PortHandle, PortOpener, StopBits, SystemOpener, SystemPort,
};
pub use session::{
    EventSink, Notification, PortSession, SessionBuilder, SessionOptions, WriteErrorPolicy,
};
pub use state::{PortState, StatsSnapshot};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
