//! Port abstraction layer for serial communication.
//!
//! Provides the `PortHandle`/`PortOpener` traits, the operating-system
//! backend, a mock backend for tests and loopback, and device-name
//! normalization.

pub mod error;
pub mod mock;
pub mod name;
pub mod system_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockOpener, MockSerialPort};
pub use name::normalize_port_name;
pub use system_port::{SystemOpener, SystemPort};
pub use traits::*;
