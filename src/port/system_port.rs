//! Operating-system serial port backend.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own `PortHandle`
//! trait so the event pump can drive real hardware and mocks alike.

use super::error::PortError;
use super::traits::{PortConfig, PortHandle, PortOpener};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// Buffers discarded when pending I/O is abandoned.
///
/// Outbound bytes already handed to the driver were counted as written, so
/// only unread input is dropped; `close` then flushes the transmit side.
pub(crate) const CANCEL_CLEARS: serialport::ClearBuffer = serialport::ClearBuffer::Input;

/// Serial port handle backed by `serialport::SerialPort`.
pub struct SystemPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The device name/path for identification.
    name: String,
}

impl SystemPort {
    /// Open a serial port with the given configuration.
    ///
    /// # Arguments
    /// * `device` - The system path to the serial port (e.g., "/dev/ttyUSB0" or "COM3")
    /// * `config` - Link parameters for the port
    /// * `io_timeout` - Upper bound for a single read or write call
    ///
    /// # Example
    /// ```no_run
    /// use serial_duplex::port::{PortConfig, SystemPort};
    /// use std::time::Duration;
    ///
    /// let port = SystemPort::open("/dev/ttyUSB0", &PortConfig::new(115200), Duration::from_millis(10))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device: &str, config: &PortConfig, io_timeout: Duration) -> Result<Self, PortError> {
        let parity = serialport::Parity::try_from(config.parity)?;
        let stop_bits = serialport::StopBits::try_from(config.stop_bits)?;

        let port = serialport::new(device, config.baud_rate)
            .data_bits(config.data_bits.into())
            .flow_control(serialport::FlowControl::None)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(io_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(device),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        debug!("Opened {} with {}", device, config);

        Ok(Self {
            port,
            name: device.to_string(),
        })
    }
}

impl PortHandle for SystemPort {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn cancel(&mut self) -> Result<(), PortError> {
        self.port.clear(CANCEL_CLEARS).map_err(PortError::Serial)
    }

    fn close(mut self: Box<Self>) -> Result<(), PortError> {
        // Waits for queued transmit bytes; the descriptor is released on drop
        self.port.flush().map_err(PortError::Io)
    }
}

impl std::fmt::Debug for SystemPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

/// Opens devices through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl PortOpener for SystemOpener {
    fn open(
        &self,
        device: &str,
        config: &PortConfig,
        io_timeout: Duration,
    ) -> Result<Box<dyn PortHandle>, PortError> {
        Ok(Box::new(SystemPort::open(device, config, io_timeout)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{Parity, StopBits};

    #[test]
    fn test_port_not_found_error() {
        let result = SystemPort::open(
            "/dev/nonexistent_port_12345",
            &PortConfig::default(),
            Duration::from_millis(10),
        );

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(PortError::Serial(_)) | Err(PortError::Io(_)) => {}
            other => panic!("Expected open failure, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unsupported_settings_rejected_before_open() {
        let config = PortConfig::default().parity(Parity::Space);
        let err = SystemPort::open("/dev/whatever", &config, Duration::from_millis(10))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, PortError::Unsupported(_)));

        let config = PortConfig::default().stop_bits(StopBits::OnePointFive);
        let err = SystemOpener
            .open("/dev/whatever", &config, Duration::from_millis(10))
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported setting: 1.5 stop bits");
    }

    #[test]
    fn test_cancel_keeps_transmit_buffer() {
        assert!(matches!(CANCEL_CLEARS, serialport::ClearBuffer::Input));
    }
}
