//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates serial port behavior without
//! requiring actual hardware. Two mocks can be wired back to back to form a
//! null-modem loopback, and faults can be injected on read, write and close.

use super::error::PortError;
use super::traits::{PortConfig, PortHandle, PortOpener};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Inner state of the mock port, shared between clones.
#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// One entry per successful write call.
    write_log: Vec<Vec<u8>>,
    /// The other end of a loopback pair, if wired.
    peer: Option<Weak<Mutex<MockPortState>>>,
    /// Error kind returned by the next read.
    fail_next_read: Option<io::ErrorKind>,
    /// Number of upcoming write calls that fail.
    failing_writes: usize,
    /// Whether `cancel` reports an error.
    fail_cancel: bool,
    /// Whether `close` reports an error.
    fail_close: bool,
    /// Upper bound on bytes accepted per write call.
    max_write_chunk: Option<usize>,
    /// Time every read call blocks before looking at the queue.
    read_delay: Option<Duration>,
    cancel_count: usize,
    closed: bool,
}

/// Mock serial port implementation for testing.
///
/// Clones share state, so a test can keep one clone for inspection while a
/// session owns another.
///
/// # Example
/// ```
/// use serial_duplex::port::{MockSerialPort, PortHandle};
///
/// let (mut a, mut b) = MockSerialPort::pair("MOCK-A", "MOCK-B");
///
/// a.write_bytes(b"ping").unwrap();
///
/// let mut buffer = [0u8; 8];
/// let n = b.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"ping");
/// assert_eq!(a.written(), b"ping");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    /// The internal state, shared between clones.
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new, unconnected mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    /// Create two mocks wired as a null-modem: each one's writes become the
    /// other's reads.
    pub fn pair(a: impl Into<String>, b: impl Into<String>) -> (Self, Self) {
        let a = Self::new(a);
        let b = Self::new(b);
        a.state.lock().peer = Some(Arc::downgrade(&b.state));
        b.state.lock().peer = Some(Arc::downgrade(&a.state));
        (a, b)
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Get a copy of each write call's bytes, in order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Get everything written so far as one contiguous buffer.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    /// Make the next read fail with an I/O error of the given kind.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        self.state.lock().fail_next_read = Some(kind);
    }

    /// Make the next `count` write calls fail.
    pub fn fail_writes(&self, count: usize) {
        self.state.lock().failing_writes = count;
    }

    /// Make `cancel` report an error.
    pub fn fail_cancel(&self) {
        self.state.lock().fail_cancel = true;
    }

    /// Make `close` report an error.
    pub fn fail_close(&self) {
        self.state.lock().fail_close = true;
    }

    /// Accept at most `max` bytes per write call, forcing partial writes.
    pub fn set_max_write_chunk(&self, max: usize) {
        self.state.lock().max_write_chunk = Some(max.max(1));
    }

    /// Block every read for `delay` before looking at the queue.
    pub fn set_read_delay(&self, delay: Duration) {
        self.state.lock().read_delay = Some(delay);
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Number of times `cancel` was called.
    pub fn cancel_count(&self) -> usize {
        self.state.lock().cancel_count
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl PortHandle for MockSerialPort {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let delay = self.state.lock().read_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();

        if let Some(kind) = state.fail_next_read.take() {
            return Err(PortError::Io(io::Error::new(kind, "injected read failure")));
        }

        if state.read_queue.is_empty() {
            // Simulate an idle line the way a port with a short timeout does
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                "No data available",
            )));
        }

        let n = buffer.len().min(state.read_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }

        let n = state.max_write_chunk.map_or(data.len(), |max| max.min(data.len()));
        let accepted = &data[..n];
        state.write_log.push(accepted.to_vec());

        // Never hold both locks: the peer may be writing back at the same time
        let peer = state.peer.as_ref().and_then(Weak::upgrade);
        drop(state);
        if let Some(peer) = peer {
            peer.lock().read_queue.extend(accepted);
        }

        Ok(n)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn cancel(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.cancel_count += 1;
        if state.fail_cancel {
            return Err(PortError::Io(io::Error::other("injected cancel failure")));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.closed = true;
        if state.fail_close {
            return Err(PortError::Io(io::Error::other("injected close failure")));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

/// Opener that hands out registered mock ports by device name.
///
/// Every device name it is asked to open is recorded, which lets tests see
/// the name after normalization.
#[derive(Debug, Clone, Default)]
pub struct MockOpener {
    ports: Arc<Mutex<HashMap<String, MockSerialPort>>>,
    opened: Arc<Mutex<Vec<(String, PortConfig)>>>,
}

impl MockOpener {
    /// Create an opener with no registered ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `port` under the device name `device`.
    pub fn with_port(self, device: impl Into<String>, port: MockSerialPort) -> Self {
        self.register(device, port);
        self
    }

    /// Register `port` under the device name `device`.
    pub fn register(&self, device: impl Into<String>, port: MockSerialPort) {
        self.ports.lock().insert(device.into(), port);
    }

    /// Device names passed to `open`, in call order.
    pub fn opened_devices(&self) -> Vec<String> {
        self.opened.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Link parameters of the most recent `open` call.
    pub fn last_config(&self) -> Option<PortConfig> {
        self.opened.lock().last().map(|(_, config)| *config)
    }
}

impl PortOpener for MockOpener {
    fn open(
        &self,
        device: &str,
        config: &PortConfig,
        _io_timeout: Duration,
    ) -> Result<Box<dyn PortHandle>, PortError> {
        self.opened.lock().push((device.to_string(), *config));
        self.ports
            .lock()
            .get(device)
            .cloned()
            .map(|port| Box::new(port) as Box<dyn PortHandle>)
            .ok_or_else(|| PortError::not_found(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_partial_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello, World!");

        let mut buffer = [0u8; 5];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
        assert_eq!(port.available_bytes(), 8);
    }

    #[test]
    fn test_empty_read_is_pending() {
        let mut port = MockSerialPort::new("MOCK0");
        let mut buffer = [0u8; 10];

        let err = port.read_bytes(&mut buffer).unwrap_err();
        assert!(err.is_pending());
    }

    #[test]
    fn test_injected_read_failure_is_one_shot() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"x");
        port.fail_next_read(io::ErrorKind::BrokenPipe);

        let mut buffer = [0u8; 4];
        let err = port.read_bytes(&mut buffer).unwrap_err();
        assert!(!err.is_pending());
        assert_eq!(port.read_bytes(&mut buffer).unwrap(), 1);
    }

    #[test]
    fn test_partial_writes_and_log() {
        let mut port = MockSerialPort::new("MOCK0");
        port.set_max_write_chunk(3);

        assert_eq!(port.write_bytes(b"abcdef").unwrap(), 3);
        assert_eq!(port.write_bytes(b"def").unwrap(), 3);
        assert_eq!(port.write_log(), vec![b"abc".to_vec(), b"def".to_vec()]);
        assert_eq!(port.written(), b"abcdef");
    }

    #[test]
    fn test_failing_writes_then_recovery() {
        let mut port = MockSerialPort::new("MOCK0");
        port.fail_writes(1);

        assert!(port.write_bytes(b"lost").is_err());
        assert_eq!(port.write_bytes(b"kept").unwrap(), 4);
        assert_eq!(port.written(), b"kept");
    }

    #[test]
    fn test_pair_is_null_modem() {
        let (mut a, mut b) = MockSerialPort::pair("A", "B");
        b.write_bytes(b"pong").unwrap();

        let mut buffer = [0u8; 8];
        let n = a.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"pong");
        assert_eq!(b.available_bytes(), 0);
    }

    #[test]
    fn test_close_failure() {
        let port = MockSerialPort::new("MOCK0");
        port.fail_close();
        let inspector = port.clone();

        let result = Box::new(port).close();
        assert!(result.is_err());
        assert!(inspector.is_closed());
    }

    #[test]
    fn test_opener_records_devices() {
        let opener = MockOpener::new().with_port("COM3", MockSerialPort::new("COM3"));

        assert!(opener
            .open("COM3", &PortConfig::new(19200), Duration::from_millis(1))
            .is_ok());
        let err = opener
            .open("COM4", &PortConfig::default(), Duration::from_millis(1))
            .unwrap_err();

        assert!(matches!(err, PortError::NotFound(_)));
        assert_eq!(opener.opened_devices(), vec!["COM3", "COM4"]);
        assert_eq!(opener.last_config(), Some(PortConfig::default()));
    }
}
