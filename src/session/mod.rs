//! Full-duplex port sessions.
//!
//! A [`PortSession`] owns one serial device from `open` to `close`. While it
//! is open, a dedicated pump thread keeps one read armed and transmits queued
//! writes one at a time; everything the pump observes reaches the owner as a
//! [`Notification`].
//!
//! ```text
//! owner thread                      pump thread
//! ────────────                      ───────────
//! open()  ──► opener ──► handle ──► ReadLoop ──┐
//! send()  ──► command channel ────► WriteQueue ├──► EventSink ──► owner
//! close() ──► Closing ─► join(≤ close_timeout) ┘
//! ```

pub mod events;
mod pump;
mod read_loop;
mod write_queue;

pub use events::{EventSink, Notification};
pub use write_queue::WriteErrorPolicy;

use crate::error::SessionError;
use crate::port::{normalize_port_name, PortConfig, PortOpener, SystemOpener};
use crate::state::{PortState, SessionStats, StateCell, StatsSnapshot};
use parking_lot::Mutex;
use pump::{EventPump, PumpContext, Released};
use read_loop::ReadLoop;
use std::ops::{BitOr, BitOrAssign};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use write_queue::WriteQueue;

/// Default size of the read buffer, and so the largest `DataReceived` chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
/// Default pause between pump iterations that made no progress.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Default bound on how long `close` waits for the pump.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Tunables for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Read buffer capacity in bytes.
    pub chunk_size: usize,
    /// Pause between idle pump iterations; also the device I/O timeout.
    pub poll_interval: Duration,
    /// How long `close` waits for the pump before giving up on it.
    pub close_timeout: Duration,
    pub write_error_policy: WriteErrorPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            write_error_policy: WriteErrorPolicy::default(),
        }
    }
}

/// Whether a pump step did anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    Idle,
    Advanced,
}

impl BitOr for Progress {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        if self == Self::Advanced || rhs == Self::Advanced {
            Self::Advanced
        } else {
            Self::Idle
        }
    }
}

impl BitOrAssign for Progress {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// The owner-facing half of an open session.
struct Link {
    port_name: String,
    commands: mpsc::Sender<Vec<u8>>,
}

/// Builder for [`PortSession`].
#[derive(Debug, Default)]
pub struct SessionBuilder {
    opener: Option<Arc<dyn PortOpener>>,
    options: SessionOptions,
}

impl SessionBuilder {
    /// Open devices through `opener` instead of the operating system.
    pub fn opener(mut self, opener: impl PortOpener + 'static) -> Self {
        self.opener = Some(Arc::new(opener));
        self
    }

    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a session whose notifications arrive on the returned channel.
    pub fn build(self) -> (PortSession, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel();
        (self.build_with_sink(tx), rx)
    }

    /// Build a session that delivers notifications to `sink`.
    pub fn build_with_sink(self, sink: impl EventSink + 'static) -> PortSession {
        PortSession {
            opener: self.opener.unwrap_or_else(|| Arc::new(SystemOpener)),
            sink: Arc::new(sink),
            options: self.options,
            state: Arc::new(StateCell::default()),
            stats: Arc::new(SessionStats::default()),
            lifecycle: Mutex::new(None),
            link: Mutex::new(None),
        }
    }
}

/// Manager for one serial device's open/close/read/write lifecycle.
///
/// All operations take `&self`, so a session can be shared behind an `Arc`.
/// `open` and `close` are serialized against each other; `send` and
/// `is_open` never wait on them. Failures are reported through the
/// session's [`EventSink`] rather than returned.
///
/// # Example
/// ```no_run
/// use serial_duplex::{Notification, PortConfig, PortSession};
///
/// let (session, events) = PortSession::new();
/// if session.open("/dev/ttyUSB0", PortConfig::new(115200)) {
///     session.send(b"AT\r\n".to_vec());
///     if let Ok(Notification::DataReceived(bytes)) = events.recv() {
///         println!("{}", String::from_utf8_lossy(&bytes));
///     }
///     session.close();
/// }
/// ```
pub struct PortSession {
    opener: Arc<dyn PortOpener>,
    sink: Arc<dyn EventSink>,
    options: SessionOptions,
    state: Arc<StateCell>,
    stats: Arc<SessionStats>,
    /// The running pump; held for the whole of `open` and `close`.
    lifecycle: Mutex<Option<EventPump>>,
    link: Mutex<Option<Link>>,
}

impl PortSession {
    /// Create a session on the operating system's ports with default options.
    pub fn new() -> (Self, mpsc::Receiver<Notification>) {
        Self::builder().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Open `port_name` with `config` and start streaming.
    ///
    /// Returns false, after emitting `ErrorOccurred`, if the session is not
    /// closed or the device cannot be opened. Success emits nothing.
    pub fn open(&self, port_name: &str, config: PortConfig) -> bool {
        let mut lifecycle = self.lifecycle.lock();

        if let Err(actual) = self.state.transition(PortState::Closed, PortState::Opening) {
            debug!(port = port_name, state = %actual, "Rejecting open");
            self.report(port_name, SessionError::AlreadyOpen);
            return false;
        }

        match self.start(port_name, config) {
            Ok(pump) => {
                *lifecycle = Some(pump);
                true
            }
            Err(err) => {
                // Either still Opening, or Open with no pump running
                let _ = self.state.transition(PortState::Opening, PortState::Closed);
                if self.state.transition(PortState::Open, PortState::Closing).is_ok() {
                    let _ = self.state.transition(PortState::Closing, PortState::Closed);
                }
                self.link.lock().take();
                self.report(port_name, err);
                false
            }
        }
    }

    fn start(&self, port_name: &str, config: PortConfig) -> Result<EventPump, SessionError> {
        let device = normalize_port_name(port_name).into_owned();
        info!(port = %device, "Opening with {}", config);

        let handle = self
            .opener
            .open(&device, &config, self.options.poll_interval)
            .map_err(|source| SessionError::DeviceOpen {
                port: device.clone(),
                source,
            })?;

        self.stats.reset();
        let mut read_loop = ReadLoop::new(self.options.chunk_size);
        read_loop.arm(&self.stats);

        let (commands_tx, commands) = mpsc::channel();
        *self.link.lock() = Some(Link {
            port_name: device.clone(),
            commands: commands_tx,
        });

        // Open before the pump starts so its loop condition holds from the
        // first iteration; nobody can close until the lifecycle lock drops.
        let _ = self.state.transition(PortState::Opening, PortState::Open);

        let pump = EventPump::start(PumpContext {
            handle,
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            sink: Arc::clone(&self.sink),
            commands,
            read_loop,
            write_queue: WriteQueue::new(self.options.write_error_policy),
            poll_interval: self.options.poll_interval,
        })
        .map_err(|e| SessionError::DeviceOpen {
            port: device.clone(),
            source: e.into(),
        })?;

        info!(port = %device, "Port open");
        Ok(pump)
    }

    /// Stop streaming and release the device. A no-op when already closed.
    ///
    /// Blocks for at most the configured close timeout while the pump winds
    /// down, then emits `PortClosed`.
    pub fn close(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let Some(pump) = lifecycle.take() else {
            return;
        };

        // Stop accepting sends; in-flight I/O is abandoned once the pump
        // sees Closing.
        let port_name = self
            .link
            .lock()
            .take()
            .map(|link| link.port_name)
            .unwrap_or_default();
        let _ = self.state.transition(PortState::Open, PortState::Closing);
        info!(port = %port_name, "Closing");

        // A pump that misses the deadline closes the port itself, silently
        if let Some(Released { handle, cancelled }) = pump.stop(self.options.close_timeout) {
            if let Err(e) = cancelled {
                self.report(&port_name, SessionError::Close(e));
            }
            if let Err(e) = handle.close() {
                self.report(&port_name, SessionError::Close(e));
            }
        }
        self.stats.record_read_stopped();

        let _ = self.state.transition(PortState::Closing, PortState::Closed);
        info!(port = %port_name, "Port closed");
        self.sink.notify(Notification::PortClosed);
    }

    /// Lock-free check for `PortState::Open`.
    pub fn is_open(&self) -> bool {
        self.state.is(PortState::Open)
    }

    pub fn state(&self) -> PortState {
        self.state.load()
    }

    /// Queue `bytes` for transmission after everything sent before it.
    ///
    /// Emits `ErrorOccurred` with `NotOpen` unless the session is open.
    pub fn send(&self, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        if !self.is_open() {
            self.report("", SessionError::NotOpen);
            return;
        }
        if bytes.is_empty() {
            return;
        }

        let rejected = match &*self.link.lock() {
            Some(link) => link.commands.send(bytes).is_err(),
            None => true,
        };
        if rejected {
            self.report("", SessionError::NotOpen);
        } else {
            self.stats.record_queued();
        }
    }

    /// Wait until every buffer sent so far was written or dropped.
    ///
    /// Gives up when `timeout` elapses or the session stops being open, and
    /// returns whether nothing was left to transmit. A stalled queue never
    /// drains, so this then waits out the whole timeout.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.stats.snapshot().pending_writes() == 0 {
                return true;
            }
            if !self.is_open() || Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.options.poll_interval);
        }
    }

    /// Device name in use after normalization, while open.
    pub fn port_name(&self) -> Option<String> {
        self.link.lock().as_ref().map(|link| link.port_name.clone())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn report(&self, port: &str, err: SessionError) {
        events::report(self.sink.as_ref(), port, err);
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PortSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSession")
            .field("state", &self.state.load())
            .field("port_name", &self.port_name())
            .field("options", &self.options)
            .finish()
    }
}
