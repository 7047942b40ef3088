//! Background worker that drives read and write completions.

use super::events::{EventSink, Notification};
use super::read_loop::ReadLoop;
use super::write_queue::WriteQueue;
use super::Progress;
use crate::port::{PortError, PortHandle};
use crate::state::{PortState, SessionStats, StateCell};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info_span, trace, warn};

/// Everything the pump owns while the session is open.
pub(crate) struct PumpContext {
    pub(crate) handle: Box<dyn PortHandle>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) stats: Arc<SessionStats>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) commands: mpsc::Receiver<Vec<u8>>,
    pub(crate) read_loop: ReadLoop,
    pub(crate) write_queue: WriteQueue,
    pub(crate) poll_interval: Duration,
}

/// What a stopped pump hands back to the session.
pub(crate) struct Released {
    pub(crate) handle: Box<dyn PortHandle>,
    /// Outcome of abandoning the port's pending I/O.
    pub(crate) cancelled: Result<(), PortError>,
}

impl Released {
    /// Close the port on the pump thread after the session stopped waiting.
    ///
    /// Nobody is listening for this session's events anymore, so failures
    /// are only logged.
    fn release_abandoned(self) {
        let port = self.handle.name().to_string();
        if let Err(e) = self.cancelled {
            warn!(port = %port, "Cancel failed on abandoned pump: {}", e);
        }
        match self.handle.close() {
            Ok(()) => debug!(port = %port, "Abandoned pump closed the port"),
            Err(e) => warn!(port = %port, "Close failed on abandoned pump: {}", e),
        }
    }
}

/// Handle to a running pump thread.
///
/// The thread hands the port back through `done` once it has stopped, so the
/// session can release the device itself.
pub(crate) struct EventPump {
    thread: JoinHandle<()>,
    done: mpsc::Receiver<Released>,
    stopped: Arc<AtomicBool>,
}

/// The pump's view of the owner's sink.
///
/// It goes quiet once the pump is told to stop, so a pump left behind by a
/// timed-out close can never talk to a session that has since reopened.
struct PumpSink {
    inner: Arc<dyn EventSink>,
    stopped: Arc<AtomicBool>,
}

impl EventSink for PumpSink {
    fn notify(&self, notification: Notification) {
        if !self.stopped.load(Ordering::Acquire) {
            self.inner.notify(notification);
        }
    }
}

impl EventPump {
    pub(crate) fn start(context: PumpContext) -> io::Result<Self> {
        let (done_tx, done) = mpsc::sync_channel(1);
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let thread = thread::Builder::new()
            .name(format!("serial-pump:{}", context.handle.name()))
            .spawn(move || {
                let released = context.run(flag);
                // The receiver is gone once close gave up waiting
                if let Err(mpsc::SendError(released)) = done_tx.send(released) {
                    released.release_abandoned();
                }
            })?;

        Ok(Self {
            thread,
            done,
            stopped,
        })
    }

    /// Wait up to `timeout` for the pump to stop and return the port.
    ///
    /// The caller must already have moved the session out of `Open`.
    /// Returns `None` when the wait ran out or the pump died. A pump that
    /// outlives the wait closes the port itself when it finally stops.
    pub(crate) fn stop(self, timeout: Duration) -> Option<Released> {
        self.stopped.store(true, Ordering::Release);
        match self.done.recv_timeout(timeout) {
            Ok(released) => {
                if self.thread.join().is_err() {
                    error!("Event pump panicked after releasing the port");
                }
                Some(released)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Event pump did not stop within {:?}; continuing close without it",
                    timeout
                );
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    error!("Event pump panicked; port released by unwinding");
                }
                None
            }
        }
    }
}

impl PumpContext {
    fn run(mut self, stopped: Arc<AtomicBool>) -> Released {
        let span = info_span!("pump", port = %self.handle.name());
        let _entered = span.enter();
        debug!("Event pump started");

        let events = PumpSink {
            inner: Arc::clone(&self.sink),
            stopped: Arc::clone(&stopped),
        };

        while !stopped.load(Ordering::Acquire) && self.state.is(PortState::Open) {
            let mut progress = self.take_commands();
            progress |= self.write_queue.service(
                self.handle.as_mut(),
                &self.state,
                &events,
                &self.stats,
            );
            progress |= self.read_loop.service(
                self.handle.as_mut(),
                &self.state,
                &events,
                &self.stats,
            );

            if progress == Progress::Idle {
                thread::sleep(self.poll_interval);
            }
        }

        self.shutdown()
    }

    /// Move newly sent buffers into the write queue.
    fn take_commands(&mut self) -> Progress {
        let mut progress = Progress::Idle;
        loop {
            match self.commands.try_recv() {
                Ok(data) => {
                    trace!("Queued {} bytes", data.len());
                    if self.write_queue.push(data) {
                        self.write_queue.submit();
                    }
                    progress = Progress::Advanced;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return progress,
            }
        }
    }

    /// Abandon in-flight I/O and give the port back.
    ///
    /// Nothing is reported from here: the pump's sink is already muted, and
    /// the session reports the cancel outcome if it is still waiting.
    fn shutdown(mut self) -> Released {
        let (mut buffers, mut bytes) = self.write_queue.discard();
        for data in self.commands.try_iter() {
            buffers += 1;
            bytes += data.len();
        }
        if buffers > 0 {
            debug!("Discarded {} unsent buffer(s), {} bytes", buffers, bytes);
        }
        debug!(
            read_armed = self.read_loop.is_armed(),
            stalled = self.write_queue.is_stalled(),
            "Event pump stopping"
        );

        let cancelled = self.handle.cancel();
        Released {
            handle: self.handle,
            cancelled,
        }
    }
}
