//! Self-re-arming read over the port handle.

use super::events::{report, EventSink, Notification};
use super::Progress;
use crate::error::SessionError;
use crate::port::PortHandle;
use crate::state::{PortState, SessionStats, StateCell};
use tracing::{debug, trace};

/// A single read that re-arms itself after every successful completion.
///
/// The buffer is reused in place; each completed read hands the owner a
/// copy of exactly the bytes it filled. A failed read ends the loop for
/// the lifetime of this value.
#[derive(Debug)]
pub(crate) struct ReadLoop {
    buffer: Box<[u8]>,
    armed: bool,
    terminated: bool,
}

impl ReadLoop {
    pub(crate) fn new(chunk_size: usize) -> Self {
        Self {
            buffer: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            armed: false,
            terminated: false,
        }
    }

    /// Issue the next read unless one is already armed or the loop ended.
    pub(crate) fn arm(&mut self, stats: &SessionStats) -> bool {
        if !self.armed && !self.terminated {
            self.armed = true;
            stats.record_read_armed();
        }
        self.armed
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    #[cfg(test)]
    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Drive the armed read one step.
    pub(crate) fn service(
        &mut self,
        handle: &mut dyn PortHandle,
        state: &StateCell,
        sink: &dyn EventSink,
        stats: &SessionStats,
    ) -> Progress {
        if !self.armed {
            return Progress::Idle;
        }

        let result = handle.read_bytes(&mut self.buffer);

        match result {
            Ok(0) => Progress::Idle,
            Err(e) if e.is_pending() => Progress::Idle,
            Ok(n) => {
                self.armed = false;
                if !state.is(PortState::Open) {
                    debug!(port = handle.name(), "Dropping {} bytes read during close", n);
                    return Progress::Idle;
                }

                let chunk = self.buffer[..n].to_vec();
                trace!(port = handle.name(), "Read {} bytes", n);
                stats.record_chunk(n);
                sink.notify(Notification::DataReceived(chunk));

                self.arm(stats);
                Progress::Advanced
            }
            Err(e) => {
                self.armed = false;
                self.terminated = true;
                stats.record_read_stopped();
                if !state.is(PortState::Open) {
                    debug!(port = handle.name(), "Read cancelled by close: {}", e);
                    return Progress::Idle;
                }

                report(sink, handle.name(), SessionError::read(e));
                Progress::Advanced
            }
        }
    }
}
