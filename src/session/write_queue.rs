//! FIFO of outbound buffers with a single write in flight.

use super::events::{report, EventSink};
use super::Progress;
use crate::error::SessionError;
use crate::port::PortHandle;
use crate::state::{PortState, SessionStats, StateCell};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// What the queue does with its head after a write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteErrorPolicy {
    /// Keep the failed head and stop transmitting until the session is
    /// reopened. Later sends are queued but never written.
    #[default]
    Stall,
    /// Discard the failed head and carry on with the next buffer.
    DropHead,
}

impl std::str::FromStr for WriteErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stall" => Ok(Self::Stall),
            "drop_head" => Ok(Self::DropHead),
            _ => Err(format!("unknown write error policy '{s}'")),
        }
    }
}

/// An outbound buffer and how much of it the device has accepted.
#[derive(Debug)]
struct PendingWrite {
    data: Vec<u8>,
    offset: usize,
}

impl PendingWrite {
    fn remaining(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    fn is_done(&self) -> bool {
        self.offset >= self.data.len()
    }
}

#[derive(Debug)]
pub(crate) struct WriteQueue {
    entries: VecDeque<PendingWrite>,
    in_flight: bool,
    stalled: bool,
    policy: WriteErrorPolicy,
}

impl WriteQueue {
    pub(crate) fn new(policy: WriteErrorPolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            in_flight: false,
            stalled: false,
            policy,
        }
    }

    /// Append `data`; returns true when it became the only entry and should
    /// be submitted right away.
    pub(crate) fn push(&mut self, data: Vec<u8>) -> bool {
        self.entries.push_back(PendingWrite { data, offset: 0 });
        self.entries.len() == 1
    }

    /// Put the head in flight, if there is one and the queue is not stalled.
    pub(crate) fn submit(&mut self) {
        self.in_flight = !self.stalled && !self.entries.is_empty();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub(crate) fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Drop everything still queued, returning `(buffers, bytes)` discarded.
    pub(crate) fn discard(&mut self) -> (usize, usize) {
        self.in_flight = false;
        let bytes = self.entries.iter().map(|w| w.remaining().len()).sum();
        let buffers = self.entries.len();
        self.entries.clear();
        (buffers, bytes)
    }

    /// Drive the in-flight write one step.
    pub(crate) fn service(
        &mut self,
        handle: &mut dyn PortHandle,
        state: &StateCell,
        sink: &dyn EventSink,
        stats: &SessionStats,
    ) -> Progress {
        if !self.in_flight {
            return Progress::Idle;
        }
        let Some(head) = self.entries.front_mut() else {
            self.in_flight = false;
            return Progress::Idle;
        };

        match handle.write_bytes(head.remaining()) {
            Err(e) if e.is_pending() => Progress::Idle,
            Ok(n) => {
                head.offset += n;
                stats.record_sent(n);
                if !head.is_done() {
                    trace!(port = handle.name(), "Partial write of {} bytes", n);
                    return if n == 0 { Progress::Idle } else { Progress::Advanced };
                }

                self.entries.pop_front();
                self.in_flight = false;
                stats.record_write_completed();
                if state.is(PortState::Open) {
                    self.submit();
                }
                Progress::Advanced
            }
            Err(e) => {
                self.in_flight = false;
                if !state.is(PortState::Open) {
                    debug!(port = handle.name(), "Write cancelled by close: {}", e);
                    return Progress::Idle;
                }

                report(sink, handle.name(), SessionError::write(e));
                match self.policy {
                    WriteErrorPolicy::Stall => {
                        self.stalled = true;
                        warn!(
                            port = handle.name(),
                            "Write queue stalled with {} buffer(s) pending until reopen",
                            self.entries.len()
                        );
                    }
                    WriteErrorPolicy::DropHead => {
                        self.entries.pop_front();
                        stats.record_write_dropped();
                        self.submit();
                    }
                }
                Progress::Advanced
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialPort;
    use crate::session::events::Notification;
    use std::sync::mpsc;

    fn open_state() -> StateCell {
        let state = StateCell::default();
        state.transition(PortState::Closed, PortState::Opening).unwrap();
        state.transition(PortState::Opening, PortState::Open).unwrap();
        state
    }

    fn drive(queue: &mut WriteQueue, port: &mut MockSerialPort, state: &StateCell) {
        let (tx, _rx) = mpsc::channel();
        let stats = SessionStats::default();
        for _ in 0..64 {
            queue.service(port, state, &tx, &stats);
        }
    }

    #[test]
    fn test_only_first_push_kicks_off() {
        let mut queue = WriteQueue::new(WriteErrorPolicy::Stall);
        assert!(queue.push(b"one".to_vec()));
        assert!(!queue.push(b"two".to_vec()));
        assert!(!queue.is_in_flight());

        queue.submit();
        assert!(queue.is_in_flight());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_partial_writes_never_interleave() {
        let state = open_state();
        let mut port = MockSerialPort::new("MOCK0");
        port.set_max_write_chunk(2);

        let mut queue = WriteQueue::new(WriteErrorPolicy::Stall);
        queue.push(b"hello".to_vec());
        queue.push(b"world".to_vec());
        queue.submit();
        drive(&mut queue, &mut port, &state);

        assert_eq!(port.written(), b"helloworld");
        assert_eq!(
            port.write_log(),
            vec![
                b"he".to_vec(),
                b"ll".to_vec(),
                b"o".to_vec(),
                b"wo".to_vec(),
                b"rl".to_vec(),
                b"d".to_vec(),
            ]
        );
        assert_eq!(queue.len(), 0);
        assert!(!queue.is_in_flight());
    }

    #[test]
    fn test_stall_policy_keeps_head() {
        let (tx, rx) = mpsc::channel();
        let stats = SessionStats::default();
        let state = open_state();
        let mut port = MockSerialPort::new("MOCK0");
        port.fail_writes(1);

        let mut queue = WriteQueue::new(WriteErrorPolicy::Stall);
        queue.push(b"first".to_vec());
        queue.push(b"second".to_vec());
        queue.submit();

        for _ in 0..8 {
            queue.service(&mut port, &state, &tx, &stats);
        }

        assert!(queue.is_stalled());
        assert_eq!(queue.len(), 2);
        assert!(port.written().is_empty());
        assert_eq!(rx.try_iter().count(), 1);

        queue.submit();
        assert!(!queue.is_in_flight());
    }

    #[test]
    fn test_drop_head_policy_continues() {
        let (tx, rx) = mpsc::channel();
        let stats = SessionStats::default();
        let state = open_state();
        let mut port = MockSerialPort::new("MOCK0");
        port.fail_writes(1);

        let mut queue = WriteQueue::new(WriteErrorPolicy::DropHead);
        queue.push(b"first".to_vec());
        queue.push(b"second".to_vec());
        queue.submit();

        for _ in 0..8 {
            queue.service(&mut port, &state, &tx, &stats);
        }

        assert_eq!(port.written(), b"second");
        assert_eq!(stats.snapshot().writes_completed, 1);
        assert!(matches!(
            rx.try_recv().unwrap(),
            Notification::ErrorOccurred { message, .. } if message.starts_with("Failed to write data")
        ));
    }

    #[test]
    fn test_discard_counts_remaining_bytes() {
        let state = open_state();
        let mut port = MockSerialPort::new("MOCK0");
        port.set_max_write_chunk(3);
        let (tx, _rx) = mpsc::channel();
        let stats = SessionStats::default();

        let mut queue = WriteQueue::new(WriteErrorPolicy::Stall);
        queue.push(b"abcdef".to_vec());
        queue.push(b"gh".to_vec());
        queue.submit();
        queue.service(&mut port, &state, &tx, &stats);

        assert_eq!(queue.discard(), (2, 5));
        assert_eq!(queue.len(), 0);
    }
}
