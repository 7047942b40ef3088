use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Lifecycle of a port session.
///
/// Transitions run strictly `Closed → Opening → Open → Closing → Closed`;
/// a failed open falls back from `Opening` straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PortState {
    #[default]
    Closed = 0,
    Opening = 1,
    Open = 2,
    Closing = 3,
}

impl PortState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Opening,
            2 => Self::Open,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Whether `self → next` is an edge of the lifecycle.
    pub fn can_transition(self, next: PortState) -> bool {
        matches!(
            (self, next),
            (Self::Closed, Self::Opening)
                | (Self::Opening, Self::Open)
                | (Self::Opening, Self::Closed)
                | (Self::Open, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        })
    }
}

/// Atomically observed `PortState`, shared between the owner and the pump.
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn load(&self) -> PortState {
        PortState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn is(&self, state: PortState) -> bool {
        self.load() == state
    }

    /// Move from `from` to `to`, failing with the actual state if the
    /// session was not in `from`.
    pub(crate) fn transition(&self, from: PortState, to: PortState) -> Result<(), PortState> {
        debug_assert!(from.can_transition(to), "illegal transition {from} -> {to}");
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(PortState::from_u8)
    }
}

/// Traffic counters for the current open period.
#[derive(Debug, Default)]
pub(crate) struct SessionStats {
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    chunks_received: AtomicU64,
    writes_queued: AtomicU64,
    writes_completed: AtomicU64,
    writes_dropped: AtomicU64,
    reads_armed: AtomicU64,
    read_active: AtomicBool,
}

impl SessionStats {
    pub(crate) fn reset(&self) {
        self.bytes_received.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.chunks_received.store(0, Ordering::Relaxed);
        self.writes_queued.store(0, Ordering::Relaxed);
        self.writes_completed.store(0, Ordering::Relaxed);
        self.writes_dropped.store(0, Ordering::Relaxed);
        self.reads_armed.store(0, Ordering::Relaxed);
        self.read_active.store(false, Ordering::Relaxed);
    }

    pub(crate) fn record_chunk(&self, len: usize) {
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self, len: usize) {
        self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_queued(&self) {
        self.writes_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_completed(&self) {
        self.writes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_dropped(&self) {
        self.writes_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_armed(&self) {
        self.reads_armed.fetch_add(1, Ordering::Relaxed);
        self.read_active.store(true, Ordering::Relaxed);
    }

    pub(crate) fn record_read_stopped(&self) {
        self.read_active.store(false, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            writes_queued: self.writes_queued.load(Ordering::Relaxed),
            writes_completed: self.writes_completed.load(Ordering::Relaxed),
            writes_dropped: self.writes_dropped.load(Ordering::Relaxed),
            reads_armed: self.reads_armed.load(Ordering::Relaxed),
            read_active: self.read_active.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a session's traffic counters.
///
/// Counters restart at zero on every successful `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub chunks_received: u64,
    /// Outbound buffers accepted by `send`.
    pub writes_queued: u64,
    /// Outbound buffers fully transmitted.
    pub writes_completed: u64,
    /// Outbound buffers skipped after a failed write.
    pub writes_dropped: u64,
    /// Reads issued so far, counting every re-arm.
    pub reads_armed: u64,
    /// Whether the read loop is still running.
    pub read_active: bool,
}

impl StatsSnapshot {
    /// Buffers accepted by `send` that are neither written nor dropped.
    pub fn pending_writes(&self) -> u64 {
        self.writes_queued
            .saturating_sub(self.writes_completed + self.writes_dropped)
    }
}
