//! Shared test utilities for serial-duplex integration tests.
//!
//! This module provides common test infrastructure including:
//! - Session options tuned for fast tests
//! - Sessions wired to mock ports, alone or as a null-modem pair
//! - Helpers for waiting on and collecting notifications

#![allow(dead_code)]

use serial_duplex::{
    MockOpener, MockSerialPort, Notification, PortSession, SessionOptions, WriteErrorPolicy,
};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

/// How long helpers wait before declaring a test stuck.
pub const WAIT: Duration = Duration::from_secs(3);

/// Options with a short poll interval and close timeout.
pub fn fast_options() -> SessionOptions {
    SessionOptions {
        poll_interval: Duration::from_millis(1),
        close_timeout: Duration::from_millis(500),
        ..SessionOptions::default()
    }
}

/// A session whose opener knows a single mock port.
pub struct MockSession {
    pub session: PortSession,
    pub events: Receiver<Notification>,
    pub opener: MockOpener,
    /// Inspection clone of the port the session opens.
    pub port: MockSerialPort,
}

impl MockSession {
    /// Register a mock under `device` and build a session on it.
    pub fn new(device: &str) -> Self {
        Self::with_options(device, fast_options())
    }

    pub fn with_options(device: &str, options: SessionOptions) -> Self {
        let port = MockSerialPort::new(device);
        let opener = MockOpener::new().with_port(device, port.clone());
        let (session, events) = PortSession::builder()
            .opener(opener.clone())
            .options(options)
            .build();
        Self {
            session,
            events,
            opener,
            port,
        }
    }

    pub fn with_policy(device: &str, policy: WriteErrorPolicy) -> Self {
        Self::with_options(
            device,
            SessionOptions {
                write_error_policy: policy,
                ..fast_options()
            },
        )
    }
}

/// Two sessions on opposite ends of a null-modem cable.
pub struct LoopbackPair {
    pub a: PortSession,
    pub a_events: Receiver<Notification>,
    pub b: PortSession,
    pub b_events: Receiver<Notification>,
    pub a_port: MockSerialPort,
    pub b_port: MockSerialPort,
}

impl LoopbackPair {
    /// Build both sessions; the devices are registered as "MOCK-A" and "MOCK-B".
    pub fn new(options: SessionOptions) -> Self {
        let (a_port, b_port) = MockSerialPort::pair("MOCK-A", "MOCK-B");
        let opener = MockOpener::new()
            .with_port("MOCK-A", a_port.clone())
            .with_port("MOCK-B", b_port.clone());

        let (a, a_events) = PortSession::builder()
            .opener(opener.clone())
            .options(options)
            .build();
        let (b, b_events) = PortSession::builder()
            .opener(opener)
            .options(options)
            .build();

        Self {
            a,
            a_events,
            b,
            b_events,
            a_port,
            b_port,
        }
    }
}

/// Poll `condition` until it holds or [`WAIT`] elapses.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Concatenate `DataReceived` payloads until `expected` bytes arrived.
///
/// Panics on any other notification or when [`WAIT`] elapses first.
pub fn collect_bytes(events: &Receiver<Notification>, expected: usize) -> Vec<u8> {
    let deadline = Instant::now() + WAIT;
    let mut received = Vec::with_capacity(expected);
    while received.len() < expected {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(Notification::DataReceived(chunk)) => received.extend(chunk),
            Ok(other) => panic!("unexpected notification while collecting data: {other:?}"),
            Err(_) => panic!(
                "timed out after {} of {} bytes",
                received.len(),
                expected
            ),
        }
    }
    received
}

/// Wait for the next notification.
pub fn next_event(events: &Receiver<Notification>) -> Notification {
    events
        .recv_timeout(WAIT)
        .expect("no notification arrived in time")
}

/// Everything already delivered, without waiting.
pub fn drain(events: &Receiver<Notification>) -> Vec<Notification> {
    events.try_iter().collect()
}
