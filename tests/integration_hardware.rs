//! Tests requiring actual serial hardware.
//!
//! These tests are ignored by default.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=COM3                  # or /dev/ttyUSB0 on Linux
//! export TEST_BAUD=9600                  # optional, default: 9600
//! export TEST_LOOPBACK=1                 # if port has TX-RX loopback
//!
//! cargo test --all-features -- --ignored
//! ```

#![cfg(feature = "hardware-tests")]

mod common;

use common::{collect_bytes, next_event};
use serial_duplex::{Notification, PortConfig, PortSession, SessionOptions};
use std::env;
use std::time::Duration;

struct TestPort {
    name: String,
    baud_rate: u32,
    loopback: bool,
}

impl TestPort {
    fn from_env() -> Option<Self> {
        let name = env::var("TEST_PORT").ok()?;
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9600);
        let loopback = env::var("TEST_LOOPBACK").ok().as_deref() == Some("1");
        Some(Self {
            name,
            baud_rate,
            loopback,
        })
    }
}

fn skip_without_hardware() -> Option<TestPort> {
    let port = TestPort::from_env();
    if port.is_none() {
        eprintln!("Skipping: TEST_PORT not set");
    }
    port
}

#[test]
#[ignore = "requires a serial device in TEST_PORT"]
fn test_real_port_open_close() {
    let Some(port) = skip_without_hardware() else {
        return;
    };
    let (session, events) = PortSession::new();

    assert!(session.open(&port.name, PortConfig::new(port.baud_rate)));
    assert!(session.is_open());
    std::thread::sleep(Duration::from_millis(100));
    session.close();

    assert_eq!(next_event(&events), Notification::PortClosed);
}

#[test]
#[ignore = "requires a serial device with TX wired to RX"]
fn test_real_port_loopback() {
    let Some(port) = skip_without_hardware() else {
        return;
    };
    if !port.loopback {
        eprintln!("Skipping: TEST_LOOPBACK not enabled");
        return;
    }

    let options = SessionOptions {
        poll_interval: Duration::from_millis(5),
        ..SessionOptions::default()
    };
    let (session, events) = PortSession::builder().options(options).build();
    assert!(session.open(&port.name, PortConfig::new(port.baud_rate)));

    let payload: Vec<u8> = (0..=255u8).collect();
    session.send(payload.clone());
    assert_eq!(collect_bytes(&events, payload.len()), payload);

    session.close();
}
