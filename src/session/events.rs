//! Notifications delivered from a session to its owner.

use crate::error::{ErrorKind, SessionError};
use serde::Serialize;
use std::sync::mpsc;
use tracing::warn;

/// Something the owner of a session should know about.
///
/// Events from one session arrive in the order the pump observed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum Notification {
    /// A chunk of inbound bytes, copied out of the read buffer.
    DataReceived(Vec<u8>),
    /// A failure anywhere in the session.
    ErrorOccurred { kind: ErrorKind, message: String },
    /// The session finished closing.
    PortClosed,
}

impl Notification {
    pub fn error(err: &SessionError) -> Self {
        Self::ErrorOccurred {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Receiver of session notifications.
///
/// `notify` is called from the pump thread as well as from whichever thread
/// calls `open`/`close`/`send`, so implementations must be thread-safe and
/// should not block.
pub trait EventSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl EventSink for mpsc::Sender<Notification> {
    fn notify(&self, notification: Notification) {
        // A dropped receiver means nobody is listening anymore
        let _ = self.send(notification);
    }
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        let _ = self.send(notification);
    }
}

/// Log `err` and deliver it to `sink` as `ErrorOccurred`.
pub(crate) fn report(sink: &dyn EventSink, port: &str, err: SessionError) {
    warn!(port, kind = ?err.kind(), "{}", err);
    sink.notify(Notification::error(&err));
}
