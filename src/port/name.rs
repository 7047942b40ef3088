//! Device-name normalization.
//!
//! Windows only accepts `COM1`..`COM9` as bare names; higher-numbered ports
//! must be opened through the `\\.\` device namespace. The rewrite is applied
//! on every platform so that `open()` behaves the same everywhere.

use std::borrow::Cow;

/// Prefix of the Win32 device namespace.
pub const DEVICE_NAMESPACE: &str = r"\\.\";

/// Rewrite `COM<N>` with `N > 9` to `\\.\COM<N>`; return anything else unchanged.
pub fn normalize_port_name(name: &str) -> Cow<'_, str> {
    let needs_namespace = name
        .strip_prefix("COM")
        .and_then(|number| number.parse::<u32>().ok())
        .is_some_and(|number| number > 9);

    if needs_namespace {
        Cow::Owned(format!("{DEVICE_NAMESPACE}{name}"))
    } else {
        Cow::Borrowed(name)
    }
}
