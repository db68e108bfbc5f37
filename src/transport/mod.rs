//! Transport layer for controller communication.
//!
//! A transport owns the half-duplex link to the controller: it opens and
//! closes it, writes request bytes and reads fixed-length or
//! newline-terminated responses under a timeout. It knows nothing about
//! devices and never retries.

pub mod scripted;
pub mod serial;

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::LinkError;

/// Default time to wait for a response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest accepted line response, terminator included.
pub const MAX_LINE_LEN: usize = 64;

/// Result of a link operation.
pub type LinkResult<T> = std::result::Result<T, LinkError>;

/// Trait for transport implementations.
///
/// Implementations close themselves on any I/O failure so that the next
/// [`open`](Transport::open) starts clean. A timeout is not an I/O failure
/// and leaves the link open.
pub trait Transport: Send {
    /// Opens the link. Does nothing if it is already open.
    fn open(&mut self) -> BoxFuture<'_, LinkResult<()>>;

    /// Closes the link.
    fn close(&mut self);

    /// Sends data to the controller.
    fn write(&mut self, data: Bytes) -> BoxFuture<'_, LinkResult<()>>;

    /// Reads exactly `len` bytes, failing with
    /// [`LinkError::Timeout`] if they do not arrive within `timeout`.
    fn read(&mut self, len: usize, timeout: Duration) -> BoxFuture<'_, LinkResult<Bytes>>;

    /// Reads up to and including the next `\n`.
    fn read_line(&mut self, timeout: Duration) -> BoxFuture<'_, LinkResult<Bytes>>;

    /// Returns true if the link is open.
    fn is_open(&self) -> bool;
}

/// Converts a timeout to whole milliseconds for error reporting.
pub(crate) fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

pub use scripted::{Reply, Script, ScriptedTransport};
pub use serial::{SerialConfig, SerialTransport};
