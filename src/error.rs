//! Error types for the telegino library.

use thiserror::Error;

/// The main error type for telegino operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial link failure (open, read, write, timeout).
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// Malformed response from the controller.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error outside the serial link (durable log, history).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The notification sink could not deliver a message.
    #[error("notification failed: {message}")]
    Notification { message: String },
}

/// Serial link errors.
///
/// All of these are recoverable: the scheduler classifies them into a
/// connection state and retries on the next poll tick.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Serial port error (open, configuration).
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Response did not arrive in time.
    #[error("timed out after {timeout_ms}ms: expected {expected} bytes, got {got}")]
    Timeout {
        timeout_ms: u64,
        expected: usize,
        got: usize,
    },

    /// Link is not open.
    #[error("not connected")]
    NotConnected,

    /// A line response exceeded the maximum length.
    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },
}

impl LinkError {
    /// Returns true if this is a response timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Protocol-specific errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Temperature line could not be parsed.
    #[error("malformed temperature response: {line:?}")]
    MalformedTemperature { line: String },

    /// Response was empty.
    #[error("empty response")]
    EmptyResponse,

    /// Port index outside the 0-7 range addressable by the wire nibble.
    #[error("invalid port {0}: must be 0-7")]
    InvalidPort(u8),
}

/// Result type alias for telegino operations.
pub type Result<T> = std::result::Result<T, Error>;
