//! Controller connection health.
//!
//! Each poll tick classifies the link into one [`LinkOutcome`]; the
//! [`ConnectionMonitor`] maps it straight to a [`ConnectionState`] and
//! reports only actual changes, so a steady link stays quiet.

use std::fmt;

/// Health of the controller link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No poll has completed yet.
    #[default]
    Unknown,
    /// The link is open and the controller answers pings.
    Responding,
    /// The link is open but the controller does not answer.
    ConnectedSilent,
    /// The link cannot be opened.
    Disconnected,
}

impl ConnectionState {
    /// Human-readable description broadcast on transitions.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Unknown => "Controller state unknown",
            Self::Responding => "Controller connected and responding",
            Self::ConnectedSilent => "Controller connected but not responding",
            Self::Disconnected => "Controller not connected",
        }
    }

    /// Returns true if devices can be polled and commanded.
    #[must_use]
    pub const fn is_responding(self) -> bool {
        matches!(self, Self::Responding)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of the open + ping step of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The link could not be opened.
    OpenFailed,
    /// The link opened but the ping failed or timed out.
    PingFailed,
    /// The controller acknowledged the ping.
    PingOk,
}

impl From<LinkOutcome> for ConnectionState {
    fn from(outcome: LinkOutcome) -> Self {
        match outcome {
            LinkOutcome::OpenFailed => Self::Disconnected,
            LinkOutcome::PingFailed => Self::ConnectedSilent,
            LinkOutcome::PingOk => Self::Responding,
        }
    }
}

/// Tracks the current [`ConnectionState`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionMonitor {
    state: ConnectionState,
}

impl ConnectionMonitor {
    /// Creates a monitor in the [`ConnectionState::Unknown`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Records the outcome of a poll tick.
    ///
    /// Returns the new state if it differs from the previous one.
    pub fn observe(&mut self, outcome: LinkOutcome) -> Option<ConnectionState> {
        let next = ConnectionState::from(outcome);
        if next == self.state {
            return None;
        }
        tracing::info!("connection: {} -> {}", self.state.message(), next.message());
        self.state = next;
        Some(next)
    }
}
