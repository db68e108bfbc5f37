//! Digital outputs (relays, switches).

use crate::commands::Commands;
use crate::protocol::Port;
use crate::transport::Transport;

/// A digital output on the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    name: String,
    port: Port,
    state: bool,
}

impl Output {
    /// Creates an output assumed off until the first poll.
    #[must_use]
    pub fn new(name: impl Into<String>, port: Port) -> Self {
        Self {
            name: name.into(),
            port,
            state: false,
        }
    }

    /// Device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Controller port.
    #[must_use]
    pub const fn port(&self) -> Port {
        self.port
    }

    /// Last known hardware state.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.state
    }

    /// Command text that switches this output on.
    #[must_use]
    pub fn on_command(&self) -> String {
        format!("turn on {}", self.name)
    }

    /// Command text that switches this output off.
    #[must_use]
    pub fn off_command(&self) -> String {
        format!("turn off {}", self.name)
    }

    /// Refreshes the state from hardware. A failed read keeps the old state.
    pub async fn poll<T: Transport>(&mut self, commands: &mut Commands<'_, T>) {
        match commands.read_output(self.port).await {
            Ok(state) => self.state = state,
            Err(e) => tracing::warn!("failed to poll output {}: {}", self.name, e),
        }
    }

    /// Applies `text` if it is one of this output's commands.
    ///
    /// The local state is updated before the write and the command counts
    /// as accepted whatever the controller answers; a missing ack is only
    /// logged. The next poll reconciles the state with the hardware.
    pub async fn handle_command<T: Transport>(
        &mut self,
        commands: &mut Commands<'_, T>,
        text: &str,
    ) -> bool {
        let on = if text == self.on_command() {
            true
        } else if text == self.off_command() {
            false
        } else {
            return false;
        };

        self.state = on;
        match commands.set_output(self.port, on).await {
            Ok(true) => tracing::debug!("output {} set {}", self.name, on),
            Ok(false) => tracing::warn!("output {} write not acknowledged", self.name),
            Err(e) => tracing::warn!("failed to set output {}: {}", self.name, e),
        }
        true
    }

    /// Status line, e.g. `"Pump : on"`.
    #[must_use]
    pub fn describe_state(&self) -> String {
        format!("{} : {}", self.name, if self.state { "on" } else { "off" })
    }

    /// The command that toggles the current state.
    #[must_use]
    pub fn available_commands(&self) -> Vec<String> {
        if self.state {
            vec![self.off_command()]
        } else {
            vec![self.on_command()]
        }
    }
}
