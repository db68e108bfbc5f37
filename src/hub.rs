//! Shared controller state and its critical sections.
//!
//! A [`Hub`] owns the link, the connection monitor and the device registry
//! behind one lock. Every poll cycle, log snapshot and user command runs
//! with the lock held from start to end, so device mutations never
//! interleave and the link has a single writer. Events produced inside a
//! critical section are dispatched after the lock is released.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::Mutex;

use crate::commands::Commands;
use crate::config::Config;
use crate::connection::{ConnectionMonitor, ConnectionState, LinkOutcome};
use crate::datalog::{DeviceLog, LogRecord};
use crate::device::Device;
use crate::error::Result;
use crate::event::{Event, EventDispatcher, OriginId, Subscription};
use crate::transport::{DEFAULT_RESPONSE_TIMEOUT, Transport};

/// Capacity of the notification channel.
const EVENT_CAPACITY: usize = 256;

/// A command typed by a chat user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Display name of the user, used in the broadcast.
    pub author: String,
    /// Command text, e.g. `"turn on Pump"`.
    pub text: String,
    /// Chat the command came from; it is left out of the broadcast.
    pub origin: Option<OriginId>,
}

/// Outcome of a [`CommandRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    /// A device accepted the command; carries its new status line.
    Applied { state: String },
    /// No device knows the command.
    Unknown,
    /// The controller is not responding; carries the connection message.
    Unavailable { message: String },
}

struct State<T> {
    link: T,
    connection: ConnectionMonitor,
    devices: Vec<Device>,
}

/// Handle to the shared controller state.
pub struct Hub<T> {
    state: Arc<Mutex<State<T>>>,
    dispatcher: EventDispatcher,
    log: DeviceLog,
    response_timeout: Duration,
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            dispatcher: self.dispatcher.clone(),
            log: self.log.clone(),
            response_timeout: self.response_timeout,
        }
    }
}

impl<T: Transport> Hub<T> {
    /// Creates a hub over `link` with devices in registration order.
    #[must_use]
    pub fn new(link: T, devices: Vec<Device>, log: DeviceLog) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                link,
                connection: ConnectionMonitor::new(),
                devices,
            })),
            dispatcher: EventDispatcher::new(EVENT_CAPACITY),
            log,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Creates a hub with the devices, log path and timeout from `config`.
    #[must_use]
    pub fn from_config(link: T, config: &Config) -> Self {
        let devices = config.devices.iter().map(Device::from_config).collect();
        Self::new(link, devices, DeviceLog::new(config.log_path.clone()))
            .with_response_timeout(config.response_timeout())
    }

    /// Sets the per-response timeout.
    #[must_use]
    pub const fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Subscribes to notifications.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    /// The dispatcher notifications go through.
    #[must_use]
    pub const fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// The durable device log.
    #[must_use]
    pub const fn log(&self) -> &DeviceLog {
        &self.log
    }

    /// Current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection.state()
    }

    /// Snapshot of every device.
    pub async fn devices(&self) -> Vec<Device> {
        self.state.lock().await.devices.clone()
    }

    /// Runs one poll cycle and returns the resulting connection state.
    ///
    /// Opens the link if needed, pings the controller and, only if it
    /// answers, polls every device in registration order.
    pub async fn poll_cycle(&self) -> ConnectionState {
        let (connection, events) = {
            let mut guard = self.state.lock().await;
            let State {
                link,
                connection,
                devices,
            } = &mut *guard;

            let outcome = match link.open().await {
                Err(e) => {
                    tracing::debug!("link open failed: {}", e);
                    LinkOutcome::OpenFailed
                }
                Ok(()) => match Commands::new(link)
                    .with_timeout(self.response_timeout)
                    .ping()
                    .await
                {
                    Ok(true) => LinkOutcome::PingOk,
                    Ok(false) => {
                        tracing::debug!("ping not acknowledged");
                        LinkOutcome::PingFailed
                    }
                    Err(e) => {
                        tracing::debug!("ping failed: {}", e);
                        LinkOutcome::PingFailed
                    }
                },
            };

            let mut events = Vec::new();
            if let Some(state) = connection.observe(outcome) {
                events.push(Event::ConnectionChanged(state));
            }

            if outcome == LinkOutcome::PingOk {
                let mut commands = Commands::new(link).with_timeout(self.response_timeout);
                for device in devices.iter_mut() {
                    events.extend(device.poll(&mut commands).await);
                }
            }

            (connection.state(), events)
        };

        self.dispatcher.dispatch_all(events);
        connection
    }

    /// Appends a snapshot of every device to the log, whatever the
    /// connection state.
    pub async fn log_cycle(&self) -> Result<LogRecord> {
        let state = self.state.lock().await;
        let record = LogRecord::snapshot(Local::now().naive_local(), &state.devices);
        self.log.append(&record).await?;
        tracing::debug!("logged {} device values", record.values.len());
        Ok(record)
    }

    /// Offers `text` to each device in order. Returns true once one
    /// accepts it.
    pub async fn handle_command(&self, text: &str) -> bool {
        let mut guard = self.state.lock().await;
        self.apply_command(&mut guard, text).await.is_some()
    }

    /// Chat command flow: refuses while the controller is not responding,
    /// applies the command, and broadcasts it to the other chats.
    pub async fn submit(&self, request: CommandRequest) -> CommandReply {
        let reply = {
            let mut guard = self.state.lock().await;
            let connection = guard.connection.state();
            if !connection.is_responding() {
                return CommandReply::Unavailable {
                    message: connection.message().to_owned(),
                };
            }
            match self.apply_command(&mut guard, &request.text).await {
                Some(state) => CommandReply::Applied { state },
                None => CommandReply::Unknown,
            }
        };

        if matches!(reply, CommandReply::Applied { .. }) {
            tracing::info!("{} applied {:?}", request.author, request.text);
            self.dispatcher.dispatch(Event::CommandApplied {
                author: request.author,
                command: request.text,
                origin: request.origin,
            });
        }
        reply
    }

    /// Returns the status line of the device that accepted `text`.
    async fn apply_command(&self, state: &mut State<T>, text: &str) -> Option<String> {
        let State { link, devices, .. } = state;
        let mut commands = Commands::new(link).with_timeout(self.response_timeout);
        for device in devices.iter_mut() {
            if device.handle_command(&mut commands, text).await {
                return Some(device.describe_state());
            }
        }
        tracing::debug!("no device accepts {:?}", text);
        None
    }

    /// Connection message followed by one status line per device.
    pub async fn describe_all_state(&self) -> String {
        let state = self.state.lock().await;
        std::iter::once(state.connection.state().message().to_owned())
            .chain(state.devices.iter().map(Device::describe_state))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every command currently offered, in registration order.
    pub async fn available_commands(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .devices
            .iter()
            .flat_map(Device::available_commands)
            .collect()
    }

    /// Names of devices whose history can be charted.
    pub async fn chart_devices(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .devices
            .iter()
            .filter(|d| d.supports_chart())
            .map(|d| d.name().to_owned())
            .collect()
    }
}
