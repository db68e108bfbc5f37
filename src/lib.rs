//! # telegino
//!
//! Bridges a chat front-end to outputs and temperature sensors attached to
//! a microcontroller on a serial link.
//!
//! The library polls the controller on a fixed period, tracks whether it is
//! reachable, evaluates temperature alarms and appends device values to a
//! JSON-lines log. Chat delivery is left to a [`NotificationSink`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use telegino::{DeviceLog, Hub, Scheduler, SerialTransport, ShutdownFlag};
//!
//! #[tokio::main]
//! async fn main() {
//!     let link = SerialTransport::with_port("/dev/ttyUSB0");
//!     let hub = Hub::new(link, Vec::new(), DeviceLog::new("devices.log"));
//!
//!     let shutdown = ShutdownFlag::new();
//!     let scheduler = Scheduler::new(
//!         hub.clone(),
//!         Duration::from_secs(5),
//!         Duration::from_secs(60),
//!         shutdown.clone(),
//!     );
//!     tokio::spawn(scheduler.run());
//!
//!     println!("{}", hub.describe_all_state().await);
//!     shutdown.trigger();
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`transport`] - Serial link (and an in-memory scripted link)
//! - [`protocol`] - Single-byte request encoding and response decoding
//! - [`commands`] - Request/response exchanges over an open link
//! - [`connection`] - Link health state machine
//! - [`device`] - Outputs, temperature sensors and alarms
//! - [`event`] - Notifications and the sink boundary
//! - [`hub`] - Lock-guarded shared state and critical sections
//! - [`scheduler`] - Periodic poll and log loop
//! - [`datalog`] / [`history`] - Durable device log and reading it back
//! - [`config`] - JSON configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod datalog;
pub mod device;
pub mod error;
pub mod event;
pub mod history;
pub mod hub;
pub mod protocol;
pub mod scheduler;
pub mod transport;

// Re-exports for convenience
pub use commands::Commands;
pub use config::{AlarmConfig, Config, ConfigError, DeviceConfig};
pub use connection::{ConnectionMonitor, ConnectionState, LinkOutcome};
pub use datalog::{DeviceLog, LogRecord, LogValue};
pub use device::{Alarm, AlarmKind, AlarmTransition, Device, Output, TemperatureSensor};
pub use error::{Error, LinkError, ProtocolError, Result};
pub use event::{
    Event, EventDispatcher, NotificationSink, OriginId, Subscription, TracingSink,
    forward_notifications,
};
pub use history::{ChartWindow, History, Series, read_history};
pub use hub::{CommandReply, CommandRequest, Hub};
pub use protocol::{CommandOpcode, Port, Request};
pub use scheduler::{Scheduler, ShutdownFlag, Ticker};
pub use transport::{
    Reply, Script, ScriptedTransport, SerialConfig, SerialTransport, Transport,
    serial::list_ports,
};
