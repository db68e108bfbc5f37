//! Devices attached to the controller.
//!
//! [`Device`] is a closed set of variants sharing one capability surface:
//! poll, command handling, status text, keyboard commands, log value and
//! chart support. New hardware types are added as variants.

pub mod alarm;
pub mod output;
pub mod sensor;

pub use alarm::{Alarm, AlarmKind, AlarmTransition};
pub use output::Output;
pub use sensor::{TemperatureSensor, UNREAD_TEMPERATURE};

use crate::commands::Commands;
use crate::config::DeviceConfig;
use crate::datalog::LogValue;
use crate::event::Event;
use crate::protocol::Port;
use crate::transport::Transport;

/// A device attached to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Device {
    /// Digital output.
    Output(Output),
    /// Temperature sensor.
    TemperatureSensor(TemperatureSensor),
}

impl Device {
    /// Builds a device from its configuration entry.
    #[must_use]
    pub fn from_config(config: &DeviceConfig) -> Self {
        match config {
            DeviceConfig::Output { name, port } => Self::Output(Output::new(name.clone(), *port)),
            DeviceConfig::Sensor {
                name,
                port,
                adjustment,
                alarms,
            } => Self::TemperatureSensor(TemperatureSensor::new(
                name.clone(),
                *port,
                *adjustment,
                alarms.iter().map(|a| Alarm::new(a.on, a.off)).collect(),
            )),
        }
    }

    /// Device name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Output(output) => output.name(),
            Self::TemperatureSensor(sensor) => sensor.name(),
        }
    }

    /// Controller port.
    #[must_use]
    pub const fn port(&self) -> Port {
        match self {
            Self::Output(output) => output.port(),
            Self::TemperatureSensor(sensor) => sensor.port(),
        }
    }

    /// Refreshes state from hardware, returning any notifications.
    ///
    /// I/O failures are logged and leave the previous state in place.
    pub async fn poll<T: Transport>(&mut self, commands: &mut Commands<'_, T>) -> Vec<Event> {
        match self {
            Self::Output(output) => {
                output.poll(commands).await;
                Vec::new()
            }
            Self::TemperatureSensor(sensor) => sensor.poll(commands).await,
        }
    }

    /// Applies a user command. Returns false if this device does not know it.
    pub async fn handle_command<T: Transport>(
        &mut self,
        commands: &mut Commands<'_, T>,
        text: &str,
    ) -> bool {
        match self {
            Self::Output(output) => output.handle_command(commands, text).await,
            Self::TemperatureSensor(_) => false,
        }
    }

    /// One-line status for the user.
    #[must_use]
    pub fn describe_state(&self) -> String {
        match self {
            Self::Output(output) => output.describe_state(),
            Self::TemperatureSensor(sensor) => sensor.describe_state(),
        }
    }

    /// Commands this device currently offers.
    #[must_use]
    pub fn available_commands(&self) -> Vec<String> {
        match self {
            Self::Output(output) => output.available_commands(),
            Self::TemperatureSensor(_) => Vec::new(),
        }
    }

    /// Value written to the durable log.
    #[must_use]
    pub const fn loggable_value(&self) -> LogValue {
        match self {
            Self::Output(output) => LogValue::Bool(output.is_on()),
            Self::TemperatureSensor(sensor) => LogValue::Number(sensor.temperature()),
        }
    }

    /// Returns true if the device's log values can be charted.
    #[must_use]
    pub const fn supports_chart(&self) -> bool {
        matches!(self, Self::TemperatureSensor(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlarmConfig;

    fn port(index: u8) -> Port {
        Port::new(index).unwrap()
    }

    #[test]
    fn test_from_config() {
        let output = Device::from_config(&DeviceConfig::Output {
            name: "Pump".into(),
            port: port(3),
        });
        assert_eq!(output.name(), "Pump");
        assert_eq!(output.port(), port(3));
        assert!(!output.supports_chart());
        assert_eq!(output.loggable_value(), LogValue::Bool(false));
        assert_eq!(output.available_commands(), vec!["turn on Pump"]);

        let sensor = Device::from_config(&DeviceConfig::Sensor {
            name: "Boiler".into(),
            port: port(2),
            adjustment: 0.5,
            alarms: vec![AlarmConfig { on: 25.0, off: 20.0 }],
        });
        assert!(sensor.supports_chart());
        assert!(sensor.available_commands().is_empty());
        assert_eq!(
            sensor.loggable_value(),
            LogValue::Number(UNREAD_TEMPERATURE)
        );
        let Device::TemperatureSensor(inner) = &sensor else {
            panic!("expected a sensor");
        };
        assert_eq!(inner.alarms(), &[Alarm::new(25.0, 20.0)]);
        assert!((inner.adjustment() - 0.5).abs() < f64::EPSILON);
    }
}
