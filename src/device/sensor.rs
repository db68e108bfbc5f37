//! Temperature sensors (DS18B20 on the controller's one-wire bus).

use std::fmt::Write as _;

use crate::commands::Commands;
use crate::device::alarm::Alarm;
use crate::event::Event;
use crate::protocol::Port;
use crate::transport::Transport;

/// Temperature reported before the first successful read.
pub const UNREAD_TEMPERATURE: f64 = -127.0;

/// A temperature sensor with calibration offset and alarms.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSensor {
    name: String,
    port: Port,
    temperature: f64,
    adjustment: f64,
    alarms: Vec<Alarm>,
}

impl TemperatureSensor {
    /// Creates a sensor that has not been read yet.
    #[must_use]
    pub fn new(name: impl Into<String>, port: Port, adjustment: f64, alarms: Vec<Alarm>) -> Self {
        Self {
            name: name.into(),
            port,
            temperature: UNREAD_TEMPERATURE,
            adjustment,
            alarms,
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

    /// Adjusted temperature, or [`UNREAD_TEMPERATURE`].
    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Calibration offset added to raw readings.
    #[must_use]
    pub const fn adjustment(&self) -> f64 {
        self.adjustment
    }

    /// Alarms in configuration order.
    #[must_use]
    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    /// Reads the sensor and evaluates alarms.
    ///
    /// A failed read leaves the temperature and alarms untouched.
    pub async fn poll<T: Transport>(&mut self, commands: &mut Commands<'_, T>) -> Vec<Event> {
        match commands.read_temperature(self.port).await {
            Ok(raw) => self.record(raw),
            Err(e) => {
                tracing::warn!("failed to read sensor {}: {}", self.name, e);
                Vec::new()
            }
        }
    }

    /// Stores a raw reading and returns one event per alarm transition.
    pub fn record(&mut self, raw: f64) -> Vec<Event> {
        let temperature = raw + self.adjustment;
        self.temperature = temperature;
        tracing::debug!("sensor {}: {:.2}", self.name, temperature);

        let name = &self.name;
        self.alarms
            .iter_mut()
            .filter_map(|alarm| {
                alarm
                    .evaluate(temperature)
                    .map(|transition| alarm.event(transition, name, temperature))
            })
            .collect()
    }

    /// Status line, e.g. `"Boiler : 26.5 (alarm >= 25.0)"`.
    #[must_use]
    pub fn describe_state(&self) -> String {
        let mut text = format!("{} : {:.1}", self.name, self.temperature);
        for alarm in self.alarms.iter().filter(|a| a.is_raised()) {
            let _ = write!(
                text,
                " (alarm {} {:.1})",
                alarm.kind().raise_operator(),
                alarm.on()
            );
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::AlarmKind;
    use crate::transport::{Reply, Script, ScriptedTransport};

    fn boiler() -> TemperatureSensor {
        TemperatureSensor::new(
            "Boiler",
            Port::new(2).unwrap(),
            0.5,
            vec![Alarm::new(25.0, 20.0)],
        )
    }

    #[tokio::test]
    async fn test_poll_applies_adjustment() {
        let script = Script::new();
        script.respond(0x62, Reply::line("21.3"));
        let mut link = ScriptedTransport::new(script);
        link.open().await.unwrap();
        let mut sensor = boiler();

        let events = sensor.poll(&mut Commands::new(&mut link)).await;

        assert!(events.is_empty());
        assert!((sensor.temperature() - 21.8).abs() < 1e-9);
        assert_eq!(sensor.describe_state(), "Boiler : 21.8");
    }

    #[tokio::test]
    async fn test_failed_read_keeps_sentinel() {
        let script = Script::new();
        script.respond(0x62, Reply::line("garbage"));
        let mut link = ScriptedTransport::new(script);
        link.open().await.unwrap();
        let mut sensor = boiler();

        assert!(sensor.poll(&mut Commands::new(&mut link)).await.is_empty());
        assert!((sensor.temperature() - UNREAD_TEMPERATURE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_alarm_scenario() {
        let mut sensor = boiler();

        assert!(sensor.record(19.0).is_empty());

        let raised = sensor.record(26.0);
        assert_eq!(
            raised,
            vec![Event::AlarmRaised {
                device: "Boiler".into(),
                temperature: 26.5,
                threshold: 25.0,
                kind: AlarmKind::Upper,
            }]
        );
        assert_eq!(sensor.describe_state(), "Boiler : 26.5 (alarm >= 25.0)");

        let cleared = sensor.record(19.0);
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].message(), "Boiler back to normal 19.5 <= 20.0");
        assert_eq!(sensor.describe_state(), "Boiler : 19.5");
    }

    #[test]
    fn test_each_alarm_reports_independently() {
        let mut sensor = TemperatureSensor::new(
            "Greenhouse",
            Port::new(1).unwrap(),
            0.0,
            vec![Alarm::new(30.0, 28.0), Alarm::new(5.0, 7.0)],
        );

        assert_eq!(sensor.record(31.0).len(), 1);
        assert_eq!(sensor.record(4.0).len(), 2);
        assert_eq!(
            sensor.describe_state(),
            "Greenhouse : 4.0 (alarm <= 5.0)"
        );
    }
}
