//! Append-only device log.
//!
//! One JSON object per line: `time` first, then one field per device in
//! registration order.
//!
//! ```text
//! {"time":"2024/03/01 12:00:00","Pump":true,"Boiler":21.8}
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tokio::io::AsyncWriteExt;

use crate::device::Device;
use crate::error::Result;

/// Timestamp format of the `time` field.
pub const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Name of the timestamp field.
pub const TIME_FIELD: &str = "time";

/// A logged device value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogValue {
    /// Output state.
    Bool(bool),
    /// Sensor reading.
    Number(f64),
}

/// One line of the device log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Local wall-clock time of the snapshot.
    pub time: NaiveDateTime,
    /// Device name and value, in registration order.
    pub values: Vec<(String, LogValue)>,
}

impl LogRecord {
    /// Captures the loggable value of every device.
    pub fn snapshot<'a>(time: NaiveDateTime, devices: impl IntoIterator<Item = &'a Device>) -> Self {
        Self {
            time,
            values: devices
                .into_iter()
                .map(|d| (d.name().to_owned(), d.loggable_value()))
                .collect(),
        }
    }

    /// Looks up a device's value.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<LogValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry(TIME_FIELD, &self.time.format(TIME_FORMAT).to_string())?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Append-only log file.
#[derive(Debug, Clone)]
pub struct DeviceLog {
    path: PathBuf,
}

impl DeviceLog {
    /// Creates a log writing to `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a JSON line.
    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::device::{Output, TemperatureSensor};
    use crate::protocol::Port;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn devices() -> Vec<Device> {
        let mut sensor = TemperatureSensor::new("Boiler", Port::new(2).unwrap(), 0.5, Vec::new());
        sensor.record(21.3);
        vec![
            Device::Output(Output::new("Pump", Port::new(3).unwrap())),
            Device::TemperatureSensor(sensor),
            Device::Output(Output::new("Fan", Port::new(4).unwrap())),
        ]
    }

    #[test]
    fn test_record_serializes_in_registration_order() {
        let mut devices = devices();
        devices.swap(0, 2);
        let record = LogRecord::snapshot(noon(), &devices);
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(
            line,
            r#"{"time":"2024/03/01 12:00:00","Fan":false,"Boiler":21.8,"Pump":false}"#
        );
    }

    #[test]
    fn test_value_lookup() {
        let record = LogRecord::snapshot(noon(), &devices());
        assert_eq!(record.value("Pump"), Some(LogValue::Bool(false)));
        assert_eq!(record.value("Heater"), None);
    }

    #[tokio::test]
    async fn test_append_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = DeviceLog::new(dir.path().join("devices.log"));
        let record = LogRecord::snapshot(noon(), &devices());

        log.append(&record).await.unwrap();
        log.append(&record).await.unwrap();

        let content = tokio::fs::read_to_string(log.path()).await.unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(content.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed["time"], "2024/03/01 12:00:00");
        assert_eq!(parsed["Pump"], false);
    }
}
