//! Reading the device log back for charts.
//!
//! The log is scanned line by line; records older than the requested
//! window are skipped, as are lines that do not parse.

use std::path::Path;

use chrono::{NaiveDateTime, TimeDelta};
use serde_json::Value;

use crate::datalog::{TIME_FIELD, TIME_FORMAT};
use crate::error::Result;

/// Chart time spans offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartWindow {
    /// Last 24 hours.
    Day,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
}

impl ChartWindow {
    /// Window length in hours.
    #[must_use]
    pub const fn hours(self) -> i64 {
        match self {
            Self::Day => 24,
            Self::Week => 24 * 7,
            Self::Month => 24 * 30,
        }
    }

    /// Window length.
    #[must_use]
    pub fn duration(self) -> TimeDelta {
        TimeDelta::hours(self.hours())
    }
}

/// One named series of a [`History`].
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Device name.
    pub name: String,
    /// One point per timestamp; `None` where the record lacks a number.
    pub points: Vec<Option<f64>>,
}

/// Time-aligned device values read from the log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    /// Record timestamps, in file order.
    pub timestamps: Vec<NaiveDateTime>,
    /// One series per requested device.
    pub series: Vec<Series>,
}

impl History {
    /// Returns true if no record fell inside the window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Collects the values of `names` from records no older than `window`
/// before `now`. A missing log file yields an empty history.
pub async fn read_history(
    path: &Path,
    names: &[String],
    window: TimeDelta,
    now: NaiveDateTime,
) -> Result<History> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut history = History {
        timestamps: Vec::new(),
        series: names
            .iter()
            .map(|name| Series {
                name: name.clone(),
                points: Vec::new(),
            })
            .collect(),
    };

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((time, record)) = parse_line(line) else {
            tracing::warn!("skipping malformed log line {}", index + 1);
            continue;
        };
        if now - time > window {
            continue;
        }

        history.timestamps.push(time);
        for series in &mut history.series {
            series
                .points
                .push(record.get(&series.name).and_then(Value::as_f64));
        }
    }

    Ok(history)
}

fn parse_line(line: &str) -> Option<(NaiveDateTime, Value)> {
    let record: Value = serde_json::from_str(line).ok()?;
    let time = record.get(TIME_FIELD)?.as_str()?;
    let time = NaiveDateTime::parse_from_str(time, TIME_FORMAT).ok()?;
    Some((time, record))
}
