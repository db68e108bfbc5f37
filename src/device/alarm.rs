//! Hysteresis alarms on temperature readings.

use crate::event::Event;

/// Direction of an alarm, implied by its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmKind {
    /// `on > off`: raises at or above `on`, clears at or below `off`.
    Upper,
    /// `on < off`: raises at or below `on`, clears at or above `off`.
    Lower,
    /// `on == off`: never raises.
    Inert,
}

impl AlarmKind {
    /// Classifies a pair of thresholds.
    #[must_use]
    pub fn of(on: f64, off: f64) -> Self {
        if on > off {
            Self::Upper
        } else if on < off {
            Self::Lower
        } else {
            Self::Inert
        }
    }

    /// Comparison that raises the alarm, as shown to users.
    #[must_use]
    pub const fn raise_operator(self) -> &'static str {
        match self {
            Self::Upper => ">=",
            Self::Lower => "<=",
            Self::Inert => "==",
        }
    }

    /// Comparison that clears the alarm, as shown to users.
    #[must_use]
    pub const fn clear_operator(self) -> &'static str {
        match self {
            Self::Upper => "<=",
            Self::Lower => ">=",
            Self::Inert => "==",
        }
    }
}

/// A change of an alarm's raised flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmTransition {
    /// The alarm went from clear to raised.
    Raised,
    /// The alarm went from raised to clear.
    Cleared,
}

/// A two-threshold alarm with hysteresis.
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    on: f64,
    off: f64,
    raised: bool,
}

impl Alarm {
    /// Creates a clear alarm.
    #[must_use]
    pub const fn new(on: f64, off: f64) -> Self {
        Self {
            on,
            off,
            raised: false,
        }
    }

    /// Trigger threshold.
    #[must_use]
    pub const fn on(&self) -> f64 {
        self.on
    }

    /// Release threshold.
    #[must_use]
    pub const fn off(&self) -> f64 {
        self.off
    }

    /// Returns true while the alarm is raised.
    #[must_use]
    pub const fn is_raised(&self) -> bool {
        self.raised
    }

    /// Returns the alarm direction.
    #[must_use]
    pub fn kind(&self) -> AlarmKind {
        AlarmKind::of(self.on, self.off)
    }

    /// Feeds a temperature. Returns the transition it caused, if any.
    pub fn evaluate(&mut self, temperature: f64) -> Option<AlarmTransition> {
        let (trigger, release) = match self.kind() {
            AlarmKind::Upper => (temperature >= self.on, temperature <= self.off),
            AlarmKind::Lower => (temperature <= self.on, temperature >= self.off),
            AlarmKind::Inert => return None,
        };

        if !self.raised && trigger {
            self.raised = true;
            Some(AlarmTransition::Raised)
        } else if self.raised && release {
            self.raised = false;
            Some(AlarmTransition::Cleared)
        } else {
            None
        }
    }

    /// Builds the notification for a transition of this alarm.
    #[must_use]
    pub fn event(&self, transition: AlarmTransition, device: &str, temperature: f64) -> Event {
        let device = device.to_owned();
        let kind = self.kind();
        match transition {
            AlarmTransition::Raised => Event::AlarmRaised {
                device,
                temperature,
                threshold: self.on,
                kind,
            },
            AlarmTransition::Cleared => Event::AlarmCleared {
                device,
                temperature,
                threshold: self.off,
                kind,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transitions(alarm: &mut Alarm, readings: &[f64]) -> Vec<AlarmTransition> {
        readings
            .iter()
            .filter_map(|&t| alarm.evaluate(t))
            .collect()
    }

    #[test]
    fn test_kind_from_thresholds() {
        assert_eq!(AlarmKind::of(25.0, 20.0), AlarmKind::Upper);
        assert_eq!(AlarmKind::of(5.0, 8.0), AlarmKind::Lower);
        assert_eq!(AlarmKind::of(5.0, 5.0), AlarmKind::Inert);
    }

    #[test]
    fn test_upper_alarm_raises_and_clears_once() {
        let mut alarm = Alarm::new(25.0, 20.0);
        let readings = [
            19.0, 22.0, 25.0, 30.0, 24.0, 21.0, 22.5, 23.0, 20.0, 19.0, 18.0,
        ];
        assert_eq!(
            transitions(&mut alarm, &readings),
            vec![AlarmTransition::Raised, AlarmTransition::Cleared]
        );
        assert!(!alarm.is_raised());
    }

    #[test]
    fn test_lower_alarm_raises_and_clears_once() {
        let mut alarm = Alarm::new(5.0, 8.0);
        let readings = [10.0, 6.0, 5.0, 2.0, 6.0, 7.9, 4.0, 8.0, 12.0];
        assert_eq!(
            transitions(&mut alarm, &readings),
            vec![AlarmTransition::Raised, AlarmTransition::Cleared]
        );
    }

    #[test]
    fn test_steady_temperature_is_idempotent() {
        let mut alarm = Alarm::new(25.0, 20.0);
        assert_eq!(alarm.evaluate(26.0), Some(AlarmTransition::Raised));
        for _ in 0..50 {
            assert_eq!(alarm.evaluate(26.0), None);
        }
        assert!(alarm.is_raised());
    }

    #[test]
    fn test_inert_alarm_never_raises() {
        let mut alarm = Alarm::new(20.0, 20.0);
        assert!(transitions(&mut alarm, &[-50.0, 20.0, 100.0]).is_empty());
    }

    #[test]
    fn test_event_uses_matching_threshold() {
        let alarm = Alarm::new(25.0, 20.0);
        assert_eq!(
            alarm.event(AlarmTransition::Cleared, "Boiler", 19.5),
            Event::AlarmCleared {
                device: "Boiler".into(),
                temperature: 19.5,
                threshold: 20.0,
                kind: AlarmKind::Upper,
            }
        );
    }
}
