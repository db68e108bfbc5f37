//! Periodic polling and logging.
//!
//! The scheduler is a single cooperative loop. Two [`Ticker`]s compare the
//! clock against their next fire time; a ticker that fires advances by
//! exactly one period, so after a stall the missed ticks are caught up one
//! loop iteration at a time instead of being skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::Config;
use crate::hub::Hub;
use crate::transport::Transport;

/// Pause between loop iterations.
pub const DEFAULT_IDLE: Duration = Duration::from_millis(500);

/// A fixed-period, drift-free timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticker {
    next: Instant,
    period: Duration,
}

impl Ticker {
    /// Creates a ticker whose first fire is one period after `start`.
    #[must_use]
    pub const fn new(start: Instant, period: Duration) -> Self {
        Self {
            next: start,
            period,
        }
    }

    /// Fires if a full period has elapsed since the last fire point, and
    /// advances that point by one period.
    pub fn fire(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.next) >= self.period {
            self.next += self.period;
            true
        } else {
            false
        }
    }

    /// Instant at which the next fire becomes due.
    #[must_use]
    pub fn next_due(&self) -> Instant {
        self.next + self.period
    }

    /// The period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

/// Cooperative stop signal, checked once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Creates an untriggered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every holder to stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`trigger`](Self::trigger) was called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick {
    /// A poll cycle ran.
    pub polled: bool,
    /// A log snapshot was taken.
    pub logged: bool,
}

/// Drives poll and log cycles on a [`Hub`].
pub struct Scheduler<T> {
    hub: Hub<T>,
    poll: Ticker,
    log: Ticker,
    idle: Duration,
    shutdown: ShutdownFlag,
}

impl<T: Transport> Scheduler<T> {
    /// Creates a scheduler whose tickers start now.
    #[must_use]
    pub fn new(
        hub: Hub<T>,
        poll_period: Duration,
        log_period: Duration,
        shutdown: ShutdownFlag,
    ) -> Self {
        let start = Instant::now();
        Self {
            hub,
            poll: Ticker::new(start, poll_period),
            log: Ticker::new(start, log_period),
            idle: DEFAULT_IDLE,
            shutdown,
        }
    }

    /// Creates a scheduler with the periods from `config`.
    #[must_use]
    pub fn from_config(hub: Hub<T>, config: &Config, shutdown: ShutdownFlag) -> Self {
        Self::new(hub, config.poll_interval(), config.log_interval(), shutdown)
    }

    /// Sets the pause between iterations.
    #[must_use]
    pub const fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// The poll ticker.
    #[must_use]
    pub const fn poll_ticker(&self) -> &Ticker {
        &self.poll
    }

    /// The log ticker.
    #[must_use]
    pub const fn log_ticker(&self) -> &Ticker {
        &self.log
    }

    /// Runs one loop iteration without the idle pause.
    pub async fn tick(&mut self) -> Tick {
        let polled = self.poll.fire(Instant::now());
        if polled {
            let state = self.hub.poll_cycle().await;
            tracing::trace!("poll cycle done: {}", state);
        }

        let logged = self.log.fire(Instant::now());
        if logged {
            if let Err(e) = self.hub.log_cycle().await {
                tracing::error!("failed to write device log: {}", e);
            }
        }

        Tick { polled, logged }
    }

    /// Loops until the shutdown flag is triggered.
    pub async fn run(mut self) {
        tracing::info!(
            "scheduler started: poll every {:?}, log every {:?}",
            self.poll.period(),
            self.log.period()
        );
        while !self.shutdown.is_triggered() {
            self.tick().await;
            tokio::time::sleep(self.idle).await;
        }
        tracing::info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(5);

    #[test]
    fn test_does_not_fire_early() {
        let start = Instant::now();
        let mut ticker = Ticker::new(start, PERIOD);
        assert!(!ticker.fire(start));
        assert!(!ticker.fire(start + Duration::from_millis(4_999)));
        assert!(ticker.fire(start + PERIOD));
        assert_eq!(ticker.next_due(), start + 2 * PERIOD);
    }

    #[test]
    fn test_catches_up_one_period_per_call() {
        let start = Instant::now();
        let mut ticker = Ticker::new(start, PERIOD);
        let now = start + Duration::from_secs(23);

        let mut fires = 0;
        let mut previous = ticker.next_due();
        while ticker.fire(now) {
            fires += 1;
            assert_eq!(ticker.next_due(), previous + PERIOD);
            previous = ticker.next_due();
        }

        assert_eq!(fires, 4);
        // first start + k * period strictly after `now`
        assert_eq!(ticker.next_due(), start + Duration::from_secs(25));
    }

    #[test]
    fn test_catch_up_ending_on_a_grid_point() {
        let start = Instant::now();
        let mut ticker = Ticker::new(start, PERIOD);
        let now = start + Duration::from_secs(25);

        let mut fires = 0;
        while ticker.fire(now) {
            fires += 1;
        }

        // the tick due exactly at `now` fires, so the next one is a period later
        assert_eq!(fires, 5);
        assert_eq!(ticker.next_due(), start + Duration::from_secs(30));
    }

    #[test]
    fn test_fire_points_stay_on_the_grid() {
        let start = Instant::now();
        let mut ticker = Ticker::new(start, PERIOD);
        // late by 1.7s: the next fire stays on the start + k * period grid
        assert!(ticker.fire(start + Duration::from_millis(6_700)));
        assert_eq!(ticker.next_due(), start + Duration::from_secs(10));
    }

    #[test]
    fn test_shutdown_flag_is_shared() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_triggered());
        flag.trigger();
        assert!(clone.is_triggered());
    }
}
