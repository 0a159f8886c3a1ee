//! Adaptive poll pacing: exponential backoff while a remote task sits in a
//! non-terminal state, snapping back to the initial interval near the end.

use std::time::Duration;

use vidgen_core::config::PollerConfig;

/// Upper bound for any poll interval, in seconds.
pub const MAX_INTERVAL_SECS: f64 = 3600.0;

#[derive(Clone, Debug)]
pub struct SmartPoller {
    initial: f64,
    max: f64,
    multiplier: f64,
    current: f64,
    poll_count: u32,
}

impl SmartPoller {
    /// Intervals are in seconds, clamped to `0..=MAX_INTERVAL_SECS`.
    pub fn new(initial: f64, max: f64, multiplier: f64) -> Self {
        let bounded = |secs: f64, floor: f64| {
            if secs.is_nan() {
                floor
            } else {
                secs.clamp(floor, MAX_INTERVAL_SECS)
            }
        };
        let initial = bounded(initial, 0.0);
        Self {
            initial,
            max: bounded(max, initial),
            multiplier: multiplier.max(1.0),
            current: initial,
            poll_count: 0,
        }
    }

    /// Current interval, without advancing.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.current)
            .unwrap_or(Duration::from_secs_f64(MAX_INTERVAL_SECS))
    }

    /// Return the current interval, then back off: `min(current * m, cap)`.
    pub fn advance(&mut self) -> Duration {
        let interval = self.interval();
        self.poll_count += 1;
        self.current = (self.current * self.multiplier).min(self.max);
        interval
    }

    /// Back to the initial interval and a zero poll count.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.poll_count = 0;
    }

    /// Back to the initial interval, keeping the poll count.
    pub fn fast_poll(&mut self) {
        self.current = self.initial;
    }

    pub fn poll_count(&self) -> u32 {
        self.poll_count
    }
}

impl Default for SmartPoller {
    fn default() -> Self {
        Self::from(&PollerConfig::default())
    }
}

impl From<&PollerConfig> for SmartPoller {
    fn from(cfg: &PollerConfig) -> Self {
        Self::new(cfg.initial_interval, cfg.max_interval, cfg.multiplier)
    }
}
