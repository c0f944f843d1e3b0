//! Independent cadences for the polling loop.
//!
//! Each cadence remembers when it last ran and how long to wait before the
//! next run. Callers pass the current [`Instant`] in, so the loop can be
//! driven deterministically from tests.

use std::time::{Duration, Instant};

use rand::Rng;

use alertline_core::ScheduleConfig;

/// How the wait before the next run is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalPolicy {
    /// Always the same interval.
    Fixed(Duration),
    /// Uniformly drawn whole seconds in `min..=max`, redrawn after every run.
    Jittered { min: Duration, max: Duration },
}

impl IntervalPolicy {
    /// Draw the next interval.
    pub fn next_interval(&self) -> Duration {
        match *self {
            Self::Fixed(interval) => interval,
            Self::Jittered { min, max } => {
                let (lo, hi) = (min.as_secs(), max.as_secs());
                if lo >= hi {
                    return min;
                }
                Duration::from_secs(rand::rng().random_range(lo..=hi))
            }
        }
    }
}

/// A recurring job's timing state.
#[derive(Debug, Clone)]
pub struct Cadence {
    last_run: Instant,
    interval: Duration,
    policy: IntervalPolicy,
}

impl Cadence {
    /// Cadence whose first run is due `first_delay` after `now`.
    pub fn new(policy: IntervalPolicy, now: Instant, first_delay: Duration) -> Self {
        Self {
            last_run: now,
            interval: first_delay,
            policy,
        }
    }

    /// Chat action polling: fixed interval, first poll on the first tick.
    pub fn for_actions(schedule: &ScheduleConfig, now: Instant) -> Self {
        Self::new(
            IntervalPolicy::Fixed(Duration::from_secs(schedule.action_poll_secs)),
            now,
            Duration::ZERO,
        )
    }

    /// Alert polling: jittered interval after a short initial delay.
    pub fn for_alerts(schedule: &ScheduleConfig, now: Instant) -> Self {
        Self::new(
            IntervalPolicy::Jittered {
                min: Duration::from_secs(schedule.alert_poll_min_secs),
                max: Duration::from_secs(schedule.alert_poll_max_secs),
            },
            now,
            Duration::from_secs(schedule.initial_alert_delay_secs),
        )
    }

    /// True once the current interval has elapsed since the last run.
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_run) >= self.interval
    }

    /// Mark a run finished at `now` and draw the next interval.
    pub fn complete(&mut self, now: Instant) {
        self.last_run = now;
        self.interval = self.policy.next_interval();
    }

    /// Wait currently in effect.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
