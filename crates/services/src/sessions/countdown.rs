use chrono::{DateTime, Utc};

use exam_core::time::whole_seconds_between;

/// Where a per-question countdown stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// No limit; time spent is measured from the wall clock on `stop`.
    Unlimited,
    Running { remaining: u32 },
    Expired,
}

/// What a single `tick` produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing to report: unlimited, stopped, expired earlier, or disposed.
    Idle,
    Remaining(u32),
    /// The countdown reached zero on this tick. Emitted at most once per start.
    Expired,
}

/// One-second countdown for the question currently on screen.
///
/// The timer is driven by external `tick` calls so the owner controls the
/// cadence; it never spawns anything itself.
#[derive(Debug, Clone)]
pub struct SessionClock {
    limit_secs: u32,
    state: ClockState,
    started_at: DateTime<Utc>,
    stopped_with: Option<u32>,
    disposed: bool,
}

impl SessionClock {
    /// A countdown already started at `now`. A limit of 0 means unlimited.
    #[must_use]
    pub fn started(limit_secs: u32, now: DateTime<Utc>) -> Self {
        let mut countdown = Self {
            limit_secs,
            state: ClockState::Unlimited,
            started_at: now,
            stopped_with: None,
            disposed: false,
        };
        countdown.start(limit_secs, now);
        countdown
    }

    /// Reset for the next question, discarding any previous run.
    pub fn start(&mut self, limit_secs: u32, now: DateTime<Utc>) {
        if self.disposed {
            return;
        }
        self.limit_secs = limit_secs;
        self.started_at = now;
        self.stopped_with = None;
        self.state = if limit_secs == 0 {
            ClockState::Unlimited
        } else {
            ClockState::Running {
                remaining: limit_secs,
            }
        };
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> Tick {
        if self.disposed || self.stopped_with.is_some() {
            return Tick::Idle;
        }
        match self.state {
            ClockState::Running { remaining } => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    self.state = ClockState::Expired;
                    Tick::Expired
                } else {
                    self.state = ClockState::Running { remaining };
                    Tick::Remaining(remaining)
                }
            }
            ClockState::Unlimited | ClockState::Expired => Tick::Idle,
        }
    }

    /// Freeze the countdown and return the whole seconds spent.
    ///
    /// Repeated calls return the first value.
    pub fn stop(&mut self, now: DateTime<Utc>) -> u32 {
        if let Some(elapsed) = self.stopped_with {
            return elapsed;
        }
        let elapsed = match self.state {
            ClockState::Unlimited => whole_seconds_between(self.started_at, now),
            ClockState::Running { remaining } => self.limit_secs - remaining,
            ClockState::Expired => self.limit_secs,
        };
        self.stopped_with = Some(elapsed);
        elapsed
    }

    /// Stop reacting to anything. Irreversible.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    #[must_use]
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Seconds left, or `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        match self.state {
            ClockState::Unlimited => None,
            ClockState::Running { remaining } => Some(remaining),
            ClockState::Expired => Some(0),
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped_with.is_some()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use exam_core::time::fixed_now;

    #[test]
    fn counts_down_and_expires_once() {
        let mut c = SessionClock::started(3, fixed_now());
        assert_eq!(c.remaining(), Some(3));
        assert_eq!(c.tick(), Tick::Remaining(2));
        assert_eq!(c.tick(), Tick::Remaining(1));
        assert_eq!(c.tick(), Tick::Expired);
        assert_eq!(c.state(), ClockState::Expired);
        assert_eq!(c.tick(), Tick::Idle);
        assert_eq!(c.tick(), Tick::Idle);
        assert_eq!(c.stop(fixed_now()), 3);
    }

    #[test]
    fn stop_reports_time_used_and_freezes() {
        let mut c = SessionClock::started(30, fixed_now());
        for _ in 0..4 {
            c.tick();
        }
        assert_eq!(c.stop(fixed_now()), 4);
        assert_eq!(c.tick(), Tick::Idle);
        assert_eq!(c.remaining(), Some(26));
        assert_eq!(c.stop(fixed_now() + Duration::seconds(50)), 4);
    }

    #[test]
    fn unlimited_measures_wall_clock() {
        let start = fixed_now();
        let mut c = SessionClock::started(0, start);
        assert_eq!(c.state(), ClockState::Unlimited);
        assert_eq!(c.remaining(), None);
        assert_eq!(c.tick(), Tick::Idle);
        assert_eq!(c.stop(start + Duration::milliseconds(7_900)), 7);
    }

    #[test]
    fn restart_clears_previous_run() {
        let mut c = SessionClock::started(2, fixed_now());
        c.tick();
        c.tick();
        c.stop(fixed_now());
        c.start(5, fixed_now());
        assert!(!c.is_stopped());
        assert_eq!(c.tick(), Tick::Remaining(4));
    }

    #[test]
    fn disposed_countdown_is_inert() {
        let mut c = SessionClock::started(2, fixed_now());
        c.dispose();
        assert_eq!(c.tick(), Tick::Idle);
        c.start(10, fixed_now());
        assert_eq!(c.remaining(), Some(2));
        assert!(c.is_disposed());
    }
}
