//! Periodic background chores.
//!
//! Like the timers, housekeeping has no threads of its own. The host loop
//! calls [`Housekeeping::poll`] at its own tick rate and runs whatever chores
//! come back due.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-interval task tracked against wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
}

impl Cadence {
    /// A cadence that is due on its first poll.
    pub fn immediate(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    /// A cadence whose first run is one interval after `start`.
    pub fn starting_at(interval: Duration, start: DateTime<Utc>) -> Self {
        Self {
            interval,
            last_run: Some(start),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now - last >= self.interval,
        }
    }

    /// Returns true and records the run when due.
    pub fn fire(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_due(now) {
            self.last_run = Some(now);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chore {
    /// Recompute elapsed times of every running or paused timer.
    RefreshDisplay,
    /// Advance the focused processing stopwatch.
    FocusTick,
    /// Delete completed items past the retention window.
    PurgeStale,
}

/// The three independent periodic tasks.
///
/// Only `PurgeStale` mutates state; the others are display refreshes. None
/// of them needs mutual exclusion with another.
#[derive(Debug, Clone)]
pub struct Housekeeping {
    display: Cadence,
    focus: Cadence,
    purge: Cadence,
}

impl Housekeeping {
    pub fn new(display: Duration, focus_tick: Duration, purge: Duration) -> Self {
        Self {
            display: Cadence::immediate(display),
            focus: Cadence::immediate(focus_tick),
            // The purge also runs once at startup.
            purge: Cadence::immediate(purge),
        }
    }

    /// Chores due at `now`, in a stable order. `focus_active` gates the
    /// focus tick, which only runs while a processing stopwatch is live.
    pub fn poll(&mut self, now: DateTime<Utc>, focus_active: bool) -> Vec<Chore> {
        let mut due = Vec::new();
        if self.purge.fire(now) {
            due.push(Chore::PurgeStale);
        }
        if self.display.fire(now) {
            due.push(Chore::RefreshDisplay);
        }
        if focus_active && self.focus.fire(now) {
            due.push(Chore::FocusTick);
        }
        due
    }
}

impl Default for Housekeeping {
    fn default() -> Self {
        Self::new(
            Duration::seconds(1),
            Duration::milliseconds(100),
            Duration::hours(24),
        )
    }
}
