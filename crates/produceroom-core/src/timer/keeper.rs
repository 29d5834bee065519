//! Per-item processing timers.
//!
//! The keeper is a wall-clock-based state machine, like a stopwatch per item.
//! It does not use internal threads: every query and command takes the
//! current instant from the caller.
//!
//! ## State Transitions
//!
//! ```text
//! NotStarted --begin--> Running --begin--> Paused --begin--> Running ...
//!      ^                   |                  |
//!      +------cancel/stop--+------------------+
//! ```
//!
//! `begin` is the single transition function for start, pause and resume;
//! the outcome depends only on the state stored for the item:
//!
//! | current state          | after `begin`                     |
//! |------------------------|-----------------------------------|
//! | `NotStarted` (absent)  | `Running { started_at: now }`     |
//! | `Running { start }`    | `Paused { floor(now - start) }`   |
//! | `Paused { acc }`       | `Running { started_at: now - acc }` |

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Timer state for one item. Absence of an entry means `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimerState {
    NotStarted,
    Running { started_at: DateTime<Utc> },
    Paused { accumulated_secs: u64 },
}

impl TimerState {
    pub fn is_running(&self) -> bool {
        matches!(self, TimerState::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, TimerState::Paused { .. })
    }
}

/// What a call to [`TimeKeeper::begin`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    Started,
    Paused { elapsed_secs: u64 },
    Resumed { elapsed_secs: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeKeeper {
    #[serde(default)]
    entries: BTreeMap<String, TimerState>,
}

impl TimeKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self, item_id: &str) -> TimerState {
        self.entries
            .get(item_id)
            .copied()
            .unwrap_or(TimerState::NotStarted)
    }

    pub fn is_tracking(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    /// Whole seconds elapsed for display.
    pub fn elapsed(&self, item_id: &str, now: DateTime<Utc>) -> u64 {
        match self.state(item_id) {
            TimerState::NotStarted => 0,
            TimerState::Running { started_at } => whole_secs_between(started_at, now),
            TimerState::Paused { accumulated_secs } => accumulated_secs,
        }
    }

    /// Elapsed seconds for every tracked item, recomputed from the stored
    /// instants. Drives the once-per-second display refresh.
    pub fn snapshot(&self, now: DateTime<Utc>) -> BTreeMap<String, u64> {
        self.entries
            .keys()
            .map(|id| (id.clone(), self.elapsed(id, now)))
            .collect()
    }

    pub fn tracked_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn begin(&mut self, item_id: &str, now: DateTime<Utc>) -> Transition {
        let (next, transition) = match self.state(item_id) {
            TimerState::NotStarted => (TimerState::Running { started_at: now }, Transition::Started),
            TimerState::Running { started_at } => {
                let elapsed_secs = whole_secs_between(started_at, now);
                (
                    TimerState::Paused {
                        accumulated_secs: elapsed_secs,
                    },
                    Transition::Paused { elapsed_secs },
                )
            }
            TimerState::Paused { accumulated_secs } => (
                TimerState::Running {
                    started_at: now
                        .checked_sub_signed(secs(accumulated_secs))
                        .unwrap_or(now),
                },
                Transition::Resumed {
                    elapsed_secs: accumulated_secs,
                },
            ),
        };
        self.entries.insert(item_id.to_string(), next);
        transition
    }

    /// Drop any state for the item. Returns whether anything was tracked.
    pub fn cancel(&mut self, item_id: &str) -> bool {
        self.entries.remove(item_id).is_some()
    }

    /// Authoritative elapsed time for completion, then clear the entry.
    ///
    /// Running timers are measured to the millisecond from the stored start
    /// instant rather than from the last display tick. Returns `None` when
    /// the item was never started.
    pub fn stop(&mut self, item_id: &str, now: DateTime<Utc>) -> Option<f64> {
        match self.entries.remove(item_id)? {
            TimerState::NotStarted => None,
            TimerState::Running { started_at } => {
                let millis = (now - started_at).num_milliseconds().max(0);
                Some(millis as f64 / 1000.0)
            }
            TimerState::Paused { accumulated_secs } => Some(accumulated_secs as f64),
        }
    }

    /// Forget every timer, e.g. when the day's worklist is cleared.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop timers for ids not present in `keep`.
    pub fn retain_ids<'a>(&mut self, keep: impl IntoIterator<Item = &'a str>) -> usize {
        let keep: std::collections::BTreeSet<&str> = keep.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|id, _| keep.contains(id.as_str()));
        before - self.entries.len()
    }
}

fn whole_secs_between(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - start).num_seconds()).unwrap_or(0)
}

fn secs(n: u64) -> Duration {
    i64::try_from(n)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn start_pause_resume() {
        let mut keeper = TimeKeeper::new();
        assert_eq!(keeper.state("a"), TimerState::NotStarted);

        assert_eq!(keeper.begin("a", t0()), Transition::Started);
        assert!(keeper.state("a").is_running());

        let paused_at = t0() + Duration::seconds(42);
        assert_eq!(
            keeper.begin("a", paused_at),
            Transition::Paused { elapsed_secs: 42 }
        );
        assert!(keeper.state("a").is_paused());

        // Time passing while paused does not count.
        let later = paused_at + Duration::minutes(10);
        assert_eq!(keeper.elapsed("a", later), 42);

        assert_eq!(
            keeper.begin("a", later),
            Transition::Resumed { elapsed_secs: 42 }
        );
        assert_eq!(keeper.elapsed("a", later), 42);
        assert_eq!(keeper.elapsed("a", later + Duration::seconds(8)), 50);
    }

    #[test]
    fn elapsed_floors_partial_seconds() {
        let mut keeper = TimeKeeper::new();
        keeper.begin("a", t0());
        assert_eq!(keeper.elapsed("a", t0() + Duration::milliseconds(2_999)), 2);
    }

    #[test]
    fn elapsed_for_unknown_item_is_zero() {
        let keeper = TimeKeeper::new();
        assert_eq!(keeper.elapsed("nope", t0()), 0);
    }

    #[test]
    fn clock_skew_never_goes_negative() {
        let mut keeper = TimeKeeper::new();
        keeper.begin("a", t0());
        assert_eq!(keeper.elapsed("a", t0() - Duration::seconds(5)), 0);
        assert_eq!(keeper.stop("a", t0() - Duration::seconds(5)), Some(0.0));
    }

    #[test]
    fn cancel_clears_unconditionally() {
        let mut keeper = TimeKeeper::new();
        keeper.begin("a", t0());
        keeper.begin("a", t0() + Duration::seconds(3));
        assert!(keeper.cancel("a"));
        assert!(!keeper.cancel("a"));
        assert_eq!(keeper.state("a"), TimerState::NotStarted);
    }

    #[test]
    fn stop_uses_fresh_subsecond_time() {
        let mut keeper = TimeKeeper::new();
        keeper.begin("a", t0());
        let total = keeper.stop("a", t0() + Duration::milliseconds(5_250)).unwrap();
        assert!((total - 5.25).abs() < 1e-9);
        assert!(!keeper.is_tracking("a"));
        assert_eq!(keeper.stop("a", t0()), None);
    }

    #[test]
    fn stop_while_paused_returns_accumulated() {
        let mut keeper = TimeKeeper::new();
        keeper.begin("a", t0());
        keeper.begin("a", t0() + Duration::seconds(7));
        assert_eq!(keeper.stop("a", t0() + Duration::hours(1)), Some(7.0));
    }

    #[test]
    fn snapshot_covers_running_and_paused() {
        let mut keeper = TimeKeeper::new();
        keeper.begin("run", t0());
        keeper.begin("pause", t0());
        keeper.begin("pause", t0() + Duration::seconds(4));
        let snap = keeper.snapshot(t0() + Duration::seconds(10));
        assert_eq!(snap.get("run"), Some(&10));
        assert_eq!(snap.get("pause"), Some(&4));
    }

    #[test]
    fn retain_ids_drops_orphans() {
        let mut keeper = TimeKeeper::new();
        keeper.begin("a", t0());
        keeper.begin("b", t0());
        assert_eq!(keeper.retain_ids(["a"]), 1);
        assert!(keeper.is_tracking("a"));
        assert!(!keeper.is_tracking("b"));
    }

    #[test]
    fn keeper_survives_json_roundtrip() {
        let mut keeper = TimeKeeper::new();
        keeper.begin("a", t0());
        keeper.begin("b", t0());
        keeper.begin("b", t0() + Duration::seconds(9));
        let json = serde_json::to_string(&keeper).unwrap();
        let back: TimeKeeper = serde_json::from_str(&json).unwrap();
        assert_eq!(back, keeper);
    }
}
