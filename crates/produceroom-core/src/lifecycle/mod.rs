//! Item lifecycle controller.
//!
//! [`ItemLifecycle`] is the single owner of the client's view of the day:
//! the mirrored store state, the device-local timers, the timing history and
//! the priority registry. Store changes arrive as discrete [`StoreEvent`]s
//! through [`ItemLifecycle::apply`]; every operator action is a method that
//! writes to the store and returns an [`Event`].
//!
//! ## Item states
//!
//! ```text
//! Queued --start_timer--> Timing(running) <--toggle--> Timing(paused)
//!   ^                        |                            |
//!   |                        +---------complete-----------+--> Completed
//!   +---------------------------------undo---------------------------+
//! ```
//!
//! Store writes that fail are logged and returned as errors. In-memory state
//! already changed is kept; the next snapshot from the store reconciles it.

mod focus;
mod photos;
mod purge;
mod state;
mod worklist;

pub use focus::{FocusRecord, FocusSession};
pub use purge::PurgeReport;
pub use state::AppState;
pub use worklist::{list_data_files, DataFile, DayStatus};

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{LifecycleError, Result, StoreError, ValidationError};
use crate::events::Event;
use crate::item::{CompletedItem, Item, Priority, Sku};
use crate::media::CompletionPhoto;
use crate::priority::PriorityRegistry;
use crate::storage::LocalCache;
use crate::stats::{SkuStats, StatsEngine, TimingEvent};
use crate::store::{self, paths, KvStore, StoreEvent, SubscriptionId};
use crate::timer::{Clock, TimeKeeper, TimerState, Transition};

/// Completed items older than this are purged.
pub const DEFAULT_RETENTION_DAYS: i64 = 10;

/// Top-level paths the controller mirrors.
pub const WATCHED_PATHS: [&str; 8] = [
    paths::ITEMS,
    paths::COMPLETED_ITEMS,
    paths::TIMING_EVENTS,
    paths::HISTORICAL_TIMES,
    paths::HISTORICAL_PRIORITIES,
    paths::PDF_DATE,
    paths::TOTAL_CASES,
    paths::CONNECTED,
];

/// Where an item is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemState {
    Queued,
    Timing { running: bool, elapsed_secs: u64 },
    Completed,
}

pub struct ItemLifecycle {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    state: AppState,
    timers: TimeKeeper,
    stats: StatsEngine,
    priorities: PriorityRegistry,
    focus: Option<FocusSession>,
    retention: Duration,
    cache: Option<Arc<LocalCache>>,
    subscriptions: Vec<SubscriptionId>,
}

impl ItemLifecycle {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            state: AppState::default(),
            timers: TimeKeeper::new(),
            stats: StatsEngine::new(),
            priorities: PriorityRegistry::new(),
            focus: None,
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
            cache: None,
            subscriptions: Vec::new(),
        }
    }

    /// Resume device-local timers saved by an earlier run.
    pub fn with_timers(mut self, timers: TimeKeeper) -> Self {
        self.timers = timers;
        self
    }

    pub fn with_focus(mut self, focus: Option<FocusSession>) -> Self {
        self.focus = focus;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Mirror completion photos into the device cache as they are stored.
    pub fn with_cache(mut self, cache: Arc<LocalCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    // ── Queries ──

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn timers(&self) -> &TimeKeeper {
        &self.timers
    }

    pub fn stats_engine(&self) -> &StatsEngine {
        &self.stats
    }

    pub fn priorities(&self) -> &[Priority] {
        self.priorities.all()
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn item_state(&self, item_id: &str) -> Option<ItemState> {
        if self.state.items.contains_key(item_id) {
            let now = self.now();
            return Some(match self.timers.state(item_id) {
                TimerState::NotStarted => ItemState::Queued,
                state => ItemState::Timing {
                    running: state.is_running(),
                    elapsed_secs: self.timers.elapsed(item_id, now),
                },
            });
        }
        self.state
            .completed
            .contains_key(item_id)
            .then_some(ItemState::Completed)
    }

    /// Whole seconds on the item's timer, for display.
    pub fn elapsed(&self, item_id: &str) -> u64 {
        self.timers.elapsed(item_id, self.now())
    }

    pub fn stats(&self, sku: &Sku) -> Option<SkuStats> {
        self.stats.stats(sku)
    }

    /// Expected seconds to process an active item, from its SKU history.
    pub fn estimate(&self, item_id: &str) -> Option<f64> {
        let item = self.state.items.get(item_id)?;
        self.stats.estimate_secs(&item.sku()?, item.cases)
    }

    // ── Store sync ──

    /// Read every watched path once and apply it.
    pub fn load(&mut self) -> Result<()> {
        for path in WATCHED_PATHS {
            let value = self.store.get(path)?;
            self.apply(StoreEvent {
                path: path.to_string(),
                value,
            });
        }
        tracing::debug!(
            items = self.state.items.len(),
            completed = self.state.completed.len(),
            "state loaded"
        );
        Ok(())
    }

    /// Subscribe to every watched path. Feed the receiver to [`Self::pump`].
    pub fn watch(&mut self) -> Result<Receiver<StoreEvent>> {
        let (tx, rx) = mpsc::channel();
        for path in WATCHED_PATHS {
            let id = self.store.subscribe(path, tx.clone())?;
            self.subscriptions.push(id);
        }
        Ok(rx)
    }

    pub fn unwatch(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.store.unsubscribe(id);
        }
    }

    /// Apply every event waiting on `rx`. Returns how many were applied.
    pub fn pump(&mut self, rx: &Receiver<StoreEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Fold one store snapshot into the local mirror.
    pub fn apply(&mut self, event: StoreEvent) {
        let value = event.value.as_ref();
        match event.path.as_str() {
            paths::TIMING_EVENTS => self.stats.apply_events_snapshot(value),
            paths::HISTORICAL_TIMES => self.stats.apply_averages_snapshot(value),
            paths::HISTORICAL_PRIORITIES => self.priorities.apply_snapshot(value),
            path => {
                if !self.state.apply(path, value) {
                    tracing::trace!(path, "ignoring snapshot for unwatched path");
                    return;
                }
                if path == paths::ITEMS {
                    let dropped = self
                        .timers
                        .retain_ids(self.state.items.keys().map(String::as_str));
                    if dropped > 0 {
                        tracing::debug!(dropped, "timers dropped for items no longer active");
                    }
                }
            }
        }
    }

    // ── Timers ──

    fn active_item(&self, item_id: &str) -> Result<&Item, LifecycleError> {
        self.state
            .items
            .get(item_id)
            .ok_or_else(|| LifecycleError::NotActive(item_id.to_string()))
    }

    /// Queued → Timing.
    pub fn start_timer(&mut self, item_id: &str) -> Result<Event> {
        self.active_item(item_id)?;
        if self.timers.is_tracking(item_id) {
            return Err(LifecycleError::AlreadyTiming { id: item_id.to_string() }.into());
        }
        let now = self.now();
        self.timers.begin(item_id, now);
        tracing::debug!(item_id, "timer started");
        Ok(Event::TimerStarted {
            item_id: item_id.to_string(),
            at: now,
        })
    }

    /// Pause a running timer or resume a paused one.
    pub fn toggle(&mut self, item_id: &str) -> Result<Event> {
        self.active_item(item_id)?;
        if !self.timers.is_tracking(item_id) {
            return Err(LifecycleError::NotTiming { id: item_id.to_string() }.into());
        }
        let now = self.now();
        let item_id_owned = item_id.to_string();
        let event = match self.timers.begin(item_id, now) {
            Transition::Paused { elapsed_secs } => Event::TimerPaused {
                item_id: item_id_owned,
                elapsed_secs,
                at: now,
            },
            Transition::Resumed { elapsed_secs } => Event::TimerResumed {
                item_id: item_id_owned,
                elapsed_secs,
                at: now,
            },
            Transition::Started => Event::TimerStarted {
                item_id: item_id_owned,
                at: now,
            },
        };
        tracing::debug!(item_id, ?event, "timer toggled");
        Ok(event)
    }

    /// Abandon timing without completing the item.
    pub fn cancel_timer(&mut self, item_id: &str) -> Result<Event> {
        if !self.timers.cancel(item_id) {
            return Err(LifecycleError::NotTiming { id: item_id.to_string() }.into());
        }
        Ok(Event::TimerCancelled {
            item_id: item_id.to_string(),
            at: self.now(),
        })
    }

    // ── Completion ──

    /// Move an active item to the completed ledger.
    ///
    /// In order: stop the item's timer and take its authoritative elapsed
    /// time; record a timing event when both a time and a SKU exist; store
    /// the photo under the SKU; write the completed record; remove the active
    /// record. A failed write stops the sequence and is returned.
    pub fn complete(&mut self, item_id: &str, photo: Option<CompletionPhoto>) -> Result<Event> {
        let item = self.active_item(item_id)?.clone();
        if item.cases < 1 {
            return Err(ValidationError::InvalidValue {
                field: "cases".into(),
                message: format!("item {item_id} has no cases"),
            }
            .into());
        }
        let now = self.now();
        let total = self.timers.stop(item_id, now);
        let sku = item.sku();

        let mut timing = None;
        let mut average = None;
        if let (Some(total), Some(sku)) = (total, sku.as_ref()) {
            let event = TimingEvent::new(total, item.cases, now)?;
            let avg = self
                .stats
                .record_event(self.store.as_ref(), sku, event.clone())
                .map_err(|e| logged("record timing event", e))?;
            timing = Some(event);
            average = Some(avg);
        }

        match (photo, sku.as_ref()) {
            (Some(photo), Some(sku)) => {
                store::write(self.store.as_ref(), &paths::completion_photo(sku), &photo)
                    .map_err(|e| logged("store completion photo", e))?;
                self.mirror_photo(sku, &photo);
            }
            (Some(_), None) => tracing::debug!(item_id, "photo dropped: item has no SKU"),
            (None, _) => {}
        }

        let done = CompletedItem {
            item: item.clone(),
            completed_at: now,
        };
        store::write(self.store.as_ref(), &paths::completed_item(item_id), &done)
            .map_err(|e| logged("write completed item", e))?;
        self.state.completed.insert(item_id.to_string(), done);

        self.store
            .remove(&paths::item(item_id))
            .map_err(|e| logged("remove active item", e))?;
        self.state.items.remove(item_id);

        tracing::info!(item_id, sku = ?sku, total_secs = ?total, ?average, "item completed");
        Ok(Event::ItemCompleted {
            item_id: item_id.to_string(),
            sku,
            timing,
            average,
            at: now,
        })
    }

    /// Put a completed item back in the active set. Its timing event stays
    /// in the history.
    pub fn undo(&mut self, item_id: &str) -> Result<Event> {
        let done = self
            .state
            .completed
            .get(item_id)
            .cloned()
            .ok_or_else(|| LifecycleError::NotCompleted(item_id.to_string()))?;
        let item = done.into_item();

        store::write(self.store.as_ref(), &paths::item(item_id), &item)
            .map_err(|e| logged("restore item", e))?;
        self.state.items.insert(item_id.to_string(), item);

        self.store
            .remove(&paths::completed_item(item_id))
            .map_err(|e| logged("remove completed item", e))?;
        self.state.completed.remove(item_id);

        tracing::info!(item_id, "completion undone");
        Ok(Event::ItemRestored {
            item_id: item_id.to_string(),
            at: self.now(),
        })
    }

    // ── History ──

    pub fn delete_timing_event(&mut self, sku: &Sku, index: usize) -> Result<Event> {
        let average = self.stats.delete_event(self.store.as_ref(), sku, index)?;
        Ok(Event::TimingEventDeleted {
            sku: sku.clone(),
            index,
            average,
            at: self.now(),
        })
    }

    // ── Priorities ──

    pub fn add_priority(&mut self, label: Priority) -> Result<Option<Event>> {
        let added = self
            .priorities
            .ensure(self.store.as_ref(), label)
            .map_err(|e| logged("extend priority registry", e))?;
        Ok(added.then(|| Event::PriorityAdded {
            label,
            at: self.now(),
        }))
    }

    pub fn remove_priority(&mut self, label: Priority) -> Result<Option<Event>> {
        let removed = self
            .priorities
            .remove(self.store.as_ref(), label)
            .map_err(|e| logged("shrink priority registry", e))?;
        Ok(removed.then(|| Event::PriorityRemoved {
            label,
            at: self.now(),
        }))
    }
}

impl Drop for ItemLifecycle {
    fn drop(&mut self) {
        self.unwatch();
    }
}

/// Log a failed store write and pass the error on.
fn logged(op: &'static str, err: StoreError) -> StoreError {
    tracing::warn!(op, error = %err, "store write failed");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::timer::ManualClock;
    use chrono::TimeZone;
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, ItemLifecycle) {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                "items/k1",
                json!({"name": "Apples #123", "location": "Dock 2", "cases": 10, "priority": 1}),
            )
            .unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()));
        let mut lc = ItemLifecycle::new(store.clone(), clock.clone());
        lc.load().unwrap();
        (store, clock, lc)
    }

    #[test]
    fn start_rejects_unknown_and_double_start() {
        let (_store, _clock, mut lc) = setup();
        assert!(lc.start_timer("nope").is_err());
        lc.start_timer("k1").unwrap();
        assert!(matches!(
            lc.start_timer("k1"),
            Err(crate::error::CoreError::Lifecycle(LifecycleError::AlreadyTiming { .. }))
        ));
    }

    #[test]
    fn toggle_requires_timing() {
        let (_store, clock, mut lc) = setup();
        assert!(lc.toggle("k1").is_err());
        lc.start_timer("k1").unwrap();
        clock.advance(Duration::seconds(3));
        assert!(matches!(lc.toggle("k1").unwrap(), Event::TimerPaused { elapsed_secs: 3, .. }));
        assert_eq!(
            lc.item_state("k1"),
            Some(ItemState::Timing { running: false, elapsed_secs: 3 })
        );
        clock.advance(Duration::seconds(60));
        assert!(matches!(lc.toggle("k1").unwrap(), Event::TimerResumed { elapsed_secs: 3, .. }));
        assert_eq!(lc.elapsed("k1"), 3);
    }

    #[test]
    fn cancel_returns_item_to_queue() {
        let (_store, _clock, mut lc) = setup();
        assert!(lc.cancel_timer("k1").is_err());
        lc.start_timer("k1").unwrap();
        lc.cancel_timer("k1").unwrap();
        assert_eq!(lc.item_state("k1"), Some(ItemState::Queued));
    }

    #[test]
    fn complete_without_timer_skips_history() {
        let (store, _clock, mut lc) = setup();
        let event = lc.complete("k1", None).unwrap();
        assert!(matches!(event, Event::ItemCompleted { timing: None, .. }));
        assert_eq!(store.get("timingEvents").unwrap(), None);
        assert_eq!(lc.item_state("k1"), Some(ItemState::Completed));
    }

    #[test]
    fn complete_stores_photo_by_sku() {
        let (store, _clock, mut lc) = setup();
        let photo = CompletionPhoto::from_jpeg(b"jpg", lc.now());
        lc.complete("k1", Some(photo.clone())).unwrap();
        let stored: CompletionPhoto = store::read(store.as_ref(), "completionPhotos/123")
            .unwrap()
            .unwrap();
        assert_eq!(stored, photo);
    }

    #[test]
    fn offline_completion_fails_and_keeps_item_active() {
        let (store, clock, mut lc) = setup();
        lc.start_timer("k1").unwrap();
        clock.advance(Duration::seconds(5));
        store.set_connected(false);
        assert!(lc.complete("k1", None).is_err());
        assert!(lc.state().items.contains_key("k1"));
        store.set_connected(true);
        assert!(store.get("completedItems").unwrap().is_none());
    }

    #[test]
    fn watch_applies_remote_changes() {
        let (store, _clock, mut lc) = setup();
        let rx = lc.watch().unwrap();
        lc.pump(&rx);
        store
            .set("items/k2", json!({"name": "Kale #77", "location": "B", "cases": 2}))
            .unwrap();
        assert!(lc.pump(&rx) >= 1);
        assert!(lc.state().items.contains_key("k2"));
        lc.unwatch();
    }

    #[test]
    fn remote_removal_drops_local_timer() {
        let (store, _clock, mut lc) = setup();
        lc.start_timer("k1").unwrap();
        let rx = lc.watch().unwrap();
        store.remove("items/k1").unwrap();
        lc.pump(&rx);
        assert!(!lc.timers().is_tracking("k1"));
    }
}
