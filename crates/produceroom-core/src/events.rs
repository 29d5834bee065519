use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{Priority, Sku};
use crate::stats::TimingEvent;

/// Every state change made through the lifecycle produces an Event.
/// The CLI prints them; a UI would render from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        item_id: String,
        at: DateTime<Utc>,
    },
    TimerPaused {
        item_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        item_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// Timing abandoned without completing the item.
    TimerCancelled {
        item_id: String,
        at: DateTime<Utc>,
    },
    ItemAdded {
        item_id: String,
        name: String,
        at: DateTime<Utc>,
    },
    /// Item moved to the completed ledger. `timing` is absent when the item
    /// was never timed or carries no SKU.
    ItemCompleted {
        item_id: String,
        sku: Option<Sku>,
        timing: Option<TimingEvent>,
        average: Option<f64>,
        at: DateTime<Utc>,
    },
    /// Completion undone; the timing event stays in the history.
    ItemRestored {
        item_id: String,
        at: DateTime<Utc>,
    },
    ItemUpdated {
        item_id: String,
        field: String,
        at: DateTime<Utc>,
    },
    CompletionPhotoDeleted {
        sku: Sku,
        at: DateTime<Utc>,
    },
    CompletedPurged {
        removed: usize,
        at: DateTime<Utc>,
    },
    TimingEventDeleted {
        sku: Sku,
        index: usize,
        average: Option<f64>,
        at: DateTime<Utc>,
    },
    WorklistLoaded {
        items: usize,
        total_cases: u64,
        date: Option<NaiveDate>,
        at: DateTime<Utc>,
    },
    PriorityAdded {
        label: Priority,
        at: DateTime<Utc>,
    },
    PriorityRemoved {
        label: Priority,
        at: DateTime<Utc>,
    },
    FocusStarted {
        item_id: String,
        at: DateTime<Utc>,
    },
    FocusEnded {
        item_id: String,
        duration_secs: f64,
        at: DateTime<Utc>,
    },
}
