//! Processing focus session: one stopwatch for the item currently being
//! worked on, independent of the per-item timers. Each finished session is
//! appended to `timingData/<item id>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{logged, ItemLifecycle};
use crate::error::{LifecycleError, Result};
use crate::events::Event;
use crate::store::{self, paths, tree};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub item_id: String,
    pub started_at: DateTime<Utc>,
}

impl FocusSession {
    /// Seconds since the session began, millisecond precision.
    pub fn elapsed(&self, now: DateTime<Utc>) -> f64 {
        (now - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusRecord {
    pub duration: f64,
    pub timestamp: DateTime<Utc>,
}

impl ItemLifecycle {
    pub fn focus(&self) -> Option<&FocusSession> {
        self.focus.as_ref()
    }

    pub fn is_focused(&self) -> bool {
        self.focus.is_some()
    }

    pub fn focus_elapsed(&self) -> Option<f64> {
        let now = self.now();
        self.focus.as_ref().map(|f| f.elapsed(now))
    }

    pub fn begin_focus(&mut self, item_id: &str) -> Result<Event> {
        self.active_item(item_id)?;
        if let Some(current) = &self.focus {
            return Err(LifecycleError::FocusBusy(current.item_id.clone()).into());
        }
        let now = self.now();
        self.focus = Some(FocusSession {
            item_id: item_id.to_string(),
            started_at: now,
        });
        Ok(Event::FocusStarted {
            item_id: item_id.to_string(),
            at: now,
        })
    }

    /// Stop the session and append its duration to the item's focus log.
    /// The session is kept when the write fails so it can be retried.
    pub fn end_focus(&mut self) -> Result<Event> {
        let session = self.focus.clone().ok_or(LifecycleError::NoFocus)?;
        let now = self.now();
        let duration = session.elapsed(now);

        let path = paths::timing_data(&session.item_id);
        let mut log: Vec<FocusRecord> = tree::values(self.store.get(&path)?.as_ref())
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        log.push(FocusRecord {
            duration,
            timestamp: now,
        });
        store::write(self.store.as_ref(), &path, &log).map_err(|e| logged("append focus record", e))?;

        self.focus = None;
        tracing::info!(item_id = %session.item_id, duration, sessions = log.len(), "focus session ended");
        Ok(Event::FocusEnded {
            item_id: session.item_id,
            duration_secs: duration,
            at: now,
        })
    }

    /// Previous focus sessions of an item, oldest first.
    pub fn focus_log(&self, item_id: &str) -> Result<Vec<FocusRecord>> {
        let node = self.store.get(&paths::timing_data(item_id))?;
        Ok(tree::values(node.as_ref())
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }
}
