//! Retention sweep of the completed ledger. Records older than the
//! configured window are deleted from the store one by one.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AppState, ItemLifecycle};
use crate::events::Event;
use crate::store::paths;

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub removed: Vec<String>,
    pub failed: usize,
    pub cutoff: Option<DateTime<Utc>>,
}

impl PurgeReport {
    pub fn event(&self, at: DateTime<Utc>) -> Event {
        Event::CompletedPurged {
            removed: self.removed.len(),
            at,
        }
    }
}

impl ItemLifecycle {
    /// Delete completed items older than the retention window.
    ///
    /// Never fails: read and delete errors are logged and counted, and the
    /// sweep is safe to repeat.
    pub fn purge_stale(&mut self) -> PurgeReport {
        let now = self.now();
        let cutoff = now - self.retention;
        let mut report = PurgeReport {
            cutoff: Some(cutoff),
            ..PurgeReport::default()
        };

        let completed = match self.store.get(paths::COMPLETED_ITEMS) {
            Ok(node) => AppState::decode_completed(node.as_ref()),
            Err(e) => {
                tracing::error!(error = %e, "purge: reading completed items failed");
                report.failed += 1;
                return report;
            }
        };

        for (id, done) in completed {
            if done.completed_at >= cutoff {
                continue;
            }
            match self.store.remove(&paths::completed_item(&id)) {
                Ok(()) => {
                    self.state.completed.remove(&id);
                    report.removed.push(id);
                }
                Err(e) => {
                    tracing::error!(item_id = %id, error = %e, "purge: delete failed");
                    report.failed += 1;
                }
            }
        }
        if !report.removed.is_empty() {
            tracing::info!(removed = report.removed.len(), %cutoff, "stale completed items purged");
        }
        report
    }
}
