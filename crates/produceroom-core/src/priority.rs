//! Shared set of priority labels seen across worklists.
//!
//! The registry lives at `historicalPriorities` as a JSON array ordered
//! `missing` first, then levels ascending. Readers also accept the keyed-map
//! shape the store may hand back.

use serde_json::Value;

use crate::error::StoreError;
use crate::item::Priority;
use crate::store::{paths, tree, KvStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityRegistry {
    labels: Vec<Priority>,
}

/// Deduplicate and order labels.
pub fn normalize(mut labels: Vec<Priority>) -> Vec<Priority> {
    labels.sort();
    labels.dedup();
    labels
}

fn decode(node: Option<&Value>) -> Vec<Priority> {
    normalize(
        tree::values(node)
            .iter()
            .filter_map(Priority::from_json)
            .collect(),
    )
}

fn encode(labels: &[Priority]) -> Value {
    Value::Array(labels.iter().map(|p| p.to_json()).collect())
}

impl PriorityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Priority] {
        &self.labels
    }

    pub fn contains(&self, label: Priority) -> bool {
        self.labels.binary_search(&label).is_ok()
    }

    /// Replace the mirror from a store snapshot.
    pub fn apply_snapshot(&mut self, node: Option<&Value>) {
        self.labels = decode(node);
    }

    /// Add `label` if absent. Reads the current set from the store first so
    /// labels added by other clients are kept. Returns whether a write
    /// happened.
    pub fn ensure(&mut self, store: &dyn KvStore, label: Priority) -> Result<bool, StoreError> {
        self.ensure_all(store, [label])
    }

    /// Union `labels` into the registry with a single write.
    pub fn ensure_all(
        &mut self,
        store: &dyn KvStore,
        labels: impl IntoIterator<Item = Priority>,
    ) -> Result<bool, StoreError> {
        let current = decode(store.get(paths::HISTORICAL_PRIORITIES)?.as_ref());
        let mut merged = current.clone();
        merged.extend(labels);
        let merged = normalize(merged);
        if merged == current {
            self.labels = current;
            return Ok(false);
        }
        store.set(paths::HISTORICAL_PRIORITIES, encode(&merged))?;
        tracing::debug!(added = merged.len() - current.len(), "priority registry extended");
        self.labels = merged;
        Ok(true)
    }

    /// Drop `label`. Items still carrying it keep it.
    pub fn remove(&mut self, store: &dyn KvStore, label: Priority) -> Result<bool, StoreError> {
        let current = decode(store.get(paths::HISTORICAL_PRIORITIES)?.as_ref());
        let kept: Vec<Priority> = current.iter().copied().filter(|p| *p != label).collect();
        if kept.len() == current.len() {
            self.labels = current;
            return Ok(false);
        }
        store.set(paths::HISTORICAL_PRIORITIES, encode(&kept))?;
        self.labels = kept;
        Ok(true)
    }
}
