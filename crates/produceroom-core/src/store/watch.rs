//! Change notification fan-out shared by the store backends.

use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tree;

/// The current value at a subscribed path, delivered after every write that
/// touches it. `value` is `None` once the path has been removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEvent {
    pub path: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    path: Vec<String>,
    sink: Sender<StoreEvent>,
}

#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    entries: Vec<Subscription>,
}

impl Subscribers {
    pub fn add(&mut self, path: Vec<String>, sink: Sender<StoreEvent>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push(Subscription { id, path, sink });
        id
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s.id != id);
        before != self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver the current value to every subscriber whose path overlaps
    /// `changed`. Subscribers whose receiver is gone are dropped.
    pub fn notify(&mut self, changed: &[String], lookup: impl Fn(&[String]) -> Option<Value>) {
        self.entries.retain(|sub| {
            if !tree::overlaps(&sub.path, changed) {
                return true;
            }
            let event = StoreEvent {
                path: tree::join(&sub.path),
                value: lookup(&sub.path),
            };
            sub.sink.send(event).is_ok()
        });
    }

    /// Deliver the current value to one subscriber, used right after it
    /// registers.
    pub fn prime(&mut self, id: SubscriptionId, value: Option<Value>) {
        self.entries.retain(|sub| {
            if sub.id != id {
                return true;
            }
            sub.sink
                .send(StoreEvent {
                    path: tree::join(&sub.path),
                    value: value.clone(),
                })
                .is_ok()
        });
    }
}
