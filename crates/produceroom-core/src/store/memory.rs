//! In-process key-value store.
//!
//! Holds one JSON tree behind a mutex. It can be switched offline to
//! exercise the "store unavailable" failure path: while offline every read
//! and write fails with [`StoreError::Unavailable`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use super::watch::{StoreEvent, SubscriptionId, Subscribers};
use super::{new_push_key, paths, tree, KvStore};
use crate::error::StoreError;

pub struct MemoryStore {
    root: Mutex<Value>,
    subscribers: Mutex<Subscribers>,
    connected: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_root(Value::Object(Map::new()))
    }

    /// Start from an existing document, e.g. a test fixture.
    pub fn with_root(root: Value) -> Self {
        Self {
            root: Mutex::new(root),
            subscribers: Mutex::new(Subscribers::default()),
            connected: AtomicBool::new(true),
        }
    }

    /// Flip connectivity. Subscribers of the connectivity path are told.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        let changed = tree::segments(paths::CONNECTED).unwrap_or_default();
        self.lock_subscribers()
            .notify(&changed, |_| Some(Value::Bool(connected)));
    }

    /// A copy of the whole document.
    pub fn dump(&self) -> Value {
        self.lock_root().clone()
    }

    fn lock_root(&self) -> MutexGuard<'_, Value> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_online(&self, op: &str, path: &str) -> Result<(), StoreError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("{op} {path}: offline")))
        }
    }

    fn mutate(&self, path: &str, apply: impl FnOnce(&mut Value, &[String])) -> Result<(), StoreError> {
        let segs = tree::segments(path)?;
        let mut root = self.lock_root();
        apply(&mut root, &segs);
        let snapshot: &Value = &root;
        self.lock_subscribers()
            .notify(&segs, |sub| tree::get(snapshot, sub));
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        if path == paths::CONNECTED {
            return Ok(Some(Value::Bool(self.is_connected())));
        }
        self.ensure_online("get", path)?;
        let segs = tree::segments(path)?;
        Ok(tree::get(&self.lock_root(), &segs))
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.ensure_online("set", path)?;
        self.mutate(path, |root, segs| tree::set(root, segs, value))
    }

    fn update(&self, path: &str, patch: Map<String, Value>) -> Result<(), StoreError> {
        self.ensure_online("update", path)?;
        let base = tree::segments(path)?;
        let mut children = Vec::with_capacity(patch.len());
        for (key, value) in patch {
            let mut segs = base.clone();
            segs.extend(tree::segments(&key)?);
            children.push((segs, value));
        }
        self.mutate(path, |root, _| {
            for (segs, value) in children {
                tree::set(root, &segs, value);
            }
        })
    }

    fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.ensure_online("remove", path)?;
        self.mutate(path, |root, segs| {
            tree::remove(root, segs);
        })
    }

    fn push_key(&self, path: &str) -> Result<String, StoreError> {
        tree::segments(path)?;
        Ok(new_push_key())
    }

    fn subscribe(&self, path: &str, sink: Sender<StoreEvent>) -> Result<SubscriptionId, StoreError> {
        let segs = tree::segments(path)?;
        let current = if path == paths::CONNECTED {
            Some(Value::Bool(self.is_connected()))
        } else {
            tree::get(&self.lock_root(), &segs)
        };
        let mut subs = self.lock_subscribers();
        let id = subs.add(segs, sink);
        subs.prime(id, current);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock_subscribers().remove(id);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
