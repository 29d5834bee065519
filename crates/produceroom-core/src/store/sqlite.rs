//! SQLite-backed key-value store.
//!
//! Each top-level key of the tree is one row holding its subtree as JSON, so
//! a write under `items/...` rewrites only the `items` row. Subscribers are
//! in-process only; the store never goes offline.

use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use super::watch::{StoreEvent, SubscriptionId, Subscribers};
use super::{new_push_key, paths, tree, KvStore};
use crate::error::StoreError;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    subscribers: Mutex<Subscribers>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nodes (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            subscribers: Mutex::new(Subscribers::default()),
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Rows ──

    fn load_row(conn: &Connection, key: &str) -> Result<Value, StoreError> {
        let raw: Option<String> = conn
            .query_row("SELECT value FROM nodes WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        match raw {
            Some(text) => serde_json::from_str(&text).map_err(|e| StoreError::Malformed {
                path: key.to_string(),
                message: e.to_string(),
            }),
            None => Ok(Value::Null),
        }
    }

    fn store_row(conn: &Connection, key: &str, value: &Value) -> Result<(), StoreError> {
        if value.is_null() || value.as_object().is_some_and(Map::is_empty) {
            conn.execute("DELETE FROM nodes WHERE key = ?1", params![key])?;
        } else {
            conn.execute(
                "INSERT INTO nodes (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, serde_json::to_string(value)?],
            )?;
        }
        Ok(())
    }

    fn load_root(conn: &Connection) -> Result<Value, StoreError> {
        let mut stmt = conn.prepare("SELECT key, value FROM nodes ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut root = Map::new();
        for row in rows {
            let (key, text) = row?;
            let value = serde_json::from_str(&text).map_err(|e| StoreError::Malformed {
                path: key.clone(),
                message: e.to_string(),
            })?;
            root.insert(key, value);
        }
        Ok(Value::Object(root))
    }

    fn store_root(conn: &Connection, root: &Value) -> Result<(), StoreError> {
        conn.execute("DELETE FROM nodes", [])?;
        if let Value::Object(map) = root {
            for (key, value) in map {
                Self::store_row(conn, key, value)?;
            }
        }
        Ok(())
    }

    fn read_segs(&self, segs: &[String]) -> Result<Option<Value>, StoreError> {
        let conn = self.lock_conn();
        match segs.split_first() {
            None => Ok(tree::get(&Self::load_root(&conn)?, &[])),
            Some((head, rest)) => Ok(tree::get(&Self::load_row(&conn, head)?, rest)),
        }
    }

    /// Run `apply` against the row(s) covering `segs`, relative to the row
    /// itself, then notify subscribers once the connection is released.
    fn mutate(
        &self,
        segs: &[String],
        apply: impl FnOnce(&mut Value, &[String]),
    ) -> Result<(), StoreError> {
        {
            let mut conn = self.lock_conn();
            let tx = conn.transaction()?;
            match segs.split_first() {
                None => {
                    let mut root = Self::load_root(&tx)?;
                    apply(&mut root, &[]);
                    Self::store_root(&tx, &root)?;
                }
                Some((head, rest)) => {
                    let mut row = Self::load_row(&tx, head)?;
                    apply(&mut row, rest);
                    Self::store_row(&tx, head, &row)?;
                }
            }
            tx.commit()?;
        }
        self.lock_subscribers()
            .notify(segs, |sub| self.read_segs(sub).ok().flatten());
        Ok(())
    }
}

impl KvStore for SqliteStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        if path == paths::CONNECTED {
            return Ok(Some(Value::Bool(true)));
        }
        self.read_segs(&tree::segments(path)?)
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segs = tree::segments(path)?;
        self.mutate(&segs, |node, rel| tree::set(node, rel, value))
    }

    fn update(&self, path: &str, patch: Map<String, Value>) -> Result<(), StoreError> {
        let base = tree::segments(path)?;
        let mut children = Vec::with_capacity(patch.len());
        for (key, value) in patch {
            children.push((tree::segments(&key)?, value));
        }
        // Keys of a root-level update are distinct rows; write each in turn.
        if base.is_empty() {
            for (segs, value) in children {
                self.mutate(&segs, |node, rel| tree::set(node, rel, value))?;
            }
            return Ok(());
        }
        self.mutate(&base, |node, rel| {
            for (child, value) in children {
                let mut segs = rel.to_vec();
                segs.extend(child);
                tree::set(node, &segs, value);
            }
        })
    }

    fn remove(&self, path: &str) -> Result<(), StoreError> {
        let segs = tree::segments(path)?;
        self.mutate(&segs, |node, rel| {
            tree::remove(node, rel);
        })
    }

    fn push_key(&self, path: &str) -> Result<String, StoreError> {
        tree::segments(path)?;
        Ok(new_push_key())
    }

    fn subscribe(&self, path: &str, sink: Sender<StoreEvent>) -> Result<SubscriptionId, StoreError> {
        let segs = tree::segments(path)?;
        let current = if path == paths::CONNECTED {
            Some(Value::Bool(true))
        } else {
            self.read_segs(&segs)?
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
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;

    #[test]
    fn rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("historicalTimes/77", json!(3.0)).unwrap();
            store.set("pdfDate", json!("2026-03-02")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("historicalTimes/77").unwrap(), Some(json!(3.0)));
        assert_eq!(
            store.get("").unwrap(),
            Some(json!({"historicalTimes": {"77": 3.0}, "pdfDate": "2026-03-02"}))
        );
    }

    #[test]
    fn removing_last_child_drops_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("items/a", json!({"cases": 1})).unwrap();
        store.remove("items/a").unwrap();
        assert_eq!(store.get("items").unwrap(), None);
        let count: i64 = store
            .lock_conn()
            .query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn root_update_spans_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut patch = Map::new();
        patch.insert("pdfDate".into(), json!("2026-03-02"));
        patch.insert("totalCases".into(), json!(12));
        store.update("", patch).unwrap();
        assert_eq!(store.get("totalCases").unwrap(), Some(json!(12)));
    }

    #[test]
    fn subscribers_see_writes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (tx, rx) = mpsc::channel();
        store.subscribe("timingEvents/77", tx).unwrap();
        assert_eq!(rx.try_recv().unwrap().value, None);
        store.set("timingEvents/77", json!([{"totalTime": 4.0}])).unwrap();
        assert_eq!(
            rx.try_recv().unwrap().value,
            Some(json!([{"totalTime": 4.0}]))
        );
    }
}
