//! Both key-value backends must behave the same through the trait.

use std::sync::mpsc;

use produceroom_core::store::paths;
use produceroom_core::{KvStore, MemoryStore, SqliteStore};
use serde_json::{json, Map};

fn backends() -> Vec<(&'static str, Box<dyn KvStore>, Option<tempfile::TempDir>)> {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = SqliteStore::open(&dir.path().join("store.db")).unwrap();
    vec![
        ("memory", Box::new(MemoryStore::new()), None),
        ("sqlite", Box::new(sqlite), Some(dir)),
    ]
}

#[test]
fn null_write_removes() {
    for (name, store, _dir) in backends() {
        store.set("items/a", json!({"cases": 1})).unwrap();
        store.set("items/a", serde_json::Value::Null).unwrap();
        assert_eq!(store.get("items/a").unwrap(), None, "{name}");
        assert_eq!(store.get("items").unwrap(), None, "{name}");
    }
}

#[test]
fn removing_absent_path_is_noop() {
    for (name, store, _dir) in backends() {
        store.remove("completedItems/nothing").unwrap();
        assert_eq!(store.get("completedItems").unwrap(), None, "{name}");
    }
}

#[test]
fn update_merges_children() {
    for (name, store, _dir) in backends() {
        store.set("items/a", json!({"name": "A #1", "cases": 1})).unwrap();
        let mut patch = Map::new();
        patch.insert("a/cases".into(), json!(3));
        patch.insert("b".into(), json!({"name": "B #2", "cases": 2}));
        store.update("items", patch).unwrap();
        assert_eq!(
            store.get("items").unwrap(),
            Some(json!({
                "a": {"name": "A #1", "cases": 3},
                "b": {"name": "B #2", "cases": 2}
            })),
            "{name}"
        );
    }
}

#[test]
fn push_keys_are_distinct() {
    for (name, store, _dir) in backends() {
        let a = store.push_key(paths::ITEMS).unwrap();
        let b = store.push_key(paths::ITEMS).unwrap();
        assert_ne!(a, b, "{name}");
    }
}

#[test]
fn subscription_sees_prime_and_updates() {
    for (name, store, _dir) in backends() {
        let (tx, rx) = mpsc::channel();
        let id = store.subscribe(paths::HISTORICAL_TIMES, tx).unwrap();
        assert_eq!(rx.try_recv().unwrap().value, None, "{name}");

        store.set("historicalTimes/77", json!(3.0)).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.path, paths::HISTORICAL_TIMES, "{name}");
        assert_eq!(event.value, Some(json!({"77": 3.0})), "{name}");

        store.unsubscribe(id);
        store.set("historicalTimes/78", json!(1.0)).unwrap();
        assert!(rx.try_recv().is_err(), "{name}");
    }
}

#[test]
fn connectivity_path_reads_as_bool() {
    for (name, store, _dir) in backends() {
        assert!(store.is_connected(), "{name}");
        assert_eq!(store.get(paths::CONNECTED).unwrap(), Some(json!(true)), "{name}");
    }
}

#[test]
fn parent_traversal_is_rejected() {
    for (name, store, _dir) in backends() {
        assert!(store.set("items/../x", json!(1)).is_err(), "{name}");
    }
}
