//! Slash-path operations over a JSON document tree.
//!
//! Both store backends keep their data as `serde_json::Value` trees and share
//! these helpers, so path semantics are identical everywhere:
//!
//! - `a/b/c` addresses nested object keys; numeric segments index arrays.
//! - Writing `null` removes the node.
//! - Removing a node prunes parents left empty, and empty objects read back
//!   as absent.
//! - Removing a missing node is a no-op.

use serde_json::{Map, Value};

use crate::error::StoreError;

/// Split a path into segments, ignoring leading, trailing and repeated
/// slashes. The empty path addresses the root.
pub fn segments(path: &str) -> Result<Vec<String>, StoreError> {
    let segs: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if segs.iter().any(|s| s == "..") {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segs)
}

pub fn join(segs: &[String]) -> String {
    segs.join("/")
}

/// True when one path is a prefix of the other, i.e. a write at one is
/// visible to a reader of the other.
pub fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Read the node at `segs`; empty containers count as absent.
pub fn get(root: &Value, segs: &[String]) -> Option<Value> {
    let mut node = root;
    for seg in segs {
        node = match node {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!is_empty_node(node)).then(|| node.clone())
}

/// Write `value` at `segs`, creating intermediate objects. Writing `null`
/// removes the node instead.
pub fn set(root: &mut Value, segs: &[String], value: Value) {
    if value.is_null() {
        remove(root, segs);
        return;
    }
    let Some((last, parents)) = segs.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for seg in parents {
        node = child_mut(node, seg);
    }
    coerce_container(node, last);
    match node {
        Value::Array(items) => {
            if let Some(slot) = last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *slot = value;
            }
        }
        Value::Object(map) => {
            map.insert(last.clone(), value);
        }
        _ => {}
    }
}

/// Remove the node at `segs`, pruning empty parents. Returns whether
/// anything was removed.
pub fn remove(root: &mut Value, segs: &[String]) -> bool {
    let Some((head, rest)) = segs.split_first() else {
        let had = !is_empty_node(root);
        *root = Value::Object(Map::new());
        return had;
    };
    match root {
        Value::Object(map) => {
            if rest.is_empty() {
                return map.remove(head).is_some();
            }
            let Some(child) = map.get_mut(head) else {
                return false;
            };
            let removed = remove(child, rest);
            if is_empty_node(child) {
                map.remove(head);
            }
            removed
        }
        Value::Array(items) => {
            let Some(idx) = head.parse::<usize>().ok().filter(|i| *i < items.len()) else {
                return false;
            };
            if rest.is_empty() {
                items.remove(idx);
                return true;
            }
            let removed = remove(&mut items[idx], rest);
            if is_empty_node(&items[idx]) {
                items.remove(idx);
            }
            removed
        }
        _ => false,
    }
}

/// Make `node` a container that can hold `seg`: arrays stay arrays only when
/// `seg` indexes an existing element, scalars become empty objects.
fn coerce_container(node: &mut Value, seg: &str) {
    let keep = match node {
        Value::Object(_) => true,
        Value::Array(items) => seg.parse::<usize>().is_ok_and(|i| i < items.len()),
        _ => false,
    };
    if !keep {
        let map = match std::mem::take(node) {
            Value::Array(items) => array_to_map(items),
            _ => Map::new(),
        };
        *node = Value::Object(map);
    }
}

fn child_mut<'a>(node: &'a mut Value, seg: &str) -> &'a mut Value {
    coerce_container(node, seg);
    match node {
        Value::Array(items) => {
            let idx = seg.parse::<usize>().unwrap_or_default();
            &mut items[idx]
        }
        Value::Object(map) => map
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new())),
        _ => unreachable!("node was coerced to a container above"),
    }
}

fn array_to_map(items: Vec<Value>) -> Map<String, Value> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i.to_string(), v))
        .collect()
}

/// Values of an object or array node, in key order. Mirrors how list-like
/// data may come back from the store either as an array or as a keyed map.
pub fn values(node: Option<&Value>) -> Vec<Value> {
    match node {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(map)) => map.values().cloned().collect(),
        _ => Vec::new(),
    }
}
