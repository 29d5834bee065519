//! Local mirror of the shared day state.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::item::{CompletedItem, Item};
use crate::store::paths;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub items: BTreeMap<String, Item>,
    pub completed: BTreeMap<String, CompletedItem>,
    pub pdf_date: Option<String>,
    pub total_cases: u64,
    pub connected: bool,
}

/// Decode a keyed collection, filling each record's id from its key.
/// Records that do not decode are skipped.
fn decode_keyed<T>(node: Option<&Value>, set_id: impl Fn(&mut T, &str)) -> BTreeMap<String, T>
where
    T: serde::de::DeserializeOwned,
{
    let Some(Value::Object(map)) = node else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(key, raw)| match serde_json::from_value::<T>(raw.clone()) {
            Ok(mut record) => {
                set_id(&mut record, key);
                Some((key.clone(), record))
            }
            Err(e) => {
                tracing::warn!(id = %key, error = %e, "skipping malformed record");
                None
            }
        })
        .collect()
}

impl AppState {
    pub fn decode_items(node: Option<&Value>) -> BTreeMap<String, Item> {
        decode_keyed(node, |item: &mut Item, id| item.id = id.to_string())
    }

    pub fn decode_completed(node: Option<&Value>) -> BTreeMap<String, CompletedItem> {
        decode_keyed(node, |done: &mut CompletedItem, id| done.item.id = id.to_string())
    }

    /// Apply the snapshot of one watched top-level path. Returns false for
    /// paths this mirror does not own.
    pub fn apply(&mut self, path: &str, value: Option<&Value>) -> bool {
        match path {
            paths::ITEMS => self.items = Self::decode_items(value),
            paths::COMPLETED_ITEMS => self.completed = Self::decode_completed(value),
            paths::PDF_DATE => {
                self.pdf_date = value.and_then(Value::as_str).map(str::to_string);
            }
            paths::TOTAL_CASES => {
                self.total_cases = value.and_then(Value::as_u64).unwrap_or_default();
            }
            paths::CONNECTED => {
                self.connected = value.and_then(Value::as_bool).unwrap_or(false);
            }
            _ => return false,
        }
        true
    }

    /// Active items in worklist order: priority label, then name.
    pub fn queue(&self) -> Vec<&Item> {
        let mut items: Vec<&Item> = self.items.values().collect();
        items.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        items
    }

    pub fn completed_cases(&self) -> u64 {
        self.completed.values().map(|c| u64::from(c.item.cases)).sum()
    }

    /// Wipe the day: active and completed sets plus worklist metadata.
    pub fn clear_day(&mut self) {
        self.items.clear();
        self.completed.clear();
        self.pdf_date = None;
        self.total_cases = 0;
    }
}
