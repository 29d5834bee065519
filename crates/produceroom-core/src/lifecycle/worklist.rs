//! Worklist editing and the daily sync check.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{logged, ItemLifecycle};
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::item::{Item, NewItem, Priority};
use crate::stats::Progress;
use crate::store::{self, paths, BlobStore};

/// Store format of the worklist date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A worklist source file in the blob store, dated by its first line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFile {
    pub filename: String,
    pub full_path: String,
    pub date: NaiveDate,
}

/// CSV files under the data-file prefix whose first line carries a
/// `YYYY-MM-DD` date, newest first. Unreadable or undated files are skipped.
pub fn list_data_files(blobs: &dyn BlobStore) -> Result<Vec<DataFile>> {
    let mut files = Vec::new();
    for entry in blobs.list(paths::DATA_FILES_PREFIX)? {
        if !entry.name.to_ascii_lowercase().ends_with(".csv") {
            continue;
        }
        let bytes = match blobs.download(&entry.full_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(file = %entry.name, error = %e, "skipping unreadable data file");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        match first_date(text.lines().next().unwrap_or_default()) {
            Some(date) => files.push(DataFile {
                filename: entry.name,
                full_path: entry.full_path,
                date,
            }),
            None => tracing::debug!(file = %entry.name, "skipping undated data file"),
        }
    }
    files.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(files)
}

/// First `YYYY-MM-DD` in `line` that is a real date.
fn first_date(line: &str) -> Option<NaiveDate> {
    let shaped = |s: &str| {
        s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        })
    };
    (0..=line.len().saturating_sub(10))
        .filter_map(|i| line.get(i..i + 10))
        .filter(|s| shaped(s))
        .find_map(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
}

/// Result of [`ItemLifecycle::reconcile_day`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayStatus {
    /// A focus session is running; nothing was checked.
    Busy,
    /// The stored worklist is for another day and was cleared.
    Cleared { previous: Option<String> },
    /// The local mirror was stale and has been reloaded.
    Loaded { items: usize },
    UpToDate,
}

impl ItemLifecycle {
    /// Add a single item by hand.
    pub fn add_item(&mut self, record: NewItem) -> Result<Event> {
        let record = record.validate()?;
        let now = self.now();
        let id = format!("adhoc-{}", now.timestamp_millis());
        let item = record.with_id(&id);

        store::write(self.store.as_ref(), &paths::item(&id), &item)
            .map_err(|e| logged("add item", e))?;
        if !item.priority.is_missing() {
            self.priorities
                .ensure(self.store.as_ref(), item.priority)
                .map_err(|e| logged("extend priority registry", e))?;
        }
        let name = item.name.clone();
        self.state.items.insert(id.clone(), item);
        tracing::info!(item_id = %id, %name, "item added");
        Ok(Event::ItemAdded {
            item_id: id,
            name,
            at: now,
        })
    }

    pub fn set_priority(&mut self, item_id: &str, label: Priority) -> Result<Event> {
        self.active_item(item_id)?;
        self.store
            .set(&format!("{}/priority", paths::item(item_id)), label.to_json())
            .map_err(|e| logged("set priority", e))?;
        if let Some(item) = self.state.items.get_mut(item_id) {
            item.priority = label;
        }
        if !label.is_missing() {
            self.priorities
                .ensure(self.store.as_ref(), label)
                .map_err(|e| logged("extend priority registry", e))?;
        }
        Ok(self.updated(item_id, "priority"))
    }

    pub fn set_location(&mut self, item_id: &str, location: &str) -> Result<Event> {
        self.active_item(item_id)?;
        let location = location.trim();
        if location.is_empty() {
            return Err(ValidationError::Required("location").into());
        }
        self.store
            .set(
                &format!("{}/location", paths::item(item_id)),
                Value::from(location),
            )
            .map_err(|e| logged("set location", e))?;
        if let Some(item) = self.state.items.get_mut(item_id) {
            item.location = location.to_string();
        }
        Ok(self.updated(item_id, "location"))
    }

    fn updated(&self, item_id: &str, field: &str) -> Event {
        Event::ItemUpdated {
            item_id: item_id.to_string(),
            field: field.to_string(),
            at: self.now(),
        }
    }

    /// Replace the day's worklist.
    ///
    /// Every record is validated before anything is written. The active set
    /// is replaced with freshly keyed records, the completed set cleared,
    /// and the case total and date written. `date` defaults to today.
    /// Record priorities are merged into the registry.
    pub fn load_worklist(&mut self, records: Vec<NewItem>, date: Option<NaiveDate>) -> Result<Event> {
        let records = records
            .into_iter()
            .enumerate()
            .map(|(idx, r)| {
                r.validate().map_err(|e| ValidationError::InvalidValue {
                    field: format!("records[{idx}]"),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let now = self.now();
        let date = date.unwrap_or_else(|| now.date_naive());
        let total_cases: u64 = records.iter().map(|r| u64::from(r.cases)).sum();

        let mut items: Vec<Item> = Vec::with_capacity(records.len());
        for record in records {
            let key = self.store.push_key(paths::ITEMS)?;
            items.push(record.with_id(key));
        }
        let mut node = Map::new();
        for item in &items {
            node.insert(item.id.clone(), serde_json::to_value(item)?);
        }

        let store = self.store.as_ref();
        store
            .set(paths::ITEMS, Value::Object(node))
            .map_err(|e| logged("write worklist", e))?;
        store
            .remove(paths::COMPLETED_ITEMS)
            .map_err(|e| logged("clear completed items", e))?;
        store
            .set(paths::TOTAL_CASES, Value::from(total_cases))
            .map_err(|e| logged("write total cases", e))?;
        store
            .set(paths::PDF_DATE, Value::from(date.format(DATE_FORMAT).to_string()))
            .map_err(|e| logged("write worklist date", e))?;
        self.priorities
            .ensure_all(store, items.iter().map(|i| i.priority))
            .map_err(|e| logged("extend priority registry", e))?;

        let count = items.len();
        self.state.items = items.into_iter().map(|i| (i.id.clone(), i)).collect();
        self.state.completed.clear();
        self.state.total_cases = total_cases;
        self.state.pdf_date = Some(date.format(DATE_FORMAT).to_string());
        self.timers.clear();

        tracing::info!(items = count, total_cases, %date, "worklist loaded");
        Ok(Event::WorklistLoaded {
            items: count,
            total_cases,
            date: Some(date),
            at: now,
        })
    }

    /// Daily sync check against `today`.
    ///
    /// Refused while a focus session runs. A stored worklist for any other
    /// day is wiped from the store together with every local timer.
    /// Otherwise the local mirror is reloaded when its date is stale.
    pub fn reconcile_day(&mut self, today: NaiveDate) -> Result<DayStatus> {
        if self.focus.is_some() {
            return Ok(DayStatus::Busy);
        }
        let today = today.format(DATE_FORMAT).to_string();
        let stored: Option<String> = store::read(self.store.as_ref(), paths::PDF_DATE)?;

        if stored.as_deref() != Some(today.as_str()) {
            for path in [
                paths::ITEMS,
                paths::COMPLETED_ITEMS,
                paths::PDF_DATE,
                paths::TOTAL_CASES,
            ] {
                self.store
                    .remove(path)
                    .map_err(|e| logged("clear day", e))?;
            }
            self.state.clear_day();
            self.timers.clear();
            tracing::info!(previous = ?stored, %today, "stale worklist cleared");
            return Ok(DayStatus::Cleared { previous: stored });
        }

        if self.state.pdf_date.as_deref() != Some(today.as_str()) {
            self.load()?;
            return Ok(DayStatus::Loaded {
                items: self.state.items.len(),
            });
        }
        Ok(DayStatus::UpToDate)
    }

    /// Case and item counts for the day.
    pub fn progress(&self) -> Progress {
        Progress::compute(
            self.state.total_cases,
            self.state.completed_cases(),
            self.state.items.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::error::CoreError;
    use crate::store::{KvStore, MemoryStore};
    use crate::timer::ManualClock;

    #[test]
    fn data_files_are_csv_dated_newest_first() {
        use crate::store::FsBlobStore;

        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::new(dir.path());
        blobs
            .upload("produce-pdfs/monday.csv", b"Produce list 2026-03-02\nA,1", "text/csv")
            .unwrap();
        blobs
            .upload("produce-pdfs/tuesday.CSV", b"date,2026-03-03\nB,2", "text/csv")
            .unwrap();
        blobs
            .upload("produce-pdfs/undated.csv", b"no date here\n", "text/csv")
            .unwrap();
        blobs
            .upload("produce-pdfs/scan.pdf", b"2026-03-04", "application/pdf")
            .unwrap();

        let files = list_data_files(&blobs).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["tuesday.CSV", "monday.csv"]);
        assert_eq!(files[1].date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn first_date_needs_a_real_date() {
        assert_eq!(first_date("x 2026-13-01 2026-02-28"), NaiveDate::from_ymd_opt(2026, 2, 28));
        assert_eq!(first_date("2026-3-2"), None);
        assert_eq!(first_date(""), None);
    }

    fn lifecycle() -> (Arc<MemoryStore>, ItemLifecycle) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()));
        let lc = ItemLifecycle::new(store.clone(), clock);
        (store, lc)
    }

    fn record(name: &str, cases: u32, priority: Priority) -> NewItem {
        NewItem {
            name: name.into(),
            location: "Dock".into(),
            cases,
            priority,
        }
    }

    #[test]
    fn add_item_validates_and_registers_priority() {
        let (store, mut lc) = lifecycle();
        assert!(matches!(
            lc.add_item(record("  ", 1, Priority::Missing)),
            Err(CoreError::Validation(ValidationError::Required("name")))
        ));
        let Event::ItemAdded { item_id, .. } =
            lc.add_item(record("Leeks #4", 3, Priority::Level(2))).unwrap()
        else {
            panic!("expected ItemAdded");
        };
        assert!(item_id.starts_with("adhoc-"));
        assert_eq!(store.get("historicalPriorities").unwrap(), Some(json!([2])));
    }

    #[test]
    fn worklist_replaces_day() {
        let (store, mut lc) = lifecycle();
        store.set("completedItems/old", json!({"name": "x"})).unwrap();
        lc.load_worklist(
            vec![
                record("Apples #123", 10, Priority::Level(1)),
                record("Kale #77", 4, Priority::Missing),
            ],
            None,
        )
        .unwrap();
        assert_eq!(store.get("totalCases").unwrap(), Some(json!(14)));
        assert_eq!(store.get("pdfDate").unwrap(), Some(json!("2026-03-02")));
        assert_eq!(store.get("completedItems").unwrap(), None);
        assert_eq!(
            store.get("historicalPriorities").unwrap(),
            Some(json!(["missing", 1]))
        );
        assert_eq!(lc.state().items.len(), 2);
        assert_eq!(lc.progress().remaining_cases, 14);
    }

    #[test]
    fn invalid_record_writes_nothing() {
        let (store, mut lc) = lifecycle();
        let err = lc
            .load_worklist(vec![record("Apples #1", 0, Priority::Missing)], None)
            .unwrap_err();
        assert!(err.to_string().contains("records[0]"));
        assert_eq!(store.get("items").unwrap(), None);
    }

    #[test]
    fn reconcile_clears_other_days() {
        let (store, mut lc) = lifecycle();
        let today = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        lc.load_worklist(vec![record("Apples #1", 2, Priority::Missing)], None)
            .unwrap();
        let id = lc.state().items.keys().next().cloned().unwrap();
        lc.start_timer(&id).unwrap();

        let status = lc.reconcile_day(today).unwrap();
        assert_eq!(
            status,
            DayStatus::Cleared {
                previous: Some("2026-03-02".into())
            }
        );
        assert_eq!(store.get("items").unwrap(), None);
        assert!(lc.timers().is_empty());
    }

    #[test]
    fn reconcile_reloads_then_reports_up_to_date() {
        let (store, mut lc) = lifecycle();
        store.set("pdfDate", json!("2026-03-02")).unwrap();
        store
            .set("items/a", json!({"name": "Kale #77", "location": "B", "cases": 2}))
            .unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(lc.reconcile_day(today).unwrap(), DayStatus::Loaded { items: 1 });
        assert_eq!(lc.reconcile_day(today).unwrap(), DayStatus::UpToDate);
    }

    #[test]
    fn reconcile_waits_for_focus() {
        let (store, mut lc) = lifecycle();
        store
            .set("items/a", json!({"name": "Kale #77", "location": "B", "cases": 2}))
            .unwrap();
        lc.load().unwrap();
        lc.begin_focus("a").unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(lc.reconcile_day(today).unwrap(), DayStatus::Busy);
        assert!(store.get("items/a").unwrap().is_some());
    }

    #[test]
    fn set_priority_and_location() {
        let (store, mut lc) = lifecycle();
        store
            .set("items/a", json!({"name": "Kale #77", "location": "B", "cases": 2}))
            .unwrap();
        lc.load().unwrap();
        lc.set_priority("a", Priority::Level(3)).unwrap();
        lc.set_location("a", " Cooler 1 ").unwrap();
        assert_eq!(store.get("items/a/priority").unwrap(), Some(json!(3)));
        assert_eq!(store.get("items/a/location").unwrap(), Some(json!("Cooler 1")));
        assert_eq!(lc.priorities(), &[Priority::Level(3)]);
        assert!(lc.set_location("zzz", "x").is_err());
    }
}
