//! Per-SKU timing history.
//!
//! Every completion appends a [`TimingEvent`] to the SKU's sequence at
//! `timingEvents/<sku>`; the mean time-per-case over that sequence is kept
//! at `historicalTimes/<sku>` and dropped entirely once the sequence is empty.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError, ValidationError};
use crate::item::Sku;
use crate::store::{self, paths, tree, KvStore};

/// One completed processing run of a SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingEvent {
    /// Seconds spent on the whole batch.
    pub total_time: f64,
    pub cases: u32,
    pub time_per_case: f64,
    pub timestamp: DateTime<Utc>,
}

impl TimingEvent {
    /// Build an event, deriving `time_per_case`. Zero cases and negative or
    /// non-finite times are rejected.
    pub fn new(total_time: f64, cases: u32, timestamp: DateTime<Utc>) -> Result<Self, ValidationError> {
        if cases < 1 {
            return Err(ValidationError::InvalidValue {
                field: "cases".into(),
                message: "must be at least 1".into(),
            });
        }
        if !total_time.is_finite() || total_time < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "totalTime".into(),
                message: format!("{total_time} is not a non-negative duration"),
            });
        }
        Ok(Self {
            total_time,
            cases,
            time_per_case: total_time / f64::from(cases),
            timestamp,
        })
    }
}

/// Derived statistics for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuStats {
    pub average: f64,
    pub fastest: f64,
    pub total_cases: u64,
    pub samples: usize,
}

/// Mean `time_per_case`, or `None` for an empty sequence.
pub fn mean(events: &[TimingEvent]) -> Option<f64> {
    if events.is_empty() {
        return None;
    }
    let sum: f64 = events.iter().map(|e| e.time_per_case).sum();
    Some(sum / events.len() as f64)
}

/// In-memory mirror of the timing history plus the write path back to the
/// store.
///
/// Stored entries that do not decode as a [`TimingEvent`] are kept aside per
/// SKU and written back after the decoded events, so rewriting a sequence
/// never drops another client's records.
#[derive(Debug, Clone, Default)]
pub struct StatsEngine {
    events: BTreeMap<Sku, Vec<TimingEvent>>,
    opaque: BTreeMap<Sku, Vec<Value>>,
    averages: BTreeMap<Sku, f64>,
}

impl StatsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──

    pub fn events(&self, sku: &Sku) -> &[TimingEvent] {
        self.events.get(sku).map(Vec::as_slice).unwrap_or_default()
    }

    /// Stored average, falling back to the mean of the mirrored events when
    /// the average snapshot has not arrived yet.
    pub fn average(&self, sku: &Sku) -> Option<f64> {
        self.averages
            .get(sku)
            .copied()
            .or_else(|| mean(self.events(sku)))
    }

    /// Statistics over the mirrored events. `None` when the SKU has no
    /// events, whatever average is stored.
    pub fn stats(&self, sku: &Sku) -> Option<SkuStats> {
        let events = self.events(sku);
        let average = mean(events)?;
        let fastest = events
            .iter()
            .map(|e| e.time_per_case)
            .fold(f64::INFINITY, f64::min);
        Some(SkuStats {
            average,
            fastest,
            total_cases: events.iter().map(|e| u64::from(e.cases)).sum(),
            samples: events.len(),
        })
    }

    /// Expected seconds to process `cases` of `sku`.
    pub fn estimate_secs(&self, sku: &Sku, cases: u32) -> Option<f64> {
        self.average(sku).map(|avg| avg * f64::from(cases))
    }

    pub fn skus(&self) -> impl Iterator<Item = &Sku> {
        self.events.keys()
    }

    pub fn averages(&self) -> &BTreeMap<Sku, f64> {
        &self.averages
    }

    /// Stored entries under `sku` that could not be decoded.
    pub fn undecoded(&self, sku: &Sku) -> &[Value] {
        self.opaque.get(sku).map(Vec::as_slice).unwrap_or_default()
    }

    // ── Commands ──

    /// Append `event`, persist the sequence and the new average. Returns the
    /// new average.
    ///
    /// The mirror is updated before the writes, so a failed write leaves it
    /// ahead of the store until the next snapshot arrives.
    pub fn record_event(&mut self, store: &dyn KvStore, sku: &Sku, event: TimingEvent) -> Result<f64, StoreError> {
        let seq = self.events.entry(sku.clone()).or_default();
        seq.push(event);
        let samples = seq.len();
        let average = mean(seq).unwrap_or_default();
        self.averages.insert(sku.clone(), average);

        self.write_sequence(store, sku)?;
        store.set(&paths::historical_time(sku), Value::from(average))?;
        tracing::debug!(%sku, average, samples, "timing event recorded");
        Ok(average)
    }

    /// Remove the event at `index`. Returns the recomputed average, or
    /// `None` when no events remain and the average was dropped.
    pub fn delete_event(&mut self, store: &dyn KvStore, sku: &Sku, index: usize) -> Result<Option<f64>> {
        let len = self.events(sku).len();
        if index >= len {
            return Err(ValidationError::OutOfBounds {
                collection: format!("timingEvents/{sku}"),
                index,
                len,
            }
            .into());
        }
        let seq = self.events.entry(sku.clone()).or_default();
        seq.remove(index);
        let average = mean(seq);
        if seq.is_empty() {
            self.events.remove(sku);
        }

        self.write_sequence(store, sku)?;
        match average {
            Some(avg) => {
                self.averages.insert(sku.clone(), avg);
                store.set(&paths::historical_time(sku), Value::from(avg))?;
            }
            None => {
                self.averages.remove(sku);
                store.remove(&paths::historical_time(sku))?;
            }
        }
        tracing::debug!(%sku, index, ?average, "timing event deleted");
        Ok(average)
    }

    /// Write the mirrored sequence of `sku`, undecoded entries last. An empty
    /// sequence removes the path.
    fn write_sequence(&self, store: &dyn KvStore, sku: &Sku) -> Result<(), StoreError> {
        let path = paths::timing_events(sku);
        let mut seq = self
            .events(sku)
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        seq.extend(self.undecoded(sku).iter().cloned());
        if seq.is_empty() {
            store.remove(&path)
        } else {
            store.set(&path, Value::Array(seq))
        }
    }

    // ── Snapshots ──

    /// Replace the event mirror from a `timingEvents` snapshot. Entries that
    /// fail to decode are set aside and preserved on the next write.
    pub fn apply_events_snapshot(&mut self, root: Option<&Value>) {
        self.events.clear();
        self.opaque.clear();
        let Some(Value::Object(by_sku)) = root else {
            return;
        };
        for (raw_sku, node) in by_sku {
            let Ok(sku) = Sku::parse(raw_sku) else {
                tracing::warn!(sku = %raw_sku, "ignoring timing events under a non-numeric key");
                continue;
            };
            let mut seq = Vec::new();
            let mut undecoded = Vec::new();
            for value in tree::values(Some(node)) {
                match serde_json::from_value::<TimingEvent>(value.clone()) {
                    Ok(ev) => seq.push(ev),
                    Err(e) => {
                        tracing::warn!(%sku, error = %e, "keeping malformed timing event aside");
                        undecoded.push(value);
                    }
                }
            }
            if !seq.is_empty() {
                self.events.insert(sku.clone(), seq);
            }
            if !undecoded.is_empty() {
                self.opaque.insert(sku, undecoded);
            }
        }
    }

    /// Replace the average mirror from a `historicalTimes` snapshot.
    pub fn apply_averages_snapshot(&mut self, root: Option<&Value>) {
        self.averages.clear();
        let Some(Value::Object(by_sku)) = root else {
            return;
        };
        for (raw_sku, value) in by_sku {
            if let (Ok(sku), Some(avg)) = (Sku::parse(raw_sku), value.as_f64()) {
                self.averages.insert(sku, avg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_000_000 + secs, 0).unwrap()
    }

    fn sku(raw: &str) -> Sku {
        Sku::parse(raw).unwrap()
    }

    #[test]
    fn event_derives_time_per_case() {
        let ev = TimingEvent::new(5.0, 10, at(0)).unwrap();
        assert!((ev.time_per_case - 0.5).abs() < 1e-9);
    }

    #[test]
    fn zero_cases_rejected() {
        assert!(TimingEvent::new(5.0, 0, at(0)).is_err());
        assert!(TimingEvent::new(-1.0, 1, at(0)).is_err());
        assert!(TimingEvent::new(f64::NAN, 1, at(0)).is_err());
    }

    #[test]
    fn record_then_delete_recomputes_average() {
        let store = MemoryStore::new();
        let mut engine = StatsEngine::new();
        let s = sku("77");

        engine.record_event(&store, &s, TimingEvent::new(2.0, 1, at(0)).unwrap()).unwrap();
        let avg = engine.record_event(&store, &s, TimingEvent::new(4.0, 1, at(1)).unwrap()).unwrap();
        assert!((avg - 3.0).abs() < 1e-9);
        assert_eq!(store.get("historicalTimes/77").unwrap(), Some(json!(3.0)));

        let after = engine.delete_event(&store, &s, 0).unwrap();
        assert_eq!(after, Some(4.0));
        assert_eq!(store.get("historicalTimes/77").unwrap(), Some(json!(4.0)));
        assert_eq!(engine.events(&s).len(), 1);
    }

    #[test]
    fn deleting_last_event_drops_average() {
        let store = MemoryStore::new();
        let mut engine = StatsEngine::new();
        let s = sku("5");
        engine.record_event(&store, &s, TimingEvent::new(3.0, 3, at(0)).unwrap()).unwrap();
        assert_eq!(engine.delete_event(&store, &s, 0).unwrap(), None);
        assert_eq!(engine.average(&s), None);
        assert_eq!(store.get("historicalTimes/5").unwrap(), None);
        assert_eq!(store.get("timingEvents/5").unwrap(), None);
    }

    #[test]
    fn out_of_range_delete_is_validation_error() {
        let store = MemoryStore::new();
        let mut engine = StatsEngine::new();
        let err = engine.delete_event(&store, &sku("9"), 0).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Validation(ValidationError::OutOfBounds { index: 0, len: 0, .. })
        ));
    }

    #[test]
    fn stats_report_fastest_and_total_cases() {
        let store = MemoryStore::new();
        let mut engine = StatsEngine::new();
        let s = sku("12");
        engine.record_event(&store, &s, TimingEvent::new(10.0, 5, at(0)).unwrap()).unwrap();
        engine.record_event(&store, &s, TimingEvent::new(3.0, 3, at(1)).unwrap()).unwrap();
        let stats = engine.stats(&s).unwrap();
        assert!((stats.fastest - 1.0).abs() < 1e-9);
        assert_eq!(stats.total_cases, 8);
        assert_eq!(stats.samples, 2);
        assert!((engine.estimate_secs(&s, 4).unwrap() - 6.0).abs() < 1e-9);
        assert!(engine.stats(&sku("13")).is_none());
    }

    #[test]
    fn snapshots_accept_keyed_maps() {
        let mut engine = StatsEngine::new();
        engine.apply_events_snapshot(Some(&json!({
            "77": {
                "-a": {"totalTime": 2.0, "cases": 1, "timePerCase": 2.0, "timestamp": "2026-03-02T10:00:00Z"},
                "-b": {"bogus": true}
            }
        })));
        engine.apply_averages_snapshot(Some(&json!({"77": 2.0, "x": 1.0})));
        assert_eq!(engine.events(&sku("77")).len(), 1);
        assert_eq!(engine.undecoded(&sku("77")).len(), 1);
        assert_eq!(engine.averages().len(), 1);
    }

    #[test]
    fn stats_need_events_not_a_stored_average() {
        let mut engine = StatsEngine::new();
        engine.apply_events_snapshot(None);
        engine.apply_averages_snapshot(Some(&json!({"77": 9.0})));
        assert!(engine.stats(&sku("77")).is_none());
        assert_eq!(engine.estimate_secs(&sku("77"), 2), Some(18.0));
    }

    #[test]
    fn stats_average_is_mean_of_events() {
        let mut engine = StatsEngine::new();
        engine.apply_events_snapshot(Some(&json!({
            "77": [
                {"totalTime": 2.0, "cases": 1, "timePerCase": 2.0, "timestamp": "2026-03-02T10:00:00Z"},
                {"totalTime": 4.0, "cases": 1, "timePerCase": 4.0, "timestamp": "2026-03-02T11:00:00Z"}
            ]
        })));
        engine.apply_averages_snapshot(Some(&json!({"77": 9.0})));
        let stats = engine.stats(&sku("77")).unwrap();
        assert!((stats.average - 3.0).abs() < 1e-9);
        assert!((stats.fastest - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rewrites_keep_undecodable_entries() {
        let store = MemoryStore::new();
        let bogus = json!({"bogus": true});
        store
            .set(
                "timingEvents/77",
                json!([
                    {"totalTime": 2.0, "cases": 1, "timePerCase": 2.0, "timestamp": "2026-03-02T10:00:00Z"},
                    bogus.clone()
                ]),
            )
            .unwrap();
        let mut engine = StatsEngine::new();
        engine.apply_events_snapshot(store.get("timingEvents").unwrap().as_ref());
        let s = sku("77");

        engine.record_event(&store, &s, TimingEvent::new(4.0, 1, at(0)).unwrap()).unwrap();
        let stored = store.get("timingEvents/77").unwrap().unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 3);
        assert!(stored.as_array().unwrap().contains(&bogus));

        engine.delete_event(&store, &s, 0).unwrap();
        engine.delete_event(&store, &s, 0).unwrap();
        assert_eq!(store.get("timingEvents/77").unwrap(), Some(json!([bogus])));
        assert_eq!(store.get("historicalTimes/77").unwrap(), None);
        assert!(engine.stats(&s).is_none());
    }
}
