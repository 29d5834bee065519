//! One-time move of cached timing history into the shared store.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{CacheBucket, LocalCache};
use crate::error::Result;
use crate::store::{paths, KvStore};

/// Cache kv key set once timing data has been copied.
pub const MIGRATION_FLAG: &str = "timing_data_migrated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    AlreadyMigrated,
    Migrated { averages: usize, sequences: usize },
}

/// Copy cached averages and timing events to the store, once per device.
///
/// Empty buckets are not written, so an empty cache cannot wipe data other
/// clients already uploaded. The flag is set only after both writes
/// succeeded.
pub fn migrate_timing_data(cache: &LocalCache, store: &dyn KvStore) -> Result<MigrationOutcome> {
    if cache.kv_get(MIGRATION_FLAG)?.is_some() {
        return Ok(MigrationOutcome::AlreadyMigrated);
    }

    let averages: Map<String, Value> = cache
        .all::<Value>(CacheBucket::HistoricalTimes)?
        .into_iter()
        .collect();
    let sequences: Map<String, Value> = cache
        .all::<Value>(CacheBucket::TimingEvents)?
        .into_iter()
        .collect();

    let outcome = MigrationOutcome::Migrated {
        averages: averages.len(),
        sequences: sequences.len(),
    };
    if !averages.is_empty() {
        store.set(paths::HISTORICAL_TIMES, Value::Object(averages))?;
    }
    if !sequences.is_empty() {
        store.set(paths::TIMING_EVENTS, Value::Object(sequences))?;
    }
    cache.kv_set(MIGRATION_FLAG, "true")?;
    tracing::info!(?outcome, "timing data migration finished");
    Ok(outcome)
}
