//! Shared setup for commands that touch the store.
//!
//! Every invocation opens the configured key-value backend, rebuilds the
//! controller from it and restores the device-local timers from the cache.
//! Timers and the focus session are written back on [`Context::save`].

use std::path::PathBuf;
use std::sync::Arc;

use produceroom_core::lifecycle::FocusSession;
use produceroom_core::storage::{data_dir, migrate_timing_data, StoreBackend};
use produceroom_core::{
    Config, FsBlobStore, ItemLifecycle, KvStore, LocalCache, MemoryStore, SqliteStore, SystemClock,
    TimeKeeper,
};
use serde::Serialize;

const TIMERS_KEY: &str = "time_keeper";
const FOCUS_KEY: &str = "focus_session";

pub struct Context {
    pub config: Config,
    pub data_dir: PathBuf,
    pub cache: Arc<LocalCache>,
    pub lifecycle: ItemLifecycle,
}

impl Context {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let data_dir = data_dir()?;
        let config = Config::load()?;
        let store: Arc<dyn KvStore> = match config.store.backend {
            StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.store_path(&data_dir))?),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        let cache = Arc::new(LocalCache::open_at(&data_dir.join("cache.db"))?);
        migrate_on_open(&cache, store.as_ref());

        let mut lifecycle = ItemLifecycle::new(store, Arc::new(SystemClock))
            .with_timers(load_timers(&cache))
            .with_focus(load_focus(&cache))
            .with_retention(config.retention())
            .with_cache(cache.clone());
        lifecycle.load()?;
        tracing::debug!(dir = %data_dir.display(), "context opened");

        Ok(Self {
            config,
            data_dir,
            cache,
            lifecycle,
        })
    }

    pub fn blobs(&self) -> FsBlobStore {
        FsBlobStore::new(self.config.blob_root(&self.data_dir))
    }

    /// Persist timers and the focus session to the cache.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let timers = serde_json::to_string(self.lifecycle.timers())?;
        self.cache.kv_set(TIMERS_KEY, &timers)?;
        match self.lifecycle.focus() {
            Some(session) => self.cache.kv_set(FOCUS_KEY, &serde_json::to_string(session)?)?,
            None => self.cache.kv_delete(FOCUS_KEY)?,
        }
        Ok(())
    }
}

/// One-time copy of cached timing history into the store. A failure is
/// retried on the next invocation.
fn migrate_on_open(cache: &LocalCache, store: &dyn KvStore) {
    if let Err(e) = migrate_timing_data(cache, store) {
        tracing::warn!(error = %e, "timing data migration failed");
    }
}

fn load_timers(cache: &LocalCache) -> TimeKeeper {
    if let Ok(Some(json)) = cache.kv_get(TIMERS_KEY) {
        match serde_json::from_str::<TimeKeeper>(&json) {
            Ok(timers) => return timers,
            Err(e) => tracing::warn!(error = %e, "discarding unreadable timers"),
        }
    }
    TimeKeeper::new()
}

fn load_focus(cache: &LocalCache) -> Option<FocusSession> {
    let json = cache.kv_get(FOCUS_KEY).ok().flatten()?;
    serde_json::from_str(&json).ok()
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
