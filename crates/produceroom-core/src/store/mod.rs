//! Storage collaborators.
//!
//! The core talks to two external services through traits:
//!
//! - [`KvStore`]: a real-time key-value tree addressed by slash paths, with
//!   change subscriptions (the shared state of every operator client).
//! - [`BlobStore`]: binary objects such as instructional videos.
//!
//! Any backend satisfying these contracts can be substituted. This crate
//! ships [`MemoryStore`] and [`SqliteStore`] for the key-value side and
//! [`FsBlobStore`] for blobs.

mod blob;
mod memory;
mod sqlite;
pub mod tree;
mod watch;

pub use blob::{BlobEntry, BlobMeta, BlobStore, FsBlobStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use watch::{StoreEvent, SubscriptionId, Subscribers};

use std::sync::mpsc::Sender;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Store paths used by the application.
pub mod paths {
    use crate::item::Sku;

    pub const ITEMS: &str = "items";
    pub const COMPLETED_ITEMS: &str = "completedItems";
    pub const TIMING_DATA: &str = "timingData";
    pub const TIMING_EVENTS: &str = "timingEvents";
    pub const HISTORICAL_TIMES: &str = "historicalTimes";
    pub const HISTORICAL_PRIORITIES: &str = "historicalPriorities";
    pub const COMPLETION_PHOTOS: &str = "completionPhotos";
    pub const PDF_DATE: &str = "pdfDate";
    pub const TOTAL_CASES: &str = "totalCases";
    /// Connectivity pseudo-path; reads as a boolean.
    pub const CONNECTED: &str = ".info/connected";

    /// Blob prefix for per-SKU instructional videos.
    pub const VIDEOS_PREFIX: &str = "produce-videos";
    /// Blob prefix for source data files.
    pub const DATA_FILES_PREFIX: &str = "produce-pdfs";

    pub fn item(id: &str) -> String {
        format!("{ITEMS}/{id}")
    }

    pub fn completed_item(id: &str) -> String {
        format!("{COMPLETED_ITEMS}/{id}")
    }

    pub fn timing_data(id: &str) -> String {
        format!("{TIMING_DATA}/{id}")
    }

    pub fn timing_events(sku: &Sku) -> String {
        format!("{TIMING_EVENTS}/{sku}")
    }

    pub fn historical_time(sku: &Sku) -> String {
        format!("{HISTORICAL_TIMES}/{sku}")
    }

    pub fn completion_photo(sku: &Sku) -> String {
        format!("{COMPLETION_PHOTOS}/{sku}")
    }

    pub fn video(sku: &Sku) -> String {
        format!("{VIDEOS_PREFIX}/{sku}.webm")
    }
}

/// Real-time key-value store.
///
/// Values are JSON trees. Writing `null` removes a node; removing an absent
/// node is a no-op. Subscribers receive the current value of their path once
/// on registration and again after every write that touches it.
pub trait KvStore: Send + Sync {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Apply several child writes under `path`. Keys may themselves be
    /// relative paths.
    fn update(&self, path: &str, patch: Map<String, Value>) -> Result<(), StoreError>;

    fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// A fresh child key under `path`, unique across clients.
    fn push_key(&self, path: &str) -> Result<String, StoreError>;

    fn subscribe(&self, path: &str, sink: Sender<StoreEvent>) -> Result<SubscriptionId, StoreError>;

    fn unsubscribe(&self, id: SubscriptionId);

    fn is_connected(&self) -> bool;
}

/// Read and decode the value at `path`.
pub fn read<T: DeserializeOwned>(store: &dyn KvStore, path: &str) -> Result<Option<T>, StoreError> {
    store.get(path)?.map(|v| decode(path, v)).transpose()
}

/// Encode and write `value` at `path`.
pub fn write<T: Serialize + ?Sized>(store: &dyn KvStore, path: &str, value: &T) -> Result<(), StoreError> {
    store.set(path, serde_json::to_value(value)?)
}

pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Malformed {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Unique child key: a millisecond timestamp prefix keeps keys roughly
/// chronological, the random suffix keeps them unique across clients.
pub(crate) fn new_push_key() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{millis:012x}{}", &suffix[..12])
}
