//! # Produceroom Core Library
//!
//! This library provides the core logic for the produce-processing
//! checklist: per-item timers, per-SKU historical timing statistics and
//! the shared priority list. It follows a CLI-first philosophy; the
//! `produceroom` binary is a thin layer over the same core.
//!
//! ## Architecture
//!
//! - **TimeKeeper**: A wall-clock-based stopwatch per item that the caller
//!   queries with the current instant; no internal threads
//! - **StatsEngine**: Append-only timing events per SKU and their derived
//!   average, fastest time and case totals
//! - **PriorityRegistry**: Deduplicated, ordered set of priority labels
//! - **ItemLifecycle**: The single controller that moves items through
//!   queued, timing and completed states and writes the store
//! - **Store**: Real-time key-value and blob store traits with SQLite,
//!   in-memory and filesystem backends
//! - **Storage**: TOML configuration and the device-local SQLite cache
//!
//! ## Key Components
//!
//! - [`ItemLifecycle`]: Orchestrates every operator action
//! - [`TimeKeeper`]: Timer state machine
//! - [`StatsEngine`]: Timing history
//! - [`KvStore`]: Trait for the shared state store
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod item;
pub mod lifecycle;
pub mod media;
pub mod priority;
pub mod stats;
pub mod storage;
pub mod store;
pub mod timer;

pub use error::{ConfigError, CoreError, LifecycleError, MediaError, StoreError, ValidationError};
pub use events::Event;
pub use item::{CompletedItem, Item, NewItem, Priority, Sku};
pub use lifecycle::{DayStatus, ItemLifecycle, ItemState, PurgeReport};
pub use media::{CompletionPhoto, Recording, VideoLibrary};
pub use priority::PriorityRegistry;
pub use stats::{Progress, SkuStats, StatsEngine, TimingEvent};
pub use storage::{Config, LocalCache};
pub use store::{BlobStore, FsBlobStore, KvStore, MemoryStore, SqliteStore, StoreEvent};
pub use timer::{Clock, Housekeeping, ManualClock, SystemClock, TimeKeeper, TimerState};
