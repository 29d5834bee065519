//! Core error types for produceroom-core.
//!
//! This module defines the error hierarchy using thiserror. Nothing in the
//! core is fatal: every variant describes an operation that did not take
//! effect, leaving state consistent with the last successful store read.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for produceroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Local cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Item lifecycle errors
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Media errors
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a key-value or blob store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store cannot be reached; the operation was abandoned.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A path was empty or contained an invalid segment
    #[error("Invalid store path '{0}'")]
    InvalidPath(String),

    /// Blob not present at path
    #[error("No object at '{0}'")]
    NotFound(String),

    /// A stored value did not have the expected shape
    #[error("Malformed value at '{path}': {message}")]
    Malformed { path: String, message: String },

    /// Backend failure
    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to open cache database
    #[error("Failed to open cache at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Cache is locked")]
    Locked,

    /// Cached value could not be decoded
    #[error("Corrupt cache entry {bucket}/{id}: {message}")]
    Corrupt {
        bucket: String,
        id: String,
        message: String,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Out of bounds
    #[error("Index {index} out of bounds for {collection} (length: {len})")]
    OutOfBounds {
        collection: String,
        index: usize,
        len: usize,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Required field missing or blank
    #[error("Missing required field: {0}")]
    Required(&'static str),
}

/// Illegal item state transitions.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Item '{0}' is not in the active set")]
    NotActive(String),

    #[error("Item '{0}' is not in the completed set")]
    NotCompleted(String),

    #[error("Item '{id}' is already timing")]
    AlreadyTiming { id: String },

    #[error("Item '{id}' has no running or paused timer")]
    NotTiming { id: String },

    #[error("Another item is being processed: '{0}'")]
    FocusBusy(String),

    #[error("No item is being processed")]
    NoFocus,
}

/// Media capture and library errors. Each variant carries the message shown
/// to the operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Camera access denied.")]
    PermissionDenied,

    #[error("No camera found.")]
    DeviceNotFound,

    #[error("Could not access camera: {0}")]
    Device(String),

    #[error("No video data was recorded.")]
    NoData,

    #[error("Video blob is empty or invalid")]
    EmptyVideo,

    #[error("Item has no SKU number.")]
    NoSku,

    #[error("Recording was cancelled.")]
    Cancelled,
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    CacheError::Locked
                } else {
                    CacheError::QueryFailed(err.to_string())
                }
            }
            _ => CacheError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
