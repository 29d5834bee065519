//! Device-local SQLite cache.
//!
//! Holds media and timing data mirrored per SKU for offline use, plus a
//! small string key-value table for device state such as persisted timers
//! and the one-time migration flag.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::data_dir;
use crate::error::{CacheError, CoreError};

/// Cache buckets, each keyed by SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBucket {
    Videos,
    HistoricalTimes,
    TimingEvents,
    CompletionPhotos,
}

impl CacheBucket {
    pub const ALL: [CacheBucket; 4] = [
        CacheBucket::Videos,
        CacheBucket::HistoricalTimes,
        CacheBucket::TimingEvents,
        CacheBucket::CompletionPhotos,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheBucket::Videos => "videos",
            CacheBucket::HistoricalTimes => "historicalTimes",
            CacheBucket::TimingEvents => "timingEvents",
            CacheBucket::CompletionPhotos => "completionPhotos",
        }
    }
}

/// SQLite cache at `<data dir>/cache.db`.
pub struct LocalCache {
    conn: Connection,
}

impl LocalCache {
    /// Open the cache in the data directory.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("cache.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|source| CacheError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let cache = Self { conn };
        cache.migrate()?;
        Ok(cache)
    }

    /// Open an in-memory cache (for tests).
    pub fn open_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.migrate()?;
        Ok(cache)
    }

    fn migrate(&self) -> Result<(), CacheError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS entries (
                bucket TEXT NOT NULL,
                id     TEXT NOT NULL,
                value  TEXT NOT NULL,
                PRIMARY KEY (bucket, id)
            );",
        )?;
        Ok(())
    }

    // ── Key-value ──

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), CacheError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Buckets ──

    pub fn put<T: Serialize + ?Sized>(&self, bucket: CacheBucket, id: &str, value: &T) -> Result<(), CacheError> {
        let json = serde_json::to_string(value).map_err(|e| CacheError::Corrupt {
            bucket: bucket.as_str().to_string(),
            id: id.to_string(),
            message: e.to_string(),
        })?;
        self.conn.execute(
            "INSERT OR REPLACE INTO entries (bucket, id, value) VALUES (?1, ?2, ?3)",
            params![bucket.as_str(), id, json],
        )?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, bucket: CacheBucket, id: &str) -> Result<Option<T>, CacheError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM entries WHERE bucket = ?1 AND id = ?2",
                params![bucket.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|text| decode_entry(bucket, id, &text)).transpose()
    }

    /// Every entry of `bucket`, keyed by id.
    pub fn all<T: DeserializeOwned>(&self, bucket: CacheBucket) -> Result<BTreeMap<String, T>, CacheError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, value FROM entries WHERE bucket = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![bucket.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (id, text) = row?;
            let value = decode_entry(bucket, &id, &text)?;
            out.insert(id, value);
        }
        Ok(out)
    }

    pub fn delete(&self, bucket: CacheBucket, id: &str) -> Result<(), CacheError> {
        self.conn.execute(
            "DELETE FROM entries WHERE bucket = ?1 AND id = ?2",
            params![bucket.as_str(), id],
        )?;
        Ok(())
    }

    pub fn count(&self, bucket: CacheBucket) -> Result<u64, CacheError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE bucket = ?1",
            params![bucket.as_str()],
            |row| row.get(0),
        )?)
    }
}

fn decode_entry<T: DeserializeOwned>(bucket: CacheBucket, id: &str, text: &str) -> Result<T, CacheError> {
    serde_json::from_str(text).map_err(|e| CacheError::Corrupt {
        bucket: bucket.as_str().to_string(),
        id: id.to_string(),
        message: e.to_string(),
    })
}
