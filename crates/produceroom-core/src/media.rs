//! Media attached to items: per-SKU instructional videos and completion
//! photos.
//!
//! Device capture and encoding live outside the core. What is modelled here
//! is the part with rules: where media is stored, which recording format is
//! chosen, and that a cancelled or empty recording never persists anything.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MediaError, Result};
use crate::item::Sku;
use crate::storage::{CacheBucket, LocalCache};
use crate::store::{paths, BlobEntry, BlobMeta, BlobStore};

/// Recording formats in order of preference.
pub const RECORDING_MIME_PREFERENCE: [&str; 3] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// Content type stored for uploaded videos.
pub const VIDEO_CONTENT_TYPE: &str = "video/webm";

/// First preferred format the recorder supports, or `None` to let the
/// recorder choose its default.
pub fn pick_recording_mime(supported: impl Fn(&str) -> bool) -> Option<&'static str> {
    RECORDING_MIME_PREFERENCE.into_iter().find(|m| supported(m))
}

/// Map a capture-device failure name to the operator-facing error.
pub fn device_error(name: &str) -> MediaError {
    match name {
        "NotAllowedError" | "PermissionDeniedError" => MediaError::PermissionDenied,
        "NotFoundError" | "DevicesNotFoundError" => MediaError::DeviceNotFound,
        other => MediaError::Device(other.to_string()),
    }
}

/// SKU named by `target`: either a bare SKU (`77`, `#77`) or an item name
/// carrying one (`Kale #77`).
pub fn resolve_sku(target: &str) -> Result<Sku, MediaError> {
    Sku::parse(target)
        .ok()
        .or_else(|| Sku::from_name(target))
        .ok_or(MediaError::NoSku)
}

/// An in-flight recording. Chunks accumulate until the recording is
/// finished or cancelled.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    mime: Option<String>,
    chunks: Vec<Vec<u8>>,
}

impl Recording {
    pub fn new(mime: Option<&str>) -> Self {
        Self {
            mime: mime.map(str::to_string),
            chunks: Vec::new(),
        }
    }

    /// Empty chunks are dropped.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenate the chunks. Fails with [`MediaError::NoData`] when
    /// nothing was captured.
    pub fn finish(self) -> Result<(Vec<u8>, Option<String>), MediaError> {
        if self.chunks.is_empty() {
            return Err(MediaError::NoData);
        }
        Ok((self.chunks.concat(), self.mime))
    }

    /// Discard everything captured so far.
    pub fn cancel(self) -> MediaError {
        tracing::debug!(bytes = self.len(), "recording discarded");
        MediaError::Cancelled
    }
}

/// Photo taken when an item is completed, stored at `completionPhotos/<sku>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionPhoto {
    /// `data:` URL holding the JPEG.
    pub data: String,
    pub timestamp: DateTime<Utc>,
}

impl CompletionPhoto {
    pub fn from_jpeg(bytes: &[u8], timestamp: DateTime<Utc>) -> Self {
        Self {
            data: format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)),
            timestamp,
        }
    }

    /// Raw image bytes, when `data` is a base64 data URL.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.data.split_once(";base64,")?;
        STANDARD.decode(payload).ok()
    }
}

/// Device-cache copy of a saved video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedVideo {
    pub meta: BlobMeta,
    /// Base64 of the video bytes.
    pub data: String,
}

/// Per-SKU videos in the blob store, optionally mirrored into the device
/// cache for offline playback.
pub struct VideoLibrary<'a> {
    blobs: &'a dyn BlobStore,
    cache: Option<&'a LocalCache>,
}

impl<'a> VideoLibrary<'a> {
    pub fn new(blobs: &'a dyn BlobStore) -> Self {
        Self { blobs, cache: None }
    }

    pub fn with_cache(mut self, cache: &'a LocalCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn save(&self, sku: &Sku, bytes: &[u8]) -> Result<BlobMeta> {
        if bytes.is_empty() {
            return Err(MediaError::EmptyVideo.into());
        }
        let meta = self
            .blobs
            .upload(&paths::video(sku), bytes, VIDEO_CONTENT_TYPE)?;
        if let Some(cache) = self.cache {
            let cached = CachedVideo {
                meta: meta.clone(),
                data: STANDARD.encode(bytes),
            };
            if let Err(e) = cache.put(CacheBucket::Videos, sku.as_str(), &cached) {
                tracing::warn!(%sku, error = %e, "video not mirrored to cache");
            }
        }
        tracing::info!(%sku, size = meta.size, "video saved");
        Ok(meta)
    }

    /// Finish `recording` and store it for `sku`.
    pub fn save_recording(&self, sku: &Sku, recording: Recording) -> Result<BlobMeta> {
        let (bytes, _) = recording.finish()?;
        self.save(sku, &bytes)
    }

    /// Video bytes from the blob store, or from the cache when the blob
    /// store read fails.
    pub fn load(&self, sku: &Sku) -> Result<Vec<u8>> {
        match self.blobs.download(&paths::video(sku)) {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                let cached: Option<CachedVideo> = match self.cache {
                    Some(cache) => cache.get(CacheBucket::Videos, sku.as_str())?,
                    None => None,
                };
                match cached.and_then(|c| STANDARD.decode(c.data).ok()) {
                    Some(bytes) => Ok(bytes),
                    None => Err(err.into()),
                }
            }
        }
    }

    pub fn delete(&self, sku: &Sku) -> Result<()> {
        self.blobs.delete(&paths::video(sku))?;
        if let Some(cache) = self.cache {
            cache.delete(CacheBucket::Videos, sku.as_str())?;
        }
        Ok(())
    }

    pub fn url(&self, sku: &Sku) -> Result<Option<Url>> {
        Ok(self.blobs.url(&paths::video(sku))?)
    }

    pub fn has_video(&self, sku: &Sku) -> Result<bool> {
        Ok(self.url(sku)?.is_some())
    }

    /// Stored videos keyed by SKU. Files not named `<digits>.webm` are
    /// ignored.
    pub fn list(&self) -> Result<BTreeMap<Sku, BlobEntry>> {
        let entries = self.blobs.list(paths::VIDEOS_PREFIX)?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let stem = entry.name.strip_suffix(".webm")?;
                let sku = Sku::parse(stem).ok()?;
                Some((sku, entry))
            })
            .collect())
    }
}
