//! Completion photos, one per SKU. The store copy is authoritative; the
//! device cache holds a mirror that is read when the store cannot be.

use super::{logged, ItemLifecycle};
use crate::error::Result;
use crate::events::Event;
use crate::item::Sku;
use crate::media::CompletionPhoto;
use crate::storage::{CacheBucket, LocalCache};
use crate::store::{self, paths};

impl ItemLifecycle {
    pub fn cache(&self) -> Option<&LocalCache> {
        self.cache.as_deref()
    }

    /// The SKU's photo, from the store or, if that read fails, the cache.
    pub fn completion_photo(&self, sku: &Sku) -> Result<Option<CompletionPhoto>> {
        match store::read(self.store.as_ref(), &paths::completion_photo(sku)) {
            Ok(photo) => Ok(photo),
            Err(err) => match self.cache() {
                Some(cache) => {
                    tracing::debug!(%sku, error = %err, "reading completion photo from cache");
                    Ok(cache.get(CacheBucket::CompletionPhotos, sku.as_str())?)
                }
                None => Err(err.into()),
            },
        }
    }

    /// Remove the SKU's photo from the store and the cache.
    pub fn delete_completion_photo(&mut self, sku: &Sku) -> Result<Event> {
        self.store
            .remove(&paths::completion_photo(sku))
            .map_err(|e| logged("delete completion photo", e))?;
        if let Some(cache) = self.cache() {
            if let Err(e) = cache.delete(CacheBucket::CompletionPhotos, sku.as_str()) {
                tracing::warn!(%sku, error = %e, "cached photo not removed");
            }
        }
        tracing::info!(%sku, "completion photo deleted");
        Ok(Event::CompletionPhotoDeleted {
            sku: sku.clone(),
            at: self.now(),
        })
    }

    pub(super) fn mirror_photo(&self, sku: &Sku, photo: &CompletionPhoto) {
        if let Some(cache) = self.cache() {
            if let Err(e) = cache.put(CacheBucket::CompletionPhotos, sku.as_str(), photo) {
                tracing::warn!(%sku, error = %e, "completion photo not mirrored to cache");
            }
        }
    }
}
