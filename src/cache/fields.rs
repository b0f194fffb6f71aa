//! Moka cache of generated step fields.

use moka::sync::Cache;
use tracing::warn;

use super::CacheConfig;
use crate::generation::{FieldValue, GenerationKey};

/// Positive lookups only: an absent entry says nothing about the store.
///
/// Cloning is cheap and shares the same underlying cache.
#[derive(Clone)]
pub struct FieldCache {
    inner: Cache<GenerationKey, FieldValue>,
}

impl FieldCache {
    pub fn new(config: CacheConfig) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(config.max_capacity)
            .support_invalidation_closures();

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner: builder.build(),
        }
    }

    pub fn get(&self, key: &GenerationKey) -> Option<FieldValue> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: GenerationKey, value: FieldValue) {
        self.inner.insert(key, value);
    }

    /// Drop every field of a deleted manual.
    pub fn forget_manual(&self, manual_id: i32) {
        if let Err(e) = self
            .inner
            .invalidate_entries_if(move |key, _| key.step.manual_id == manual_id)
        {
            // Only possible without invalidation closure support
            warn!("Could not evict fields of manual {}: {}", manual_id, e);
            self.inner.invalidate_all();
        }
    }
}

impl std::fmt::Debug for FieldCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCache")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}
