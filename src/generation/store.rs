//! Best-effort cache over the durable store.
//!
//! Source of truth for "has this field been generated". A store fault is
//! never an error for the caller: reads degrade to a miss (so the field
//! gets regenerated) and writes become no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{FieldValue, GenerationKey, StepId};
use crate::cache::{CacheConfig, FieldCache};
use crate::database::{Manual, Step, StepStore};

/// Outcome of a lookup that must tell "absent" apart from "can't say".
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
    Unavailable,
}

/// Durable field cache with a moka front.
#[derive(Clone)]
pub struct CacheStore {
    backend: Option<Arc<dyn StepStore>>,
    front: FieldCache,
    degraded: Arc<AtomicBool>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn StepStore>) -> Self {
        Self::with_backend(Some(backend))
    }

    /// Store with no durable backend: every read is a miss.
    pub fn disabled() -> Self {
        Self::with_backend(None)
    }

    fn with_backend(backend: Option<Arc<dyn StepStore>>) -> Self {
        Self {
            backend,
            front: FieldCache::new(CacheConfig::default()),
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the front cache with one sized by `config`.
    #[must_use]
    pub fn with_front_cache(mut self, config: CacheConfig) -> Self {
        self.front = FieldCache::new(config);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Cached value for `key`, `None` when absent or when the store is unreachable.
    pub async fn get(&self, key: GenerationKey) -> Option<FieldValue> {
        if let Some(value) = self.front.get(&key) {
            return Some(value);
        }

        let backend = self.backend.as_ref()?;
        match backend.get_field(key.step, key.field).await {
            Ok(value) => {
                self.mark_healthy();
                if let Some(v) = &value {
                    self.front.insert(key, v.clone());
                }
                value
            }
            Err(e) => {
                self.mark_degraded("get", &e);
                None
            }
        }
    }

    /// Write a generated value. Silently gives up when the store is unreachable.
    ///
    /// The step row must already exist, see [`Self::ensure_entity_exists`].
    pub async fn put(&self, key: GenerationKey, value: &FieldValue) {
        let Some(backend) = &self.backend else {
            return;
        };

        match backend.put_field(key.step, key.field, value).await {
            Ok(true) => {
                self.mark_healthy();
                self.front.insert(key, value.clone());
            }
            Ok(false) => {
                self.mark_healthy();
                debug!("No step row for {}, value not persisted", key);
            }
            Err(e) => self.mark_degraded("put", &e),
        }
    }

    /// Insert-if-absent for the manual and the step row.
    ///
    /// `manual` supplies name and slug; placeholders are used otherwise.
    pub async fn ensure_entity_exists(&self, step: StepId, image_url: &str, manual: Option<Manual>) {
        let Some(backend) = &self.backend else {
            return;
        };

        let manual = manual.unwrap_or_else(|| Manual::placeholder(step.manual_id));
        match backend.ensure_entity(&manual, step, image_url).await {
            Ok(()) => self.mark_healthy(),
            Err(e) => self.mark_degraded("ensure_entity", &e),
        }
    }

    pub async fn find_step(&self, step: StepId) -> Lookup<Step> {
        let Some(backend) = &self.backend else {
            return Lookup::Unavailable;
        };
        match backend.find_step(step).await {
            Ok(Some(row)) => {
                self.mark_healthy();
                Lookup::Found(row)
            }
            Ok(None) => {
                self.mark_healthy();
                Lookup::Missing
            }
            Err(e) => {
                self.mark_degraded("find_step", &e);
                Lookup::Unavailable
            }
        }
    }

    pub async fn get_manual(&self, manual_id: i32) -> Lookup<Manual> {
        let Some(backend) = &self.backend else {
            return Lookup::Unavailable;
        };
        match backend.get_manual(manual_id).await {
            Ok(Some(manual)) => {
                self.mark_healthy();
                Lookup::Found(manual)
            }
            Ok(None) => {
                self.mark_healthy();
                Lookup::Missing
            }
            Err(e) => {
                self.mark_degraded("get_manual", &e);
                Lookup::Unavailable
            }
        }
    }

    /// Delete a manual and its steps. `Found(())` on success.
    pub async fn delete_manual(&self, manual_id: i32) -> Lookup<()> {
        let Some(backend) = &self.backend else {
            return Lookup::Unavailable;
        };
        match backend.delete_manual(manual_id).await {
            Ok(true) => {
                self.mark_healthy();
                self.front.forget_manual(manual_id);
                Lookup::Found(())
            }
            Ok(false) => {
                self.mark_healthy();
                Lookup::Missing
            }
            Err(e) => {
                self.mark_degraded("delete_manual", &e);
                Lookup::Unavailable
            }
        }
    }

    /// All manuals; empty when the store is disabled or unreachable.
    pub async fn list_manuals(&self) -> Vec<Manual> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        match backend.list_manuals().await {
            Ok(manuals) => {
                self.mark_healthy();
                manuals
            }
            Err(e) => {
                self.mark_degraded("list_manuals", &e);
                Vec::new()
            }
        }
    }

    /// Steps of a manual; empty when the store is disabled or unreachable.
    pub async fn steps_for_manual(&self, manual_id: i32) -> Vec<Step> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        match backend.steps_for_manual(manual_id).await {
            Ok(steps) => {
                self.mark_healthy();
                steps
            }
            Err(e) => {
                self.mark_degraded("steps_for_manual", &e);
                Vec::new()
            }
        }
    }

    /// Steps with a source image but no value for `field`.
    pub async fn steps_missing(&self, field: super::Field) -> Vec<Step> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        match backend.steps_missing(field).await {
            Ok(steps) => {
                self.mark_healthy();
                steps
            }
            Err(e) => {
                self.mark_degraded("steps_missing", &e);
                Vec::new()
            }
        }
    }

    fn mark_degraded(&self, operation: &str, error: &anyhow::Error) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!("Store unreachable during {}, serving cache misses: {}", operation, error);
        } else {
            debug!("Store still unreachable during {}: {}", operation, error);
        }
    }

    fn mark_healthy(&self) {
        if self.degraded.swap(false, Ordering::Relaxed) {
            info!("Store reachable again");
        }
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("enabled", &self.is_enabled())
            .field("front", &self.front)
            .finish()
    }
}
