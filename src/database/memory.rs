//! In-memory [`StepStore`] for tests.
//!
//! Can be switched to "unreachable" to exercise the degraded paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::models::{Manual, Step};
use super::StepStore;
use crate::generation::{Field, FieldValue, StepId};

#[derive(Default)]
pub struct MemoryStore {
    manuals: Mutex<BTreeMap<i32, Manual>>,
    steps: Mutex<BTreeMap<(i32, i32), Step>>,
    unreachable: AtomicBool,
    field_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one manual and the given steps, each with a diagram URL.
    pub fn with_steps(manual_id: i32, step_numbers: &[i32]) -> Self {
        let store = Self::new();
        store
            .manuals
            .lock()
            .insert(manual_id, Manual::placeholder(manual_id));
        for &number in step_numbers {
            let step = StepId::new(manual_id, number);
            store.steps.lock().insert(
                (manual_id, number),
                Step::new(step, format!("http://localhost:4000/manuals/{manual_id}/step{number}.png")),
            );
        }
        store
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of `get_field` calls that reached the store.
    pub fn field_reads(&self) -> usize {
        self.field_reads.load(Ordering::SeqCst)
    }

    pub fn step(&self, step: StepId) -> Option<Step> {
        self.steps.lock().get(&(step.manual_id, step.step_number)).cloned()
    }

    fn check(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl StepStore for MemoryStore {
    async fn get_field(&self, step: StepId, field: Field) -> Result<Option<FieldValue>> {
        self.field_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.step(step).and_then(|row| row.field(field)))
    }

    async fn put_field(&self, step: StepId, field: Field, value: &FieldValue) -> Result<bool> {
        self.check()?;
        let mut steps = self.steps.lock();
        match steps.get_mut(&(step.manual_id, step.step_number)) {
            Some(row) => {
                row.set_field(field, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ensure_entity(&self, manual: &Manual, step: StepId, image_url: &str) -> Result<()> {
        self.check()?;
        self.manuals
            .lock()
            .entry(manual.manual_id)
            .or_insert_with(|| manual.clone());
        self.steps
            .lock()
            .entry((step.manual_id, step.step_number))
            .or_insert_with(|| Step::new(step, image_url));
        Ok(())
    }

    async fn find_step(&self, step: StepId) -> Result<Option<Step>> {
        self.check()?;
        Ok(self.step(step))
    }

    async fn steps_for_manual(&self, manual_id: i32) -> Result<Vec<Step>> {
        self.check()?;
        Ok(self
            .steps
            .lock()
            .values()
            .filter(|s| s.manual_id == manual_id)
            .cloned()
            .collect())
    }

    async fn steps_missing(&self, field: Field) -> Result<Vec<Step>> {
        self.check()?;
        Ok(self
            .steps
            .lock()
            .values()
            .filter(|s| !s.image_url.is_empty() && s.field(field).is_none())
            .cloned()
            .collect())
    }

    async fn list_manuals(&self) -> Result<Vec<Manual>> {
        self.check()?;
        Ok(self.manuals.lock().values().cloned().collect())
    }

    async fn get_manual(&self, manual_id: i32) -> Result<Option<Manual>> {
        self.check()?;
        Ok(self.manuals.lock().get(&manual_id).cloned())
    }

    async fn delete_manual(&self, manual_id: i32) -> Result<bool> {
        self.check()?;
        self.steps.lock().retain(|_, s| s.manual_id != manual_id);
        Ok(self.manuals.lock().remove(&manual_id).is_some())
    }
}
