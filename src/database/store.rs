//! Durable store seam.
//!
//! [`StepStore`] is everything the rest of the service needs from the
//! database. Errors are reported as-is here; the degrade-to-miss policy
//! lives one level up in [`crate::generation::CacheStore`].

use anyhow::Result;
use async_trait::async_trait;

use super::models::{Manual, Step};
use super::repository::{ManualRepository, StepRepository};
use super::Database;
use crate::generation::{Field, FieldValue, StepId};

/// Durable manual/step storage.
#[async_trait]
pub trait StepStore: Send + Sync {
    /// Current value of one field, `None` if the row or the value is absent.
    async fn get_field(&self, step: StepId, field: Field) -> Result<Option<FieldValue>>;

    /// Upsert one field on an existing row. Returns `false` when the row is missing.
    async fn put_field(&self, step: StepId, field: Field, value: &FieldValue) -> Result<bool>;

    /// Insert the manual and the step row if absent. Idempotent.
    async fn ensure_entity(&self, manual: &Manual, step: StepId, image_url: &str) -> Result<()>;

    async fn find_step(&self, step: StepId) -> Result<Option<Step>>;

    /// Steps of a manual ordered by step number.
    async fn steps_for_manual(&self, manual_id: i32) -> Result<Vec<Step>>;

    /// Steps with a source image but no value for `field`.
    async fn steps_missing(&self, field: Field) -> Result<Vec<Step>>;

    async fn list_manuals(&self) -> Result<Vec<Manual>>;

    async fn get_manual(&self, manual_id: i32) -> Result<Option<Manual>>;

    /// Delete a manual and its steps. Returns `false` if it did not exist.
    async fn delete_manual(&self, manual_id: i32) -> Result<bool>;
}

/// MongoDB-backed [`StepStore`].
#[derive(Clone)]
pub struct MongoStore {
    manuals: ManualRepository,
    steps: StepRepository,
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        Self {
            manuals: ManualRepository::new(db),
            steps: StepRepository::new(db),
        }
    }
}

#[async_trait]
impl StepStore for MongoStore {
    async fn get_field(&self, step: StepId, field: Field) -> Result<Option<FieldValue>> {
        Ok(self.steps.get(step).await?.and_then(|row| row.field(field)))
    }

    async fn put_field(&self, step: StepId, field: Field, value: &FieldValue) -> Result<bool> {
        self.steps.set_field(step, field, value).await
    }

    async fn ensure_entity(&self, manual: &Manual, step: StepId, image_url: &str) -> Result<()> {
        // Manual first: a step must always reference an existing manual
        self.manuals.ensure(manual).await?;
        self.steps.ensure(step, image_url).await
    }

    async fn find_step(&self, step: StepId) -> Result<Option<Step>> {
        self.steps.get(step).await
    }

    async fn steps_for_manual(&self, manual_id: i32) -> Result<Vec<Step>> {
        self.steps.for_manual(manual_id).await
    }

    async fn steps_missing(&self, field: Field) -> Result<Vec<Step>> {
        self.steps.missing(field).await
    }

    async fn list_manuals(&self) -> Result<Vec<Manual>> {
        self.manuals.list().await
    }

    async fn get_manual(&self, manual_id: i32) -> Result<Option<Manual>> {
        self.manuals.get(manual_id).await
    }

    async fn delete_manual(&self, manual_id: i32) -> Result<bool> {
        self.manuals.delete(manual_id).await
    }
}
