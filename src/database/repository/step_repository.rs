//! Step repository.
//!
//! Generated fields are columns of the step row; writes only `$set` a
//! single column, so fields never clobber each other.

use anyhow::Result;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Collection;
use tracing::debug;

use super::is_duplicate_key;

use crate::database::models::Step;
use crate::database::Database;
use crate::generation::{Field, FieldValue, StepId};

/// Repository for steps and their generated fields.
#[derive(Clone)]
pub struct StepRepository {
    collection: Collection<Step>,
}

/// Storage representation of a field value.
fn field_bson(value: &FieldValue) -> Bson {
    match value {
        FieldValue::Text(text) | FieldValue::Url(text) => Bson::String(text.clone()),
        FieldValue::List(items) => Bson::Array(items.iter().cloned().map(Bson::String).collect()),
        FieldValue::Orientation(hint) => Bson::String(hint.to_stored()),
    }
}

fn step_filter(step: StepId) -> Document {
    doc! { "manual_id": step.manual_id, "step_number": step.step_number }
}

impl StepRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("steps"),
        }
    }

    /// Get a step row.
    pub async fn get(&self, step: StepId) -> Result<Option<Step>> {
        Ok(self.collection.find_one(step_filter(step)).await?)
    }

    /// All steps of a manual, ordered by step number.
    pub async fn for_manual(&self, manual_id: i32) -> Result<Vec<Step>> {
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "step_number": 1 })
            .build();

        let steps = self
            .collection
            .find(doc! { "manual_id": manual_id })
            .with_options(options)
            .await?
            .try_collect()
            .await?;
        Ok(steps)
    }

    /// Steps that have a source image but no value for `field`.
    pub async fn missing(&self, field: Field) -> Result<Vec<Step>> {
        let mut filter = doc! { "image_url": { "$nin": [Bson::Null, ""] } };
        // Matches both a missing column and an explicit null
        filter.insert(field.column(), Bson::Null);
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "manual_id": 1, "step_number": 1 })
            .build();

        let steps = self
            .collection
            .find(filter)
            .with_options(options)
            .await?
            .try_collect()
            .await?;
        Ok(steps)
    }

    /// Insert a bare step row unless one exists. Never overwrites.
    pub async fn ensure(&self, step: StepId, image_url: &str) -> Result<()> {
        let update = doc! {
            "$setOnInsert": {
                "manual_id": step.manual_id,
                "step_number": step.step_number,
                "image_url": image_url,
            }
        };
        let options = mongodb::options::UpdateOptions::builder()
            .upsert(true)
            .build();

        let result = match self
            .collection
            .update_one(step_filter(step), update)
            .with_options(options)
            .await
        {
            Ok(result) => result,
            // Lost an upsert race: the row exists, which is all we wanted
            Err(e) if is_duplicate_key(&e) => {
                debug!("Step {} provisioned concurrently", step);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if result.upserted_id.is_some() {
            debug!("Provisioned step {}", step);
        }
        Ok(())
    }

    /// Set one field on an existing row.
    ///
    /// Returns `false` when no row matched.
    pub async fn set_field(&self, step: StepId, field: Field, value: &FieldValue) -> Result<bool> {
        let mut set = Document::new();
        set.insert(field.column(), field_bson(value));
        let update = doc! { "$set": set };
        let result = self.collection.update_one(step_filter(step), update).await?;

        debug!("Set {} for step {} (matched: {})", field, step, result.matched_count);
        Ok(result.matched_count > 0)
    }
}
