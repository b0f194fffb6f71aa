//! Manual repository.

use anyhow::Result;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Collection;
use tracing::debug;

use super::is_duplicate_key;

use crate::database::models::{Manual, Step};
use crate::database::Database;

/// Repository for manuals.
#[derive(Clone)]
pub struct ManualRepository {
    collection: Collection<Manual>,
    steps: Collection<Step>,
}

impl ManualRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("manuals"),
            steps: db.collection("steps"),
        }
    }

    /// Get a manual by its public ID.
    pub async fn get(&self, manual_id: i32) -> Result<Option<Manual>> {
        let filter = doc! { "manual_id": manual_id };
        Ok(self.collection.find_one(filter).await?)
    }

    /// All manuals, ordered by ID.
    pub async fn list(&self) -> Result<Vec<Manual>> {
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "manual_id": 1 })
            .build();

        let manuals = self
            .collection
            .find(doc! {})
            .with_options(options)
            .await?
            .try_collect()
            .await?;
        Ok(manuals)
    }

    /// Insert the manual unless one with the same ID exists. Never overwrites.
    pub async fn ensure(&self, manual: &Manual) -> Result<()> {
        let filter = doc! { "manual_id": manual.manual_id };
        let update = doc! {
            "$setOnInsert": {
                "manual_id": manual.manual_id,
                "name": &manual.name,
                "slug": &manual.slug,
                "description": manual.description.as_deref(),
                "product_image_url": manual.product_image_url.as_deref(),
            }
        };
        let options = mongodb::options::UpdateOptions::builder()
            .upsert(true)
            .build();

        let result = match self
            .collection
            .update_one(filter, update)
            .with_options(options)
            .await
        {
            Ok(result) => result,
            // Lost an upsert race: the row exists, which is all we wanted
            Err(e) if is_duplicate_key(&e) => {
                debug!("Manual {} provisioned concurrently", manual.manual_id);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if result.upserted_id.is_some() {
            debug!("Provisioned manual {}", manual.manual_id);
        }
        Ok(())
    }

    /// Delete a manual together with its steps.
    ///
    /// Returns `false` if no such manual existed.
    pub async fn delete(&self, manual_id: i32) -> Result<bool> {
        let filter = doc! { "manual_id": manual_id };

        // Steps first so a failure never leaves orphans behind
        let steps = self.steps.delete_many(filter.clone()).await?;
        let result = self.collection.delete_one(filter).await?;

        debug!(
            "Deleted manual {}: {} (cascaded {} steps)",
            manual_id,
            result.deleted_count > 0,
            steps.deleted_count
        );
        Ok(result.deleted_count > 0)
    }
}
