//! MongoDB database wrapper.

use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::info;

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection string
    /// * `db_name` - Database name to use
    ///
    /// # Errors
    /// Returns error if connection fails or indexes cannot be created.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let database = Self {
            db: client.database(db_name),
        };
        database.ensure_indexes().await?;

        Ok(database)
    }

    /// Get a typed collection from the database.
    ///
    /// # Arguments
    /// * `name` - Collection name
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Create the unique indexes backing manual/step identity. Idempotent.
    async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        let manuals = self.db.collection::<mongodb::bson::Document>("manuals");
        manuals
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "manual_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        manuals
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "slug": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        self.db
            .collection::<mongodb::bson::Document>("steps")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "manual_id": 1, "step_number": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        info!("Database indexes verified");
        Ok(())
    }
}
