//! Stepcache - generation cache behind an assembly-instruction viewer
//!
//! Serves per-step descriptions, tool lists, colorized diagrams and
//! orientation hints. Anything not generated yet is answered with a
//! fallback while a single background worker per field produces it.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB integration (manuals and steps)
//! - `cache` - Moka front cache
//! - `generator` - External content generation (Replicate)
//! - `generation` - Cache store, dedup registry, workers, preload
//! - `api` - axum routes
//! - `utils` - Utility functions

mod api;
mod cache;
mod config;
mod database;
mod generation;
mod generator;
mod utils;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::{AppState, SourceLocator};
use config::Config;
use database::{Database, MongoStore};
use generation::{CacheStore, Orchestrator, PoolConfig};
use generator::ReplicateGenerator;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stepcache=info,tower_http=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting stepcache...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    // A configured store that cannot be reached is fatal; no store at all is not
    let store = match &config.mongodb_uri {
        Some(uri) => {
            info!("Connecting to MongoDB...");
            let db = Database::connect(uri, &config.mongodb_database).await?;
            info!("Database connected");
            CacheStore::new(Arc::new(MongoStore::new(&db))).with_front_cache(config.field_cache.clone())
        }
        None => {
            warn!("MONGODB_URI not set, running with the cache disabled");
            CacheStore::disabled()
        }
    };

    if config.replicate_api_token.is_none() {
        warn!("REPLICATE_API_TOKEN not set, every generation will fail");
    }
    let generator = Arc::new(ReplicateGenerator::new(
        config.replicate_api_token.clone(),
        config.text_model.clone(),
        config.image_model.clone(),
    ));

    let pool = PoolConfig {
        concurrency: config.max_concurrent_generations,
        queue_capacity: config.generation_queue_capacity,
        timeout: config.generation_timeout,
    };
    let orchestrator = Orchestrator::new(store, generator, pool);

    if config.preload_on_startup {
        orchestrator.warm_cache();
        info!("Preload started in the background");
    }

    let source = SourceLocator::new(config.static_dir.clone(), config.app_url.clone());
    api::serve(&config, AppState::new(orchestrator, source)).await
}
