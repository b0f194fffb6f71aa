//! Configuration module for stepcache.
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::cache::CacheConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // HTTP
    pub port: u16,
    pub cors_origins: Vec<String>,

    /// Public base URL the diagrams are served under.
    pub app_url: Url,

    /// Directory holding `manuals/<id>/step<n>.png` source diagrams.
    pub static_dir: PathBuf,

    // MongoDB
    /// Connection string. `None` runs the service with the cache disabled.
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,

    // Generator
    pub replicate_api_token: Option<String>,
    pub text_model: String,
    pub image_model: String,

    // Generation pool
    /// Deadline for a single Generator call. `None` means no deadline.
    pub generation_timeout: Option<Duration>,
    pub max_concurrent_generations: usize,
    pub generation_queue_capacity: usize,
    pub preload_on_startup: bool,

    // Front cache
    pub field_cache: CacheConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let cors_origins = env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let app_url = env::var("APP_URL").unwrap_or_else(|_| "http://localhost:4000".to_string());
        let app_url = Url::parse(app_url.trim_end_matches('/'))
            .with_context(|| format!("APP_URL is not a valid URL: {app_url}"))?;

        // Empty values count as unset
        let mongodb_uri = env::var("MONGODB_URI").ok().filter(|s| !s.trim().is_empty());
        let replicate_api_token = env::var("REPLICATE_API_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let timeout_secs: u64 = parse_var("GENERATION_TIMEOUT_SECS", 120)?;
        let generation_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let max_concurrent_generations: usize = parse_var("MAX_CONCURRENT_GENERATIONS", 4)?;
        let generation_queue_capacity: usize = parse_var("GENERATION_QUEUE_CAPACITY", 64)?;
        if max_concurrent_generations == 0 || generation_queue_capacity == 0 {
            anyhow::bail!(
                "MAX_CONCURRENT_GENERATIONS and GENERATION_QUEUE_CAPACITY must be greater than zero"
            );
        }

        Ok(Self {
            port: parse_var("PORT", 4000)?,
            cors_origins,
            app_url,
            static_dir: PathBuf::from(env::var("STATIC_DIR").unwrap_or_else(|_| "public".to_string())),
            mongodb_uri,
            mongodb_database: env::var("MONGODB_DATABASE")
                .unwrap_or_else(|_| "stepcache".to_string()),
            replicate_api_token,
            text_model: env::var("REPLICATE_TEXT_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4.1-mini".to_string()),
            image_model: env::var("REPLICATE_IMAGE_MODEL")
                .unwrap_or_else(|_| "flux-kontext-apps/restore-image".to_string()),
            generation_timeout,
            max_concurrent_generations,
            generation_queue_capacity,
            preload_on_startup: parse_var("PRELOAD_ON_STARTUP", true)?,
            field_cache: CacheConfig::from_limits(
                parse_var("FIELD_CACHE_CAPACITY", 20_000)?,
                parse_var("FIELD_CACHE_IDLE_SECS", 3600)?,
            ),
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{name} has invalid value '{raw}': {e}")),
        _ => Ok(default),
    }
}
