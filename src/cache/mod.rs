//! In-process front cache using Moka.
//!
//! Sits in front of the durable store so hot step fields are served
//! without a database round trip.

mod config;
mod fields;

pub use config::CacheConfig;
pub use fields::FieldCache;
