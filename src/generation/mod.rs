//! Memoizing, deduplicating cache over generated step content.
//!
//! Reads return whatever is cached, or a fallback while a single
//! background worker per key fills the gap.

mod error;
mod interpret;
mod key;
mod orchestrator;
mod preload;
mod registry;
mod store;
mod transient;
mod worker;

pub use error::GenerationError;
pub use key::{Field, FieldValue, GenerationKey, OrientationHint, StepId};
pub use orchestrator::{Orchestrator, ReadStatus, StepPoll};
pub use registry::TaskRegistry;
pub use store::{CacheStore, Lookup};
pub use transient::{PollStatus, TransientResults};
pub use worker::PoolConfig;
