//! Generation error types.

use std::time::Duration;

use thiserror::Error;

use super::Field;
use crate::generator::GeneratorError;

/// Everything that can go wrong inside a worker.
///
/// These never reach an unrelated request: workers turn them into an
/// `error` poll status and a log line.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("unusable {field} output: {reason}")]
    Malformed { field: Field, reason: String },

    #[error("{0} is provisioned, not generated")]
    NotGeneratable(Field),

    #[error("generation queue is full")]
    Rejected,

    #[error("{0} is already being generated")]
    AlreadyInFlight(Field),

    #[error("worker stopped before reporting an outcome")]
    Abandoned,
}
