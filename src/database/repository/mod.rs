//! Repository module - data access per collection.

mod manual_repository;
mod step_repository;

use mongodb::error::{Error, ErrorKind, WriteFailure};

pub use manual_repository::ManualRepository;
pub use step_repository::StepRepository;

/// Server code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// Whether `error` is a unique index violation.
///
/// Two concurrent upserts on the same unique key can both miss and both
/// insert; the loser gets this error although the row now exists.
fn is_duplicate_key(error: &Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}
