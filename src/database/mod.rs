//! Database module exports.

#[cfg(test)]
pub mod memory;
mod models;
mod mongo;
mod repository;
mod store;

pub use models::*;
pub use mongo::Database;
pub use repository::{ManualRepository, StepRepository};
pub use store::{MongoStore, StepStore};
