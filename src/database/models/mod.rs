//! Database model exports.

pub mod manual;
pub mod step;

pub use manual::{Manual, ManualSummary};
pub use step::{Step, StepSummary};
