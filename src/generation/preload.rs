//! Startup sweep filling in missing descriptions.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{Field, GenerationError, GenerationKey, Orchestrator};
use crate::generator::GenerationInputs;

/// Tally of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PreloadReport {
    pub generated: usize,
    pub failed: usize,
    /// Already being generated by a request; left to that worker.
    pub skipped: usize,
}

/// Generates every missing description one step at a time.
pub struct PreloadScanner {
    orchestrator: Orchestrator,
}

impl PreloadScanner {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Run the sweep on a background task.
    pub fn spawn(self) -> JoinHandle<PreloadReport> {
        tokio::spawn(async move { self.run().await })
    }

    pub async fn run(&self) -> PreloadReport {
        let pending = self.orchestrator.store().steps_missing(Field::Description).await;
        info!("Preloading descriptions for {} steps", pending.len());

        let mut report = PreloadReport::default();
        for step in pending {
            let key = GenerationKey {
                step: step.step_id(),
                field: Field::Description,
            };
            let inputs = GenerationInputs::image(step.image_url);

            match self.orchestrator.generate_and_wait(key, inputs).await {
                Ok(_) => {
                    info!("Preloaded {}", key);
                    report.generated += 1;
                }
                Err(GenerationError::AlreadyInFlight(_)) => report.skipped += 1,
                Err(e) => {
                    warn!("Preload failed for {}: {}", key, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Preload finished: {} generated, {} failed, {} skipped",
            report.generated, report.failed, report.skipped
        );
        report
    }
}
