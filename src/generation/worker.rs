//! Background generation workers.
//!
//! Jobs go through a bounded queue to a dispatcher that runs at most
//! `concurrency` of them at a time. A full queue rejects new jobs instead
//! of growing without bound.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, info, warn};

use super::interpret::interpret;
use super::registry::InFlightGuard;
use super::{CacheStore, FieldValue, GenerationError, GenerationKey, TransientResults};
use crate::generator::{GenerationInputs, Generator};

/// Sizing of the worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub concurrency: usize,
    pub queue_capacity: usize,
    /// Deadline for one Generator call.
    pub timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_capacity: 64,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

pub type JobOutcome = Result<FieldValue, GenerationError>;

/// One unit of queued work. Owns the key's in-flight slot.
pub struct GenerationJob {
    pub guard: InFlightGuard,
    pub inputs: GenerationInputs,
    /// Notified with the outcome once the result is recorded.
    pub done: Option<oneshot::Sender<JobOutcome>>,
}

/// Where worker outcomes go: the durable store for successes, and the
/// transient map for every outcome so polling works without a store.
#[derive(Clone)]
pub struct ResultSink {
    store: CacheStore,
    transient: TransientResults,
}

impl ResultSink {
    pub fn new(store: CacheStore, transient: TransientResults) -> Self {
        Self { store, transient }
    }

    /// Writes only onto an existing step row. Provisioning is up to whoever
    /// triggers the generation, so a manual deleted meanwhile stays deleted.
    async fn record_success(&self, key: GenerationKey, value: &FieldValue) {
        self.store.put(key, value).await;
        self.transient.set_ready(key, value.clone());
    }

    fn record_failure(&self, key: GenerationKey, error: &GenerationError) {
        self.transient.set_error(key, error.to_string());
    }
}

/// Runs one job: Generator call, interpretation, write-through, release.
pub struct GenerationWorker {
    generator: Arc<dyn Generator>,
    sink: ResultSink,
    timeout: Option<Duration>,
}

impl GenerationWorker {
    pub fn new(generator: Arc<dyn Generator>, sink: ResultSink, timeout: Option<Duration>) -> Self {
        Self {
            generator,
            sink,
            timeout,
        }
    }

    /// Execute a job. Never fails and never panics outward: every outcome
    /// becomes recorded state.
    pub async fn run(&self, job: GenerationJob) {
        let GenerationJob { guard, inputs, done } = job;
        let key = guard.key();

        let outcome = AssertUnwindSafe(self.generate(key, &inputs))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(GenerationError::Abandoned));

        match &outcome {
            Ok(value) => {
                info!("Generated {}", key);
                self.sink.record_success(key, value).await;
            }
            Err(e) => {
                warn!("Generation failed for {}: {}", key, e);
                self.sink.record_failure(key, e);
            }
        }

        // Release only after the outcome is visible, so a reader never sees
        // "not in flight" together with "not yet recorded".
        drop(guard);

        if let Some(done) = done {
            let _ = done.send(outcome);
        }
    }

    async fn generate(&self, key: GenerationKey, inputs: &GenerationInputs) -> JobOutcome {
        let kind = key
            .field
            .generation_kind()
            .ok_or(GenerationError::NotGeneratable(key.field))?;

        let call = self.generator.generate(kind, inputs);
        let raw = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| GenerationError::Timeout(limit))??,
            None => call.await?,
        };

        debug!("Raw {} output for {}: {} bytes", kind, key, raw.len());
        interpret(key.field, &raw)
    }
}

/// Handle to the bounded job queue.
#[derive(Clone)]
pub struct WorkerPool {
    queue: mpsc::Sender<GenerationJob>,
}

impl WorkerPool {
    /// Start the dispatcher on the current runtime.
    pub fn start(worker: GenerationWorker, config: &PoolConfig) -> Self {
        let (queue, jobs) = mpsc::channel(config.queue_capacity.max(1));
        let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));

        tokio::spawn(dispatch(Arc::new(worker), jobs, permits));
        info!(
            "Worker pool started (concurrency {}, queue {})",
            config.concurrency, config.queue_capacity
        );

        Self { queue }
    }

    /// Enqueue without waiting. Hands the job back when the queue is full.
    pub fn submit(&self, job: GenerationJob) -> Result<(), GenerationJob> {
        self.queue.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) | TrySendError::Closed(job) => job,
        })
    }
}

async fn dispatch(
    worker: Arc<GenerationWorker>,
    mut jobs: mpsc::Receiver<GenerationJob>,
    permits: Arc<Semaphore>,
) {
    while let Some(job) = jobs.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let worker = Arc::clone(&worker);
        tokio::spawn(async move {
            worker.run(job).await;
            drop(permit);
        });
    }
    debug!("Worker pool dispatcher stopped");
}
