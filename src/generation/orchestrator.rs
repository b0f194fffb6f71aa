//! Public face of the generation cache.
//!
//! Per key the lifecycle is `Idle -> InFlight -> Idle`: a successful
//! worker leaves the value cached, a failed one leaves it absent with the
//! error recorded. There is no cancel; a started worker runs to its end.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::interpret::parse_string_list;
use super::preload::{PreloadReport, PreloadScanner};
use super::worker::{GenerationJob, GenerationWorker, PoolConfig, ResultSink, WorkerPool};
use super::{
    CacheStore, Field, FieldValue, GenerationError, GenerationKey, PollStatus, StepId,
    TaskRegistry, TransientResults,
};
use crate::generator::{GenerationInputs, GenerationKind, Generator};

/// Result of [`Orchestrator::ensure_generating`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// A worker was queued for the key.
    Started,
    /// Someone else already owns the key; nothing new was queued.
    AlreadyInFlight,
    /// The queue is full; the key was released again.
    Rejected,
    /// The field is provisioned, never generated.
    NotGeneratable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    Ready,
    Pending,
}

/// Answer to a read: the cached value, or the caller's fallback while pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadResult {
    pub status: ReadStatus,
    pub value: FieldValue,
}

/// Combined status of a step's description and tool list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepPoll {
    Pending,
    Ready {
        description: String,
        tools: Vec<String>,
    },
    Error {
        error: String,
    },
}

/// Memoizing, deduplicating front for every generated field.
#[derive(Clone)]
pub struct Orchestrator {
    store: CacheStore,
    registry: TaskRegistry,
    transient: TransientResults,
    pool: WorkerPool,
    generator: Arc<dyn Generator>,
    timeout: Option<Duration>,
}

impl Orchestrator {
    /// Build the orchestrator and start its worker pool on the current runtime.
    pub fn new(store: CacheStore, generator: Arc<dyn Generator>, config: PoolConfig) -> Self {
        let registry = TaskRegistry::new();
        let transient = TransientResults::new();
        let sink = ResultSink::new(store.clone(), transient.clone());
        let worker = GenerationWorker::new(Arc::clone(&generator), sink, config.timeout);
        let pool = WorkerPool::start(worker, &config);

        Self {
            store,
            registry,
            transient,
            pool,
            generator,
            timeout: config.timeout,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Cached value, or `fallback` with generation kicked off in the background.
    pub async fn read(
        &self,
        key: GenerationKey,
        fallback: FieldValue,
        inputs: GenerationInputs,
    ) -> ReadResult {
        if let Some(value) = self.store.get(key).await {
            return ReadResult {
                status: ReadStatus::Ready,
                value,
            };
        }

        let outcome = self.ensure_generating(key, inputs);
        debug!("Cache miss for {}: {:?}", key, outcome);

        ReadResult {
            status: ReadStatus::Pending,
            value: fallback,
        }
    }

    /// Idempotent trigger. Never waits for the generation itself.
    pub fn ensure_generating(&self, key: GenerationKey, inputs: GenerationInputs) -> EnsureOutcome {
        self.submit(key, inputs, None)
    }

    fn submit(
        &self,
        key: GenerationKey,
        inputs: GenerationInputs,
        done: Option<oneshot::Sender<Result<FieldValue, GenerationError>>>,
    ) -> EnsureOutcome {
        if key.field.generation_kind().is_none() {
            return EnsureOutcome::NotGeneratable;
        }

        let Some(guard) = self.registry.acquire(key) else {
            return EnsureOutcome::AlreadyInFlight;
        };
        self.transient.set_pending(key);

        let job = GenerationJob {
            guard,
            inputs,
            done,
        };
        match self.pool.submit(job) {
            Ok(()) => {
                debug!("Queued {} ({} in flight)", key, self.registry.len());
                EnsureOutcome::Started
            }
            Err(job) => {
                warn!("Generation queue full, rejecting {}", key);
                self.transient.set_error(key, GenerationError::Rejected.to_string());
                // Dropping the job releases the key
                drop(job);
                EnsureOutcome::Rejected
            }
        }
    }

    /// Outcome so far for `key`: recorded worker outcome first, then the store.
    pub async fn poll_status(&self, key: GenerationKey) -> PollStatus {
        match self.transient.poll(key) {
            PollStatus::Pending if !self.registry.contains(&key) => match self.store.get(key).await {
                Some(value) => PollStatus::Ready { value },
                None => PollStatus::Pending,
            },
            status => status,
        }
    }

    /// Combined poll of a step's description and tool list.
    pub async fn poll_step(&self, step: StepId) -> StepPoll {
        let description = self
            .poll_status(GenerationKey {
                step,
                field: Field::Description,
            })
            .await;
        let tools = self
            .poll_status(GenerationKey {
                step,
                field: Field::Tools,
            })
            .await;

        match (description, tools) {
            (PollStatus::Error { error }, _) | (_, PollStatus::Error { error }) => {
                StepPoll::Error { error }
            }
            (PollStatus::Ready { value: description }, PollStatus::Ready { value: tools }) => {
                StepPoll::Ready {
                    description: description.as_text().unwrap_or_default().to_string(),
                    tools: tools.as_list().map(<[String]>::to_vec).unwrap_or_default(),
                }
            }
            _ => StepPoll::Pending,
        }
    }

    /// Queue generation for `key` and wait for its outcome.
    ///
    /// Fails with [`GenerationError::AlreadyInFlight`] instead of joining a
    /// worker someone else started.
    pub async fn generate_and_wait(
        &self,
        key: GenerationKey,
        inputs: GenerationInputs,
    ) -> Result<FieldValue, GenerationError> {
        let (done, outcome) = oneshot::channel();
        match self.submit(key, inputs, Some(done)) {
            EnsureOutcome::Started => outcome.await.unwrap_or(Err(GenerationError::Abandoned)),
            EnsureOutcome::AlreadyInFlight => Err(GenerationError::AlreadyInFlight(key.field)),
            EnsureOutcome::Rejected => Err(GenerationError::Rejected),
            EnsureOutcome::NotGeneratable => Err(GenerationError::NotGeneratable(key.field)),
        }
    }

    /// Checklist for a step, derived from its description. Not memoized.
    ///
    /// `Ok(None)` while the description itself is still being generated.
    pub async fn checklist(
        &self,
        step: StepId,
        inputs: GenerationInputs,
    ) -> Result<Option<Vec<String>>, GenerationError> {
        let key = GenerationKey {
            step,
            field: Field::Description,
        };
        let description = match self.poll_status(key).await {
            PollStatus::Ready { value } => value.as_text().unwrap_or_default().to_string(),
            _ => {
                self.ensure_generating(key, inputs);
                return Ok(None);
            }
        };

        let inputs = GenerationInputs::default().with_prior_text(description);
        let call = self.generator.generate(GenerationKind::Checklist, &inputs);
        let raw = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| GenerationError::Timeout(limit))??,
            None => call.await?,
        };

        match parse_string_list(&raw, "checklist") {
            Some(items) if !items.is_empty() => Ok(Some(items)),
            _ => Err(GenerationError::Malformed {
                field: Field::Description,
                reason: "no checklist items found".into(),
            }),
        }
    }

    /// Warm the cache in the background. Returns immediately.
    pub fn warm_cache(&self) -> JoinHandle<PreloadReport> {
        PreloadScanner::new(self.clone()).spawn()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::generation::{Lookup, OrientationHint};
    use crate::generator::fake::FakeGenerator;

    fn orchestrator(store: CacheStore, generator: Arc<FakeGenerator>) -> Orchestrator {
        Orchestrator::new(store, generator, PoolConfig::default())
    }

    fn inputs() -> GenerationInputs {
        GenerationInputs::image("http://localhost:4000/manuals/1/step2.png")
    }

    /// Poll until the registry no longer holds `key`.
    async fn settle(orchestrator: &Orchestrator, key: GenerationKey) {
        for _ in 0..200 {
            if !orchestrator.registry().contains(&key) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{key} never left the registry");
    }

    #[tokio::test]
    async fn test_read_miss_then_hit() {
        let backend = Arc::new(MemoryStore::with_steps(1, &[2]));
        let generator = Arc::new(
            FakeGenerator::new().answer(GenerationKind::Description, "Insert panel 02 into slot A"),
        );
        let orchestrator = orchestrator(CacheStore::new(backend), generator.clone());
        let key = GenerationKey::new(1, 2, Field::Description);
        let fallback = FieldValue::Text("default text".into());

        let first = orchestrator.read(key, fallback.clone(), inputs()).await;
        assert_eq!(
            first,
            ReadResult {
                status: ReadStatus::Pending,
                value: fallback.clone()
            }
        );

        settle(&orchestrator, key).await;

        for _ in 0..5 {
            let next = orchestrator.read(key, fallback.clone(), inputs()).await;
            assert_eq!(
                next,
                ReadResult {
                    status: ReadStatus::Ready,
                    value: FieldValue::Text("Insert panel 02 into slot A".into())
                }
            );
        }
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_runs_one_worker() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(
            FakeGenerator::gated(gate.clone()).answer(GenerationKind::Description, "Attach the legs"),
        );
        let orchestrator = orchestrator(CacheStore::new(Arc::new(MemoryStore::with_steps(1, &[2]))), generator.clone());
        let key = GenerationKey::new(1, 2, Field::Description);

        let outcomes = futures::future::join_all((0..32).map(|_| {
            let orchestrator = orchestrator.clone();
            async move { orchestrator.ensure_generating(key, inputs()) }
        }))
        .await;

        let started = outcomes.iter().filter(|o| **o == EnsureOutcome::Started).count();
        assert_eq!(started, 1);
        assert_eq!(outcomes.len() - started, 31);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, EnsureOutcome::Started | EnsureOutcome::AlreadyInFlight)));

        // All callers returned while the single worker is still blocked
        assert!(orchestrator.registry().contains(&key));
        assert!(orchestrator.poll_status(key).await.is_pending());

        gate.notify_one();
        settle(&orchestrator, key).await;
        assert_eq!(generator.calls(), 1);
        assert_eq!(
            orchestrator.poll_status(key).await,
            PollStatus::Ready {
                value: FieldValue::Text("Attach the legs".into())
            }
        );
    }

    #[tokio::test]
    async fn test_failure_releases_key_for_retry() {
        let generator = Arc::new(FakeGenerator::new().fail(GenerationKind::Description, "model offline"));
        let orchestrator = orchestrator(CacheStore::new(Arc::new(MemoryStore::with_steps(1, &[2]))), generator.clone());
        let key = GenerationKey::new(1, 2, Field::Description);

        assert_eq!(orchestrator.ensure_generating(key, inputs()), EnsureOutcome::Started);
        settle(&orchestrator, key).await;

        let PollStatus::Error { error } = orchestrator.poll_status(key).await else {
            panic!("failure must be recorded");
        };
        assert!(error.contains("model offline"));

        assert_eq!(orchestrator.ensure_generating(key, inputs()), EnsureOutcome::Started);
        settle(&orchestrator, key).await;
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_timeout_records_error_and_releases() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(FakeGenerator::gated(gate).answer(GenerationKind::Description, "late"));
        let config = PoolConfig {
            timeout: Some(Duration::from_millis(20)),
            ..PoolConfig::default()
        };
        let orchestrator = Orchestrator::new(CacheStore::disabled(), generator, config);
        let key = GenerationKey::new(1, 2, Field::Description);

        let result = orchestrator.generate_and_wait(key, inputs()).await;
        assert!(matches!(result, Err(GenerationError::Timeout(_))));
        assert!(!orchestrator.registry().contains(&key));
        assert!(matches!(orchestrator.poll_status(key).await, PollStatus::Error { .. }));
    }

    #[tokio::test]
    async fn test_degraded_store_always_returns_fallback() {
        let backend = Arc::new(MemoryStore::with_steps(1, &[2]));
        backend.set_unreachable(true);
        let generator = Arc::new(FakeGenerator::new().answer(GenerationKind::Description, "generated"));
        let orchestrator = orchestrator(CacheStore::new(backend), generator);
        let key = GenerationKey::new(1, 2, Field::Description);
        let fallback = FieldValue::Text("default text".into());

        for _ in 0..3 {
            let result = orchestrator.read(key, fallback.clone(), inputs()).await;
            assert_eq!(result.status, ReadStatus::Pending);
            assert_eq!(result.value, fallback);
            settle(&orchestrator, key).await;
        }

        // The outcome is still observable through polling
        assert_eq!(
            orchestrator.poll_status(key).await,
            PollStatus::Ready {
                value: FieldValue::Text("generated".into())
            }
        );
    }

    #[tokio::test]
    async fn test_orientation_cached_normalized() {
        let backend = Arc::new(MemoryStore::with_steps(1, &[1, 2]));
        let generator = Arc::new(FakeGenerator::new().answer(
            GenerationKind::OrientationCompare,
            r#"{"show_popup": false, "message": "rotate 90°"}"#,
        ));
        let orchestrator = orchestrator(CacheStore::new(backend.clone()), generator);
        let key = GenerationKey::new(1, 1, Field::OrientationText);
        let inputs = GenerationInputs::images(
            "http://localhost:4000/manuals/1/step1.png",
            "http://localhost:4000/manuals/1/step2.png",
        );

        let value = orchestrator.generate_and_wait(key, inputs).await.unwrap();
        assert_eq!(value, FieldValue::Orientation(OrientationHint::safe_default()));

        let stored = backend.step(key.step).unwrap().orientation_text.unwrap();
        assert_eq!(stored, r#"{"show_popup":false,"message":""}"#);
    }

    #[tokio::test]
    async fn test_manual_deleted_during_generation_stays_deleted() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(MemoryStore::with_steps(4, &[1]));
        let generator = Arc::new(
            FakeGenerator::gated(gate.clone()).answer(GenerationKind::Description, "Attach the base"),
        );
        let orchestrator = orchestrator(CacheStore::new(backend.clone()), generator);
        let key = GenerationKey::new(4, 1, Field::Description);

        assert_eq!(orchestrator.ensure_generating(key, inputs()), EnsureOutcome::Started);
        assert_eq!(orchestrator.store().delete_manual(4).await, Lookup::Found(()));

        gate.notify_one();
        settle(&orchestrator, key).await;

        assert_eq!(orchestrator.store().get_manual(4).await, Lookup::Missing);
        assert!(backend.step(key.step).is_none());
        assert_eq!(orchestrator.store().get(key).await, None);
    }

    #[tokio::test]
    async fn test_worker_does_not_provision_missing_step() {
        let backend = Arc::new(MemoryStore::new());
        let generator = Arc::new(FakeGenerator::new().answer(GenerationKind::ToolList, r#"{"tools": ["Allen key"]}"#));
        let orchestrator = orchestrator(CacheStore::new(backend.clone()), generator);
        let key = GenerationKey::new(5, 1, Field::Tools);

        let value = orchestrator
            .generate_and_wait(key, GenerationInputs::image("http://localhost:4000/manuals/5/step1.png"))
            .await
            .unwrap();

        // Outcome is still pollable even though nothing was persisted
        assert_eq!(orchestrator.poll_status(key).await, PollStatus::Ready { value });
        assert!(backend.step(key.step).is_none());
        assert_eq!(orchestrator.store().get_manual(5).await, Lookup::Missing);
    }

    #[tokio::test]
    async fn test_image_url_is_never_generated() {
        let generator = Arc::new(FakeGenerator::new());
        let orchestrator = orchestrator(CacheStore::disabled(), generator.clone());
        let key = GenerationKey::new(1, 1, Field::ImageUrl);

        assert_eq!(orchestrator.ensure_generating(key, inputs()), EnsureOutcome::NotGeneratable);
        assert!(!orchestrator.registry().contains(&key));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_and_releases() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(FakeGenerator::gated(gate.clone()).answer(GenerationKind::Description, "ok"));
        let config = PoolConfig {
            concurrency: 1,
            queue_capacity: 1,
            timeout: None,
        };
        let orchestrator = Orchestrator::new(CacheStore::disabled(), generator.clone(), config);

        // First job occupies the single permit once the dispatcher picks it up
        let first = GenerationKey::new(1, 1, Field::Description);
        assert_eq!(orchestrator.ensure_generating(first, inputs()), EnsureOutcome::Started);
        while generator.calls() == 0 {
            tokio::task::yield_now().await;
        }

        // Second waits in the dispatcher for a permit, third sits in the queue
        let second = GenerationKey::new(1, 2, Field::Description);
        assert_eq!(orchestrator.ensure_generating(second, inputs()), EnsureOutcome::Started);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let third = GenerationKey::new(1, 3, Field::Description);
        assert_eq!(orchestrator.ensure_generating(third, inputs()), EnsureOutcome::Started);

        let fourth = GenerationKey::new(1, 4, Field::Description);
        assert_eq!(orchestrator.ensure_generating(fourth, inputs()), EnsureOutcome::Rejected);
        assert!(!orchestrator.registry().contains(&fourth));
        assert!(matches!(orchestrator.poll_status(fourth).await, PollStatus::Error { .. }));

        for key in [first, second, third] {
            gate.notify_one();
            settle(&orchestrator, key).await;
        }
    }

    #[tokio::test]
    async fn test_poll_step_combines_fields() {
        let backend = Arc::new(MemoryStore::with_steps(1, &[2]));
        let generator = Arc::new(
            FakeGenerator::new()
                .answer(GenerationKind::Description, "Slide the drawer in")
                .fail(GenerationKind::ToolList, "bad gateway"),
        );
        let orchestrator = orchestrator(CacheStore::new(backend), generator);
        let step = StepId::new(1, 2);

        assert_eq!(orchestrator.poll_step(step).await, StepPoll::Pending);

        let description = GenerationKey { step, field: Field::Description };
        orchestrator.generate_and_wait(description, inputs()).await.unwrap();
        assert_eq!(orchestrator.poll_step(step).await, StepPoll::Pending);

        let tools = GenerationKey { step, field: Field::Tools };
        assert!(orchestrator.generate_and_wait(tools, inputs()).await.is_err());
        assert!(matches!(orchestrator.poll_step(step).await, StepPoll::Error { .. }));
    }

    #[tokio::test]
    async fn test_checklist_waits_for_description() {
        let backend = Arc::new(MemoryStore::with_steps(1, &[2]));
        let generator = Arc::new(
            FakeGenerator::new()
                .answer(GenerationKind::Description, "Attach panel 01 with screws A13.")
                .answer(
                    GenerationKind::Checklist,
                    r#"{"checklist": ["Align panel 01", "Tighten screws A13", "Check the frame is square"]}"#,
                ),
        );
        let orchestrator = orchestrator(CacheStore::new(backend), generator.clone());
        let step = StepId::new(1, 2);

        assert_eq!(orchestrator.checklist(step, inputs()).await.unwrap(), None);
        settle(&orchestrator, GenerationKey { step, field: Field::Description }).await;

        let items = orchestrator.checklist(step, inputs()).await.unwrap().unwrap();
        assert_eq!(items.len(), 3);

        // Not memoized: a second request calls the generator again
        orchestrator.checklist(step, inputs()).await.unwrap();
        assert_eq!(generator.calls(), 3);
    }
}
