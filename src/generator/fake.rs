//! Scripted [`Generator`] for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{GenerationInputs, GenerationKind, Generator, GeneratorError};

/// Scripted generator: counts calls, optionally holds every call until
/// released, and answers per kind.
#[derive(Default)]
pub struct FakeGenerator {
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
    answers: Mutex<Vec<(GenerationKind, Result<String, String>)>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn answer(self, kind: GenerationKind, output: &str) -> Self {
        self.answers.lock().push((kind, Ok(output.to_string())));
        self
    }

    pub fn fail(self, kind: GenerationKind, message: &str) -> Self {
        self.answers.lock().push((kind, Err(message.to_string())));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(
        &self,
        kind: GenerationKind,
        _inputs: &GenerationInputs,
    ) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let answer = self
            .answers
            .lock()
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, a)| a.clone());
        match answer {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(GeneratorError::Upstream {
                status: "failed".into(),
                message,
            }),
            None => Err(GeneratorError::EmptyOutput),
        }
    }
}
