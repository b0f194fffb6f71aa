//! Process-lifetime record of generation outcomes.
//!
//! Workers overwrite an entry when they finish; nothing deletes entries.
//! Polling an unknown key reports `Pending`.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use super::{FieldValue, GenerationKey};

/// Poll status of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollStatus {
    Pending,
    Ready { value: FieldValue },
    Error { error: String },
}

impl PollStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Outcomes of finished workers, keyed by generation key.
#[derive(Clone, Default)]
pub struct TransientResults {
    results: Arc<DashMap<GenerationKey, PollStatus>>,
}

impl TransientResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget an earlier outcome when a retry starts.
    pub fn set_pending(&self, key: GenerationKey) {
        self.set(key, PollStatus::Pending);
    }

    pub fn set_ready(&self, key: GenerationKey, value: FieldValue) {
        self.set(key, PollStatus::Ready { value });
    }

    pub fn set_error(&self, key: GenerationKey, message: impl Into<String>) {
        self.set(key, PollStatus::Error {
            error: message.into(),
        });
    }

    fn set(&self, key: GenerationKey, status: PollStatus) {
        self.results.insert(key, status);
    }

    /// Recorded outcome, `Pending` if the key has none yet.
    pub fn poll(&self, key: GenerationKey) -> PollStatus {
        self.results
            .entry(key)
            .or_insert(PollStatus::Pending)
            .clone()
    }
}
