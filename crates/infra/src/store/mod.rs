//! Prediction storage.
//!
//! The store is the single source of truth for job status. Every write is a
//! targeted update-by-key carrying a partial patch; the store enforces the
//! status state machine (monotonic transitions, terminal immutability) so no
//! writer can corrupt a record beyond last-write-wins on individual fields.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use arcana_core::{JobId, Prediction, PredictionStatus, QuestionAnalysis, Reading, UserId};

pub use in_memory::InMemoryPredictionStore;
pub use postgres::PostgresPredictionStore;

/// Prediction store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("prediction not found: {0}")]
    NotFound(JobId),

    #[error("prediction already exists: {0}")]
    AlreadyExists(JobId),

    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition {
        from: PredictionStatus,
        to: PredictionStatus,
    },

    #[error("prediction {0} is terminal; no further writes permitted")]
    TerminalState(JobId),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Partial, targeted update of one prediction record.
///
/// Only the populated fields are written; `job_id`, `question`, `user_id` and
/// `created_at` are immutable by construction (the patch cannot name them).
#[derive(Debug, Clone, Default)]
pub struct PredictionPatch {
    pub status: Option<PredictionStatus>,
    pub analysis: Option<QuestionAnalysis>,
    pub selected_cards: Option<Vec<u8>>,
    pub reading: Option<Reading>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PredictionPatch {
    /// Status-only checkpoint.
    pub fn status(status: PredictionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Analysis checkpoint (observable mid-flight).
    pub fn analysis(analysis: QuestionAnalysis) -> Self {
        Self {
            analysis: Some(analysis),
            ..Self::default()
        }
    }

    /// Selection checkpoint.
    pub fn selected_cards(card_ids: Vec<u8>) -> Self {
        Self {
            selected_cards: Some(card_ids),
            ..Self::default()
        }
    }

    /// Terminal success: reading + COMPLETED + completion time, in one write.
    pub fn completed(reading: Reading) -> Self {
        Self {
            status: Some(PredictionStatus::Completed),
            reading: Some(reading),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Terminal failure: error block + FAILED + completion time, in one write.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(PredictionStatus::Failed),
            error: Some(error.into()),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Apply this patch to a record, enforcing the state machine.
    ///
    /// Both implementations funnel through here so the transition rules live
    /// in exactly one place.
    pub fn apply(&self, prediction: &mut Prediction) -> Result<(), StoreError> {
        if prediction.status.is_terminal() {
            return Err(StoreError::TerminalState(prediction.job_id.clone()));
        }
        if let Some(next) = self.status {
            if !prediction.status.can_transition_to(next) {
                return Err(StoreError::IllegalTransition {
                    from: prediction.status,
                    to: next,
                });
            }
            prediction.status = next;
        }
        if let Some(analysis) = &self.analysis {
            prediction.analysis = Some(analysis.clone());
        }
        if let Some(cards) = &self.selected_cards {
            prediction.selected_cards = Some(cards.clone());
        }
        if let Some(reading) = &self.reading {
            prediction.reading = Some(reading.clone());
        }
        if let Some(error) = &self.error {
            prediction.error = Some(error.clone());
        }
        if let Some(at) = self.completed_at {
            prediction.completed_at = Some(at);
        }
        Ok(())
    }
}

/// Durable CRUD over prediction records.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Persist a new PENDING record; fails if the id already exists.
    async fn create(&self, prediction: Prediction) -> Result<(), StoreError>;

    async fn get(&self, job_id: &JobId) -> Result<Option<Prediction>, StoreError>;

    /// Targeted update-by-key. Returns the record after the patch.
    async fn update(
        &self,
        job_id: &JobId,
        patch: PredictionPatch,
    ) -> Result<Prediction, StoreError>;

    /// The user's most recently created prediction, if any (rate limiting).
    async fn latest_for_user(&self, user_id: &UserId) -> Result<Option<Prediction>, StoreError>;
}
