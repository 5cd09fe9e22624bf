//! The prediction workflow orchestrator.
//!
//! Drives one job through the four stages, persisting a checkpoint after each
//! so a poller can observe any consistent prefix of the sequence
//! Processing → Analysis → Selection → Completion. All outcomes are observed
//! via the store; the return value exists for the spawned task's logger.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use arcana_ai::{
    analysis::validate_analysis, fallback_reading, narration::validate_reading,
    selection::validate_selection, PolicyOutcome, StageError, StageSet,
};
use arcana_cards::CardCatalog;
use arcana_core::{JobId, PredictionStatus, UserId};
use arcana_ledger::{CreditLedger, LedgerError, READING_COST};

use crate::retry::RetryPolicy;
use crate::store::{PredictionPatch, PredictionStore, StoreError};

/// Per-job workflow tuning.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Retry envelope applied to every stage call.
    pub retry: RetryPolicy,
    /// Deadline for a single stage attempt, independent of the retry envelope.
    pub stage_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            stage_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        source: StageError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("credit debit failed: {0}")]
    Debit(LedgerError),
}

/// Executes `run` to a terminal state for exactly one job.
///
/// Dependencies are injected so tests can substitute scripted doubles; the
/// orchestrator owns no state of its own beyond configuration.
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    store: Arc<dyn PredictionStore>,
    ledger: Arc<dyn CreditLedger>,
    stages: StageSet,
    catalog: Arc<CardCatalog>,
    config: WorkflowConfig,
}

impl WorkflowOrchestrator {
    pub fn new(
        store: Arc<dyn PredictionStore>,
        ledger: Arc<dyn CreditLedger>,
        stages: StageSet,
        catalog: Arc<CardCatalog>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            stages,
            catalog,
            config,
        }
    }

    /// Run the job to a terminal state.
    ///
    /// The returned error is for the caller's log only; by the time it
    /// surfaces the job has already been checkpointed FAILED where possible.
    pub async fn run(
        &self,
        job_id: JobId,
        question: String,
        user_id: Option<UserId>,
    ) -> Result<(), WorkflowError> {
        // Claiming PENDING -> PROCESSING doubles as the single-writer guard:
        // a duplicate schedule fails the transition and must not touch the
        // record further.
        if let Err(e) = self
            .store
            .update(&job_id, PredictionPatch::status(PredictionStatus::Processing))
            .await
        {
            error!(job_id = %job_id, error = %e, "could not claim job for processing");
            return Err(e.into());
        }

        match self.drive(&job_id, &question, user_id.as_ref()).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.checkpoint_failed(&job_id).await;
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        job_id: &JobId,
        question: &str,
        user_id: Option<&UserId>,
    ) -> Result<(), WorkflowError> {
        // Policy gate. Disapproval is a value, not an error: terminal FAILED,
        // nothing retried, nothing debited.
        let outcome = {
            let stage = Arc::clone(&self.stages.policy);
            let question = question.to_string();
            self.with_retry("policy", job_id, move || {
                let stage = Arc::clone(&stage);
                let question = question.clone();
                async move { stage.review(&question).await }
            })
            .await?
        };

        let context = match outcome {
            PolicyOutcome::Approved { context } => context,
            PolicyOutcome::Rejected { reason } => {
                info!(job_id = %job_id, reason = %reason, "question rejected by policy");
                self.store
                    .update(job_id, PredictionPatch::failed(reason))
                    .await?;
                return Ok(());
            }
        };

        // Analysis, checkpointed immediately so a mid-flight poll sees the
        // partial context before selection/narration finish.
        let analysis = {
            let stage = Arc::clone(&self.stages.analysis);
            let question = question.to_string();
            self.with_retry("analysis", job_id, move || {
                let stage = Arc::clone(&stage);
                let question = question.clone();
                let context = context.clone();
                async move {
                    let analysis = stage.analyze(&question, &context).await?;
                    validate_analysis(&analysis)?;
                    Ok(analysis)
                }
            })
            .await?
        };
        self.store
            .update(job_id, PredictionPatch::analysis(analysis.clone()))
            .await?;
        debug!(job_id = %job_id, topic = %analysis.topic, count = analysis.recommended_count, "analysis checkpointed");

        // Selection; the shape check runs inside the retry envelope so a
        // malformed spread is retried like any other transient failure.
        let selection = {
            let stage = Arc::clone(&self.stages.selection);
            let question = question.to_string();
            let analysis = analysis.clone();
            self.with_retry("selection", job_id, move || {
                let stage = Arc::clone(&stage);
                let question = question.clone();
                let analysis = analysis.clone();
                async move {
                    let selection = stage.select(&question, &analysis).await?;
                    validate_selection(&selection, analysis.recommended_count)?;
                    Ok(selection)
                }
            })
            .await?
        };
        self.store
            .update(
                job_id,
                PredictionPatch::selected_cards(selection.card_ids.clone()),
            )
            .await?;
        debug!(job_id = %job_id, cards = ?selection.card_ids, "selection checkpointed");

        // Narration degrades instead of failing: the job already holds a
        // valid spread, so exhausted retries substitute the fixed fallback.
        let narration = {
            let stage = Arc::clone(&self.stages.narration);
            let question = question.to_string();
            let analysis = analysis.clone();
            let card_ids = selection.card_ids.clone();
            self.with_retry("narration", job_id, move || {
                let stage = Arc::clone(&stage);
                let question = question.clone();
                let analysis = analysis.clone();
                let card_ids = card_ids.clone();
                async move {
                    let reading = stage.narrate(&question, &analysis, &card_ids).await?;
                    validate_reading(&reading, &card_ids)?;
                    Ok(reading)
                }
            })
            .await
        };
        let reading = match narration {
            Ok(reading) => reading,
            Err(WorkflowError::Stage { source, .. }) => {
                warn!(job_id = %job_id, error = %source, "narration exhausted retries; substituting fallback reading");
                fallback_reading(&self.catalog, &selection.card_ids)
            }
            Err(other) => return Err(other),
        };

        // Charge before the terminal write; a failed debit fails the job
        // without persisting a reading.
        let mut debited = false;
        if let Some(user) = user_id {
            self.ledger
                .debit(user, json!({ "job_id": job_id.as_str(), "charge": "reading" }))
                .await
                .map_err(|e| {
                    warn!(job_id = %job_id, user_id = %user, error = %e, "credit debit failed");
                    WorkflowError::Debit(e)
                })?;
            debited = true;
        }

        // Terminal write: reading + COMPLETED + completed_at in one patch.
        // If it fails after the debit went through, compensate; the debit and
        // this write share no transaction or idempotency key, so a crash
        // between them is only recoverable through this path.
        if let Err(store_err) = self
            .store
            .update(job_id, PredictionPatch::completed(reading))
            .await
        {
            if debited {
                if let Some(user) = user_id {
                    match self
                        .ledger
                        .refund(
                            user,
                            READING_COST,
                            "system error",
                            json!({ "job_id": job_id.as_str() }),
                        )
                        .await
                    {
                        Ok(_) => {
                            info!(job_id = %job_id, user_id = %user, "refunded debit after completion persistence failure")
                        }
                        Err(refund_err) => {
                            error!(
                                job_id = %job_id,
                                user_id = %user,
                                error = %refund_err,
                                "compensating refund failed; manual reconciliation required"
                            )
                        }
                    }
                }
            }
            return Err(store_err.into());
        }

        info!(job_id = %job_id, "prediction completed");
        Ok(())
    }

    /// Wrap one stage call in the per-attempt timeout and the retry envelope.
    async fn with_retry<T, F, Fut>(
        &self,
        stage: &'static str,
        job_id: &JobId,
        mut op: F,
    ) -> Result<T, WorkflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let timeout = self.config.stage_timeout;
        self.config
            .retry
            .run(|| {
                let fut = op();
                async move {
                    match tokio::time::timeout(timeout, fut).await {
                        Ok(result) => result,
                        Err(_) => Err(StageError::Timeout(timeout)),
                    }
                }
            })
            .await
            .map_err(|source| {
                warn!(job_id = %job_id, stage, error = %source, "stage failed after retries");
                WorkflowError::Stage { stage, source }
            })
    }

    /// Best-effort FAILED checkpoint with a generic error block. An
    /// already-terminal record is left untouched.
    async fn checkpoint_failed(&self, job_id: &JobId) {
        let patch = PredictionPatch::failed("the reading could not be completed");
        match self.store.update(job_id, patch).await {
            Ok(_) | Err(StoreError::TerminalState(_)) => {}
            Err(e) => {
                error!(job_id = %job_id, error = %e, "could not checkpoint FAILED status")
            }
        }
    }
}
