//! The prediction record and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{JobId, UserId};
use crate::reading::{QuestionAnalysis, Reading};

/// Lifecycle status of a prediction job.
///
/// Transitions are monotonic and one-directional:
/// `Pending → Processing → {Completed | Failed}`. Completed and Failed are
/// terminal; no further writes are permitted to a terminal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PredictionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PredictionStatus::Completed | PredictionStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: PredictionStatus) -> bool {
        use PredictionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

impl core::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            PredictionStatus::Pending => "PENDING",
            PredictionStatus::Processing => "PROCESSING",
            PredictionStatus::Completed => "COMPLETED",
            PredictionStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One question's end-to-end processing unit.
///
/// Created PENDING by the submit path, advanced only by orchestrator
/// checkpoints, never deleted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub job_id: JobId,
    pub user_id: Option<UserId>,
    pub question: String,
    pub status: PredictionStatus,
    /// Set once the analysis stage checkpoints; observable mid-flight.
    pub analysis: Option<QuestionAnalysis>,
    /// Duplicate-free card ids in spread order; set by the selection checkpoint.
    pub selected_cards: Option<Vec<u8>>,
    /// Set together with the COMPLETED checkpoint.
    pub reading: Option<Reading>,
    /// Generic error block, populated on FAILED.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Non-null iff status is terminal.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Prediction {
    pub fn new(job_id: JobId, question: impl Into<String>, user_id: Option<UserId>) -> Self {
        Self {
            job_id,
            user_id,
            question: question.into(),
            status: PredictionStatus::Pending,
            analysis: None,
            selected_cards: None,
            reading: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_prediction_starts_pending() {
        let p = Prediction::new(JobId::generate(), "Will I find love?", None);
        assert_eq!(p.status, PredictionStatus::Pending);
        assert!(p.analysis.is_none());
        assert!(p.selected_cards.is_none());
        assert!(p.reading.is_none());
        assert!(p.completed_at.is_none());
    }

    #[test]
    fn legal_transitions_form_a_line() {
        use PredictionStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        use PredictionStatus::*;
        for terminal in [Completed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Processing, Completed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn no_skipping_or_backward_moves() {
        use PredictionStatus::*;
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn status_serializes_uppercase() {
        let s = serde_json::to_string(&PredictionStatus::Pending).unwrap();
        assert_eq!(s, "\"PENDING\"");
        let s = serde_json::to_string(&PredictionStatus::Completed).unwrap();
        assert_eq!(s, "\"COMPLETED\"");
    }
}
