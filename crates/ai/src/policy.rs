//! Policy stage: gatekeeping before any other work happens.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// Outcome of the policy review.
///
/// Disapproval is an expected, deterministic result — modeled as data so that
/// orchestration branches on the value and never retries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PolicyOutcome {
    /// The question may proceed; `context` is carried into analysis.
    Approved { context: String },
    /// The question is refused; `reason` becomes the job's error block.
    Rejected { reason: String },
}

impl PolicyOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, PolicyOutcome::Approved { .. })
    }
}

#[async_trait]
pub trait PolicyStage: Send + Sync {
    /// Review a question. Errors are transient call failures only;
    /// disapproval comes back as [`PolicyOutcome::Rejected`].
    async fn review(&self, question: &str) -> Result<PolicyOutcome, StageError>;
}

/// Deterministic in-process policy for dev/test.
///
/// Rejects questions touching topics a reading must not answer; approves
/// everything else with a generic context.
#[derive(Debug, Clone)]
pub struct LocalPolicyStage {
    blocklist: Vec<String>,
}

impl LocalPolicyStage {
    pub fn new() -> Self {
        Self {
            blocklist: [
                "diagnos",
                "medical",
                "medication",
                "lottery",
                "lawsuit",
                "when will i die",
                "death date",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }

    pub fn with_blocklist(terms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            blocklist: terms.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for LocalPolicyStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStage for LocalPolicyStage {
    async fn review(&self, question: &str) -> Result<PolicyOutcome, StageError> {
        let lowered = question.to_lowercase();
        if let Some(term) = self.blocklist.iter().find(|t| lowered.contains(t.as_str())) {
            return Ok(PolicyOutcome::Rejected {
                reason: format!("a reading cannot responsibly address \"{term}\" topics"),
            });
        }
        Ok(PolicyOutcome::Approved {
            context: "general guidance reading".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn approves_ordinary_questions() {
        let stage = LocalPolicyStage::new();
        let outcome = stage.review("Will I find love?").await.unwrap();
        assert!(outcome.is_approved());
    }

    #[tokio::test]
    async fn rejects_blocklisted_topics_as_a_value() {
        let stage = LocalPolicyStage::new();
        let outcome = stage
            .review("Can you diagnose my headaches?")
            .await
            .unwrap();
        match outcome {
            PolicyOutcome::Rejected { reason } => assert!(reason.contains("diagnos")),
            PolicyOutcome::Approved { .. } => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn blocklist_is_case_insensitive() {
        let stage = LocalPolicyStage::new();
        let outcome = stage.review("LOTTERY numbers please").await.unwrap();
        assert!(!outcome.is_approved());
    }
}
