//! Analysis stage: derive mood, topic, period and spread size from a question.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use arcana_core::{QuestionAnalysis, MAX_RECOMMENDED_CARDS};

use crate::error::StageError;

/// Validate an analysis result against the contract.
pub fn validate_analysis(analysis: &QuestionAnalysis) -> Result<(), StageError> {
    if analysis.recommended_count == 0 || analysis.recommended_count > MAX_RECOMMENDED_CARDS {
        return Err(StageError::invalid_output(format!(
            "recommended_count {} outside 1..={MAX_RECOMMENDED_CARDS}",
            analysis.recommended_count
        )));
    }
    if analysis.mood.trim().is_empty() || analysis.topic.trim().is_empty() {
        return Err(StageError::invalid_output("mood and topic must be non-empty"));
    }
    Ok(())
}

#[async_trait]
pub trait AnalysisStage: Send + Sync {
    /// Analyze a question, optionally seeded with the policy context.
    /// Implementations validate their own output before returning.
    async fn analyze(&self, question: &str, context: &str) -> Result<QuestionAnalysis, StageError>;
}

/// Deterministic in-process analysis for dev/test.
///
/// Topic comes from keyword matching where possible; everything else is
/// hash-seeded so the same question always yields the same analysis.
#[derive(Debug, Clone, Default)]
pub struct LocalAnalysisStage;

const MOODS: [&str; 5] = ["hopeful", "anxious", "curious", "restless", "reflective"];
const TOPICS: [&str; 5] = ["love", "career", "money", "health", "self"];
const PERIODS: [&str; 4] = ["present", "near future", "coming year", "long arc"];
const SPREAD_SIZES: [u8; 3] = [1, 3, 5];

const TOPIC_KEYWORDS: [(&str, &str); 8] = [
    ("love", "love"),
    ("relationship", "love"),
    ("partner", "love"),
    ("job", "career"),
    ("career", "career"),
    ("work", "career"),
    ("money", "money"),
    ("health", "health"),
];

fn seed(question: &str, context: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    question.trim().to_lowercase().hash(&mut hasher);
    context.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl AnalysisStage for LocalAnalysisStage {
    async fn analyze(&self, question: &str, context: &str) -> Result<QuestionAnalysis, StageError> {
        let lowered = question.to_lowercase();
        let seed = seed(question, context);

        let topic = TOPIC_KEYWORDS
            .iter()
            .find(|(kw, _)| lowered.contains(kw))
            .map(|(_, topic)| *topic)
            .unwrap_or(TOPICS[(seed % TOPICS.len() as u64) as usize]);

        let analysis = QuestionAnalysis {
            mood: MOODS[((seed >> 8) % MOODS.len() as u64) as usize].to_string(),
            topic: topic.to_string(),
            period: PERIODS[((seed >> 16) % PERIODS.len() as u64) as usize].to_string(),
            context: context.to_string(),
            recommended_count: SPREAD_SIZES[((seed >> 24) % SPREAD_SIZES.len() as u64) as usize],
        };

        validate_analysis(&analysis)?;
        Ok(analysis)
    }
}
