//! Selection stage: draw the spread for an analyzed question.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arcana_cards::DECK_SIZE;
use arcana_core::QuestionAnalysis;

use crate::error::StageError;

/// Output of the selection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSelection {
    /// Card ids in spread order; unique, each in `0..DECK_SIZE`.
    pub card_ids: Vec<u8>,
    pub reasoning: String,
    /// Confidence in \[0, 1\].
    pub confidence: f64,
}

/// Validate a selection against the contract: exactly `recommended_count`
/// unique in-range ids and a sane confidence.
pub fn validate_selection(
    selection: &CardSelection,
    recommended_count: u8,
) -> Result<(), StageError> {
    if selection.card_ids.len() != recommended_count as usize {
        return Err(StageError::invalid_output(format!(
            "expected {recommended_count} cards, got {}",
            selection.card_ids.len()
        )));
    }

    let mut seen = HashSet::with_capacity(selection.card_ids.len());
    for &id in &selection.card_ids {
        if id >= DECK_SIZE {
            return Err(StageError::invalid_output(format!(
                "card id {id} outside deck range 0..{DECK_SIZE}"
            )));
        }
        if !seen.insert(id) {
            return Err(StageError::invalid_output(format!("duplicate card id {id}")));
        }
    }

    if !(0.0..=1.0).contains(&selection.confidence) || !selection.confidence.is_finite() {
        return Err(StageError::invalid_output(format!(
            "confidence {} outside [0, 1]",
            selection.confidence
        )));
    }

    Ok(())
}

#[async_trait]
pub trait SelectionStage: Send + Sync {
    /// Select `analysis.recommended_count` cards for the question.
    /// Implementations validate their own output before returning.
    async fn select(
        &self,
        question: &str,
        analysis: &QuestionAnalysis,
    ) -> Result<CardSelection, StageError>;
}

/// Deterministic in-process selection for dev/test.
///
/// Walks the deck from a hash-seeded start with a stride coprime to the deck
/// size, which yields unique ids without bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct LocalSelectionStage;

// All coprime with 78 (= 2 * 3 * 13).
const STRIDES: [u8; 8] = [5, 7, 11, 17, 19, 23, 25, 29];

#[async_trait]
impl SelectionStage for LocalSelectionStage {
    async fn select(
        &self,
        question: &str,
        analysis: &QuestionAnalysis,
    ) -> Result<CardSelection, StageError> {
        let mut hasher = DefaultHasher::new();
        question.trim().to_lowercase().hash(&mut hasher);
        analysis.topic.hash(&mut hasher);
        let seed = hasher.finish();

        let start = (seed % DECK_SIZE as u64) as u8;
        let stride = STRIDES[((seed >> 16) % STRIDES.len() as u64) as usize];

        let card_ids: Vec<u8> = (0..analysis.recommended_count)
            .map(|i| ((start as u16 + i as u16 * stride as u16) % DECK_SIZE as u16) as u8)
            .collect();

        let selection = CardSelection {
            card_ids,
            reasoning: format!(
                "spread of {} drawn for a {} question about {}",
                analysis.recommended_count, analysis.mood, analysis.topic
            ),
            confidence: 0.85,
        };

        validate_selection(&selection, analysis.recommended_count)?;
        Ok(selection)
    }
}
