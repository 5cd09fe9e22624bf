//! Narration stage: turn a spread into a structured reading.

use std::sync::Arc;

use async_trait::async_trait;

use arcana_cards::CardCatalog;
use arcana_core::{CardInterpretation, QuestionAnalysis, Reading};

use crate::error::StageError;

const DISCLAIMER: &str =
    "This reading is for reflection and entertainment; it is not professional advice.";

/// Validate a reading against the contract: one entry per selected card, in
/// order, and non-empty required narrative fields.
pub fn validate_reading(reading: &Reading, card_ids: &[u8]) -> Result<(), StageError> {
    if reading.cards.len() != card_ids.len() {
        return Err(StageError::invalid_output(format!(
            "expected {} card interpretations, got {}",
            card_ids.len(),
            reading.cards.len()
        )));
    }
    for (i, (interp, &expected)) in reading.cards.iter().zip(card_ids).enumerate() {
        if interp.card_id != expected {
            return Err(StageError::invalid_output(format!(
                "card at position {i} interprets id {} but {expected} was selected",
                interp.card_id
            )));
        }
        if interp.name.trim().is_empty() || interp.meaning.trim().is_empty() {
            return Err(StageError::invalid_output(format!(
                "card at position {i} is missing name or meaning"
            )));
        }
    }
    for (field, value) in [
        ("header", &reading.header),
        ("body", &reading.body),
        ("summary", &reading.summary),
        ("disclaimer", &reading.disclaimer),
    ] {
        if value.trim().is_empty() {
            return Err(StageError::invalid_output(format!("{field} must be non-empty")));
        }
    }
    Ok(())
}

/// Fixed deterministic reading substituted when narration exhausts its
/// retries. Built purely from catalog entries so a malformed external
/// response degrades gracefully instead of failing a job that already has a
/// valid spread.
pub fn fallback_reading(catalog: &CardCatalog, card_ids: &[u8]) -> Reading {
    let cards: Vec<CardInterpretation> = card_ids
        .iter()
        .map(|&id| match catalog.get(id) {
            Some(card) => CardInterpretation {
                card_id: id,
                name: card.name.clone(),
                meaning: card.upright_meaning.clone(),
            },
            None => CardInterpretation {
                card_id: id,
                name: format!("Card {id}"),
                meaning: "An unmarked card; let its position speak.".to_string(),
            },
        })
        .collect();

    let names: Vec<&str> = cards.iter().map(|c| c.name.as_str()).collect();

    Reading {
        header: "Your cards have been drawn".to_string(),
        body: format!(
            "The spread shows {}. Take each card in turn and notice what it stirs.",
            names.join(", ")
        ),
        cards,
        suggestions: vec![
            "Sit with the spread before acting on it.".to_string(),
            "Return to the question in a few days.".to_string(),
        ],
        followups: vec!["What part of this question is within my control?".to_string()],
        summary: "The cards are laid out; their fuller story was left unspoken this time."
            .to_string(),
        disclaimer: DISCLAIMER.to_string(),
    }
}

#[async_trait]
pub trait NarrationStage: Send + Sync {
    /// Narrate a validated spread. Implementations validate their own output
    /// before returning.
    async fn narrate(
        &self,
        question: &str,
        analysis: &QuestionAnalysis,
        card_ids: &[u8],
    ) -> Result<Reading, StageError>;
}

/// Deterministic in-process narration for dev/test, templated over the
/// catalog's card meanings.
#[derive(Debug, Clone)]
pub struct LocalNarrationStage {
    catalog: Arc<CardCatalog>,
}

impl LocalNarrationStage {
    pub fn new(catalog: Arc<CardCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl NarrationStage for LocalNarrationStage {
    async fn narrate(
        &self,
        question: &str,
        analysis: &QuestionAnalysis,
        card_ids: &[u8],
    ) -> Result<Reading, StageError> {
        let cards: Vec<CardInterpretation> = card_ids
            .iter()
            .map(|&id| {
                let card = self
                    .catalog
                    .get(id)
                    .ok_or_else(|| StageError::invalid_output(format!("unknown card id {id}")))?;
                Ok(CardInterpretation {
                    card_id: id,
                    name: card.name.clone(),
                    meaning: format!(
                        "For a {} question about {}: {}",
                        analysis.mood, analysis.topic, card.upright_meaning
                    ),
                })
            })
            .collect::<Result<_, StageError>>()?;

        let reading = Reading {
            header: format!("A {}-card reading on {}", cards.len(), analysis.topic),
            body: format!(
                "You asked: \"{}\". Across the {}, the cards trace a path through {}.",
                question.trim(),
                analysis.period,
                cards
                    .iter()
                    .flat_map(|c| self.catalog.get(c.card_id))
                    .flat_map(|c| c.keywords.first())
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            cards,
            suggestions: vec![
                format!("Let the {} mood settle before deciding anything.", analysis.mood),
                "Write down what the first card brought to mind.".to_string(),
            ],
            followups: vec![
                format!("What would change if the {} resolved itself?", analysis.topic),
                "What am I not asking?".to_string(),
            ],
            summary: format!(
                "The spread leans toward {} in the {}.",
                analysis.topic, analysis.period
            ),
            disclaimer: DISCLAIMER.to_string(),
        };

        validate_reading(&reading, card_ids)?;
        Ok(reading)
    }
}
