//! Stage-output value objects embedded in a prediction record.
//!
//! These are *insights* produced by the external capabilities, not domain
//! events. The orchestrator persists them verbatim once their shape has been
//! validated at the stage boundary.

use serde::{Deserialize, Serialize};

/// Upper bound on how many cards an analysis may recommend for one spread.
pub const MAX_RECOMMENDED_CARDS: u8 = 5;

/// Output of the question-analysis stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnalysis {
    /// Emotional register detected in the question (e.g. "hopeful").
    pub mood: String,
    /// Dominant theme (e.g. "love", "career").
    pub topic: String,
    /// Time horizon the question concerns (e.g. "near future").
    pub period: String,
    /// Free-form context carried forward to selection and narration.
    pub context: String,
    /// How many cards the spread should contain.
    pub recommended_count: u8,
}

/// One card's interpretation within a reading, in spread order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInterpretation {
    pub card_id: u8,
    pub name: String,
    pub meaning: String,
}

/// Structured narrative produced by the narration stage.
///
/// `cards` carries exactly one entry per selected card, in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub header: String,
    pub cards: Vec<CardInterpretation>,
    pub body: String,
    pub suggestions: Vec<String>,
    pub followups: Vec<String>,
    pub summary: String,
    pub disclaimer: String,
}
