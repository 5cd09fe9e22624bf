use serde::Deserialize;

use arcana_cards::Card;
use arcana_core::{Prediction, PredictionStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub question: String,
    pub user_identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupRequest {
    pub user_identifier: String,
    pub amount: i64,
}

// -------------------------
// JSON mapping helpers
// -------------------------

/// Status-endpoint body: `result` appears only on COMPLETED, `error` only on
/// FAILED; a mid-flight poll sees whatever checkpoints exist so far.
pub fn prediction_to_status_json(p: &Prediction) -> serde_json::Value {
    let mut body = serde_json::json!({
        "jobId": p.job_id.as_str(),
        "status": p.status,
        "question": p.question,
        "createdAt": p.created_at.to_rfc3339(),
    });

    let obj = body.as_object_mut().unwrap();
    if let Some(at) = p.completed_at {
        obj.insert("completedAt".into(), serde_json::json!(at.to_rfc3339()));
    }
    if p.status == PredictionStatus::Completed {
        obj.insert(
            "result".into(),
            serde_json::json!({
                "selectedCards": p.selected_cards,
                "analysis": p.analysis,
                "reading": p.reading,
            }),
        );
    }
    if p.status == PredictionStatus::Failed {
        if let Some(error) = &p.error {
            obj.insert("error".into(), serde_json::json!(error));
        }
    }

    body
}

pub fn card_to_json(card: &Card) -> serde_json::Value {
    serde_json::json!({
        "cardId": card.card_id,
        "name": card.name,
        "arcana": card.arcana,
        "keywords": card.keywords,
        "uprightMeaning": card.upright_meaning,
        "reversedMeaning": card.reversed_meaning,
    })
}
