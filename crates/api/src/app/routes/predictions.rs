use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use arcana_core::{JobId, Prediction, UserId};
use arcana_infra::{RateLimitDecision, StoreError};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

const MAX_QUESTION_LEN: usize = 500;

/// `POST /predict` — validate, rate-limit, pre-check credit, persist a
/// PENDING record, schedule the orchestrator as a detached task, return
/// immediately. Everything after scheduling is observable only via the
/// status endpoint.
pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SubmitRequest>,
) -> axum::response::Response {
    let question = body.question.trim().to_string();
    if question.is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "question must not be empty",
        );
    }
    if question.chars().count() > MAX_QUESTION_LEN {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("question must be at most {MAX_QUESTION_LEN} characters"),
        );
    }

    let user_id = match body.user_identifier {
        Some(raw) => match UserId::new(raw) {
            Ok(id) => Some(id),
            Err(e) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    e.to_string(),
                )
            }
        },
        None => None,
    };

    // Cooldown + credit pre-checks apply only to identified users.
    if let Some(user) = &user_id {
        match services.rate_limiter.check(user).await {
            Ok(RateLimitDecision::Allowed) => {}
            Ok(RateLimitDecision::Limited { retry_after_secs }) => {
                return errors::rate_limited(retry_after_secs)
            }
            Err(e) => return errors::store_error_to_response(e),
        }

        match services.ledger.balance(user).await {
            Ok(balance) if balance >= arcana_ledger::READING_COST => {}
            Ok(balance) => {
                return errors::ledger_error_to_response(
                    arcana_ledger::LedgerError::InsufficientCredits { balance },
                )
            }
            Err(e) => return errors::ledger_error_to_response(e),
        }
    }

    let job_id = JobId::generate();
    let prediction = Prediction::new(job_id.clone(), question.clone(), user_id.clone());
    if let Err(e) = services.store.create(prediction).await {
        return match e {
            // A collision on a freshly generated id means something is very
            // wrong; don't blame the database.
            StoreError::AlreadyExists(_) => errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "job id collision",
            ),
            other => errors::store_error_to_response(other),
        };
    }

    let orchestrator = services.orchestrator.clone();
    let task_job_id = job_id.clone();
    let scheduled = services.spawner.submit(Box::pin(async move {
        if let Err(e) = orchestrator
            .run(task_job_id.clone(), question, user_id)
            .await
        {
            tracing::error!(job_id = %task_job_id, error = %e, "prediction workflow failed");
        }
    }));

    if let Err(e) = scheduled {
        tracing::error!(job_id = %job_id, error = %e, "failed to schedule workflow");
        return errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "WORKFLOW_ERROR",
            "failed to schedule the prediction workflow",
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "jobId": job_id.as_str(),
            "status": "PENDING",
            "message": "your reading is being prepared; poll the status endpoint",
        })),
    )
        .into_response()
}

/// `GET /predict/:job_id` — report the latest durable state.
pub async fn status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match job_id.parse() {
        Ok(id) => id,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "INVALID_JOB_ID", e.to_string())
        }
    };

    let prediction = match services.store.get(&job_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "PREDICTION_NOT_FOUND",
                format!("no prediction with id {job_id}"),
            )
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    // Defensive: a row whose key does not match the requested id means the
    // store is lying to us.
    if prediction.job_id != job_id {
        return errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DATA_INTEGRITY_ERROR",
            "fetched record does not match the requested job id",
        );
    }

    (StatusCode::OK, Json(dto::prediction_to_status_json(&prediction))).into_response()
}
