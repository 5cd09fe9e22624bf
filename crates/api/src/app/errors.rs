use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use arcana_infra::StoreError;
use arcana_ledger::LedgerError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 429 with the seconds the caller must wait before resubmitting.
pub fn rate_limited(retry_after_secs: u64) -> axum::response::Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        axum::Json(json!({
            "error": "TOO_MANY_REQUESTS",
            "message": format!("please wait {retry_after_secs}s before submitting again"),
            "retryAfter": retry_after_secs,
        })),
    )
        .into_response()
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "DATABASE_ERROR",
        err.to_string(),
    )
}

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        // Explicit 402 mapping; the distinct code exists, use it.
        LedgerError::InsufficientCredits { balance } => json_error(
            StatusCode::PAYMENT_REQUIRED,
            "INSUFFICIENT_CREDITS",
            format!("a reading costs 1 credit; current balance is {balance}"),
        ),
        LedgerError::InvalidAmount(amount) => json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("amount must be positive, got {amount}"),
        ),
        LedgerError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", msg)
        }
    }
}
