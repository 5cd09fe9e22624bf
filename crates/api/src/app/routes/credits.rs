use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use arcana_core::UserId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/topup", post(topup))
        .route("/:user_identifier", get(balance))
}

pub async fn topup(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::TopupRequest>,
) -> axum::response::Response {
    let user = match UserId::new(body.user_identifier) {
        Ok(u) => u,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
        }
    };

    match services
        .ledger
        .topup(&user, body.amount, serde_json::json!({ "source": "api" }))
        .await
    {
        Ok(tx) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "userId": user.as_str(),
                "balance": tx.balance_after,
                "transactionId": tx.id,
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_identifier): Path<String>,
) -> axum::response::Response {
    let user = match UserId::new(user_identifier) {
        Ok(u) => u,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
        }
    };

    match services.ledger.balance(&user).await {
        Ok(balance) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "userId": user.as_str(),
                "balance": balance,
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
