use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_cards))
        .route("/:card_id", get(get_card))
}

pub async fn list_cards(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services
        .catalog
        .all()
        .iter()
        .map(dto::card_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_card(
    Extension(services): Extension<Arc<AppServices>>,
    Path(card_id): Path<String>,
) -> axum::response::Response {
    let card_id: u8 = match card_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "INVALID_CARD_ID",
                "card id must be a number in the deck range",
            )
        }
    };

    match services.catalog.get(card_id) {
        Some(card) => (StatusCode::OK, Json(dto::card_to_json(card))).into_response(),
        None => errors::json_error(
            StatusCode::NOT_FOUND,
            "CARD_NOT_FOUND",
            format!("no card with id {card_id}"),
        ),
    }
}
