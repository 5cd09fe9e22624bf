use axum::{
    routing::{get, post},
    Router,
};

pub mod cards;
pub mod credits;
pub mod predictions;
pub mod system;

/// Router for all application endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/predict", post(predictions::submit))
        .route("/predict/:job_id", get(predictions::status))
        .nest("/cards", cards::router())
        .nest("/credits", credits::router())
}
