use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::instrument;

use super::services::{check_feedback_service, check_store, HealthReport, HealthStatus};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "foodlog-coach is running" }))
}

#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let timeout = state.config.health_timeout;
    let (store, feedback_service) = tokio::join!(
        check_store(state.store.as_ref(), timeout),
        check_feedback_service(state.coach.as_ref(), &state.config.ollama.model, timeout),
    );
    let report = HealthReport::new(store, feedback_service);
    let code = if report.status == HealthStatus::Unreachable {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(report))
}
