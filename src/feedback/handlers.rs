use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::FeedbackResponse;
use super::prompt::build_prompt;
use crate::error::AppError;
use crate::extract::ValidQuery;
use crate::owner::Owner;
use crate::state::AppState;
use crate::summaries::dto::{DayQuery, WeekQuery};
use crate::summaries::services::summarize_period;
use crate::summaries::window::Period;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feedback/daily", get(daily_feedback))
        .route("/feedback/weekly", get(weekly_feedback))
}

#[instrument(skip(state))]
pub async fn daily_feedback(
    State(state): State<AppState>,
    owner: Owner,
    ValidQuery(q): ValidQuery<DayQuery>,
) -> Result<Json<FeedbackResponse>, AppError> {
    with_feedback(&state, &owner, Period::Day(q.date), q.tz.as_deref()).await
}

#[instrument(skip(state))]
pub async fn weekly_feedback(
    State(state): State<AppState>,
    owner: Owner,
    ValidQuery(q): ValidQuery<WeekQuery>,
) -> Result<Json<FeedbackResponse>, AppError> {
    with_feedback(&state, &owner, Period::Week(q.date), q.tz.as_deref()).await
}

/// Only the summary can fail; the coach's answer is attached as-is.
async fn with_feedback(
    state: &AppState,
    owner: &Owner,
    period: Period,
    tz: Option<&str>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let summary = summarize_period(state, owner, period, tz).await?;
    let outcome = state.coach.generate(&build_prompt(&summary)).await;
    Ok(Json(FeedbackResponse {
        feedback: outcome.text().to_string(),
        feedback_status: outcome.status(),
        summary,
    }))
}
