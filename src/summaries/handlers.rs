use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{DayQuery, MonthQuery, Summary, WeekQuery, YearQuery};
use super::services::summarize_period;
use super::window::Period;
use crate::error::{AppError, ValidationError};
use crate::extract::ValidQuery;
use crate::{owner::Owner, state::AppState};

const MIN_YEAR: i32 = 1900;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/summaries/daily", get(daily))
        .route("/summaries/weekly", get(weekly))
        .route("/summaries/monthly", get(monthly))
        .route("/summaries/yearly", get(yearly))
}

#[instrument(skip(state))]
pub async fn daily(
    State(state): State<AppState>,
    owner: Owner,
    ValidQuery(q): ValidQuery<DayQuery>,
) -> Result<Json<Summary>, AppError> {
    let summary = summarize_period(&state, &owner, Period::Day(q.date), q.tz.as_deref()).await?;
    Ok(Json(summary))
}

#[instrument(skip(state))]
pub async fn weekly(
    State(state): State<AppState>,
    owner: Owner,
    ValidQuery(q): ValidQuery<WeekQuery>,
) -> Result<Json<Summary>, AppError> {
    let summary = summarize_period(&state, &owner, Period::Week(q.date), q.tz.as_deref()).await?;
    Ok(Json(summary))
}

#[instrument(skip(state))]
pub async fn monthly(
    State(state): State<AppState>,
    owner: Owner,
    ValidQuery(q): ValidQuery<MonthQuery>,
) -> Result<Json<Summary>, AppError> {
    check_year(q.year)?;
    if !(1..=12).contains(&q.month) {
        return Err(ValidationError::new("month must be between 1 and 12").into());
    }
    let period = Period::Month { year: q.year, month: q.month };
    let summary = summarize_period(&state, &owner, period, q.tz.as_deref()).await?;
    Ok(Json(summary))
}

#[instrument(skip(state))]
pub async fn yearly(
    State(state): State<AppState>,
    owner: Owner,
    ValidQuery(q): ValidQuery<YearQuery>,
) -> Result<Json<Summary>, AppError> {
    check_year(q.year)?;
    let summary = summarize_period(&state, &owner, Period::Year(q.year), q.tz.as_deref()).await?;
    Ok(Json(summary))
}

fn check_year(year: i32) -> Result<(), ValidationError> {
    if year < MIN_YEAR {
        return Err(ValidationError(format!("year must be {MIN_YEAR} or later")));
    }
    Ok(())
}
