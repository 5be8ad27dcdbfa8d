use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{CreateFoodLogRequest, FoodLogList, ListQuery};
use super::repo_types::MealLogEntry;
use super::services::{list_logs, log_meal};
use crate::extract::{ValidJson, ValidQuery};
use crate::{error::AppError, owner::Owner, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/foodlogs", get(list_food_logs).post(create_food_log))
        .route("/foodlogs/", get(list_food_logs).post(create_food_log))
}

#[instrument(skip(state, body))]
pub async fn create_food_log(
    State(state): State<AppState>,
    owner: Owner,
    ValidJson(body): ValidJson<CreateFoodLogRequest>,
) -> Result<(StatusCode, HeaderMap, Json<MealLogEntry>), AppError> {
    let entry = log_meal(&state, owner, body).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/foodlogs/{}", entry.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(entry)))
}

#[instrument(skip(state))]
pub async fn list_food_logs(
    State(state): State<AppState>,
    owner: Owner,
    ValidQuery(q): ValidQuery<ListQuery>,
) -> Result<Json<FoodLogList>, AppError> {
    let (skip, limit) = (q.skip, q.limit);
    let items = list_logs(&state, &owner, q).await?;
    Ok(Json(FoodLogList { items, skip, limit }))
}
