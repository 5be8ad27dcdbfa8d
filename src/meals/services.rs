use tracing::{debug, info, warn};

use super::dto::{CreateFoodLogRequest, ListQuery, MAX_PAGE_LIMIT};
use super::repo_types::{MealLogEntry, NewMealLogEntry, NutritionSource};
use crate::config::LookupFailurePolicy;
use crate::error::{AppError, ValidationError};
use crate::nutrition::{normalize_food_key, FoodMatch, LookupError};
use crate::owner::Owner;
use crate::state::AppState;
use crate::summaries::window::{resolve_timezone, Period, SummaryWindow};

/// Validates a log request, attaches nutrition (manual, reused or looked up)
/// and stores it.
pub async fn log_meal(
    state: &AppState,
    owner: Owner,
    req: CreateFoodLogRequest,
) -> Result<MealLogEntry, AppError> {
    let food_name = req
        .food_name
        .ok_or_else(|| ValidationError::new("food_name is required"))?;
    let quantity = req
        .quantity
        .ok_or_else(|| ValidationError::new("quantity is required"))?;

    let mut entry = NewMealLogEntry {
        owner,
        food_name,
        quantity,
        logged_at: req.timestamp,
        nutrition: None,
        nutrition_source: NutritionSource::Missing,
        fdc_id: None,
    };

    if let Some(manual) = req.nutrition {
        entry.nutrition = Some(manual);
        entry.nutrition_source = NutritionSource::Manual;
        entry.validate()?;
    } else {
        // nothing goes out to FDC for a request we would reject anyway
        entry.validate()?;
        match resolve_profile(state, &entry.food_name, entry.quantity).await {
            Ok(found) => {
                debug!(food = %entry.food_name, matched = %found.description, "nutrition resolved");
                entry.nutrition = Some(found.profile);
                entry.nutrition_source = NutritionSource::Fdc;
                entry.fdc_id = found.fdc_id;
            }
            Err(e) => match state.config.lookup_failure_policy {
                LookupFailurePolicy::Reject => return Err(e.into()),
                LookupFailurePolicy::Store => {
                    warn!(error = %e, food = %entry.food_name, "storing entry without nutrition");
                }
            },
        }
    }

    let stored = state.store.create(entry).await?;
    info!(
        id = %stored.id,
        owner = %stored.owner,
        source = stored.nutrition_source.as_str(),
        "food log created"
    );
    Ok(stored)
}

/// Reuses the last FDC profile seen for the same food before asking FDC.
async fn resolve_profile(
    state: &AppState,
    food_name: &str,
    quantity: f64,
) -> Result<FoodMatch, LookupError> {
    let key = normalize_food_key(food_name);
    match state.store.latest_reference(&key).await {
        Ok(Some(reference)) => {
            debug!(food = %key, fdc_id = ?reference.fdc_id, "reusing stored nutrition");
            return Ok(FoodMatch {
                fdc_id: reference.fdc_id,
                description: reference.food_name,
                profile: reference.per_portion.scaled(quantity),
            });
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, food = %key, "reference lookup failed, asking FDC"),
    }
    state.nutrition.profile_for(food_name, Some(quantity)).await
}

pub async fn list_logs(
    state: &AppState,
    owner: &Owner,
    query: ListQuery,
) -> Result<Vec<MealLogEntry>, AppError> {
    if query.skip < 0 {
        return Err(ValidationError::new("skip must not be negative").into());
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&query.limit) {
        return Err(ValidationError(format!("limit must be between 1 and {MAX_PAGE_LIMIT}")).into());
    }
    let tz = resolve_timezone(query.tz.as_deref(), state.config.default_timezone)?;
    let window = query
        .date
        .map(|d| SummaryWindow::for_period(Period::Day(d), tz))
        .transpose()?;

    let entries = state
        .store
        .page_by_owner(owner, window.as_ref(), query.skip, query.limit)
        .await?;
    Ok(entries)
}
