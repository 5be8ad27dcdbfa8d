use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::MealLogEntry;
use crate::nutrition::NutrientProfile;

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Body of `POST /foodlogs`. Required fields are optional here so a missing
/// one is reported by name from the service layer.
#[derive(Debug, Deserialize)]
pub struct CreateFoodLogRequest {
    #[serde(alias = "food")]
    pub food_name: Option<String>,
    #[serde(alias = "portion")]
    pub quantity: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    pub nutrition: Option<NutrientProfile>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<NaiveDate>,
    pub tz: Option<String>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

#[derive(Debug, Serialize)]
pub struct FoodLogList {
    pub items: Vec<MealLogEntry>,
    pub skip: i64,
    pub limit: i64,
}
