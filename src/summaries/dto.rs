use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::window::SummaryWindow;
use crate::nutrition::NutrientProfile;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopFood {
    pub food_name: String,
    pub calories: f64,
}

/// Numbers derived from a set of entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub count: usize,
    /// Entries that carried a nutrient profile; the divisor for `averages`.
    pub profiled_count: usize,
    pub totals: NutrientProfile,
    pub averages: Option<NutrientProfile>,
    pub top_foods: Vec<TopFood>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub period: &'static str,
    pub label: String,
    pub start_date: NaiveDate,
    pub timezone: String,
    pub window: SummaryWindow,
    #[serde(flatten)]
    pub aggregate: Aggregate,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: NaiveDate,
    pub tz: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    #[serde(alias = "start_date")]
    pub date: NaiveDate,
    pub tz: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
    pub tz: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: i32,
    pub tz: Option<String>,
}
