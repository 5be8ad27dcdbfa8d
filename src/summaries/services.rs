use std::collections::BTreeMap;

use tracing::debug;

use super::dto::{Aggregate, Summary, TopFood};
use super::window::{resolve_timezone, Period, SummaryWindow};
use crate::error::AppError;
use crate::meals::repo_types::MealLogEntry;
use crate::nutrition::{normalize_food_key, NutrientProfile};
use crate::owner::Owner;
use crate::state::AppState;

const TOP_FOODS: usize = 3;

/// Reduces a set of entries to totals, per-meal averages and top foods.
/// Pure: the same entries always give the same aggregate.
pub fn summarize(entries: &[MealLogEntry]) -> Aggregate {
    let mut totals = NutrientProfile::default();
    let mut profiled = 0usize;
    let mut by_food: BTreeMap<String, f64> = BTreeMap::new();

    for entry in entries {
        let Some(p) = entry.nutrition.as_ref() else {
            continue;
        };
        profiled += 1;
        totals.calories += p.calories;
        totals.protein_g += p.protein_g;
        totals.fat_g += p.fat_g;
        totals.carbs_g += p.carbs_g;
        totals.sugars_g += p.sugars_g;
        for (k, v) in &p.micros {
            *totals.micros.entry(k.clone()).or_insert(0.0) += v;
        }
        *by_food.entry(normalize_food_key(&entry.food_name)).or_insert(0.0) += p.calories;
    }

    let averages = (profiled > 0).then(|| totals.scaled(1.0 / profiled as f64));

    let mut top_foods: Vec<TopFood> = by_food
        .into_iter()
        .map(|(food_name, calories)| TopFood { food_name, calories })
        .collect();
    // BTreeMap order already sorts names, so a stable sort keeps name as tiebreak
    top_foods.sort_by(|a, b| b.calories.total_cmp(&a.calories));
    top_foods.truncate(TOP_FOODS);

    Aggregate {
        count: entries.len(),
        profiled_count: profiled,
        totals,
        averages,
        top_foods,
    }
}

/// Resolves the window for `period` in `tz` (or the default zone) and
/// aggregates the owner's entries inside it.
pub async fn summarize_period(
    state: &AppState,
    owner: &Owner,
    period: Period,
    tz: Option<&str>,
) -> Result<Summary, AppError> {
    let tz = resolve_timezone(tz, state.config.default_timezone)?;
    let window = SummaryWindow::for_period(period, tz)?;
    let entries = state.store.list_by_owner_and_window(owner, &window).await?;
    debug!(%owner, period = period.kind(), entries = entries.len(), "summarizing");

    let (start_date, _) = period.date_bounds()?;
    Ok(Summary {
        period: period.kind(),
        label: label(period, start_date),
        start_date,
        timezone: tz.name().to_string(),
        window,
        aggregate: summarize(&entries),
    })
}

fn label(period: Period, start: chrono::NaiveDate) -> String {
    match period {
        Period::Day(d) => d.to_string(),
        Period::Week(_) => format!("week of {start}"),
        Period::Month { year, month } => format!("{year}-{month:02}"),
        Period::Year(year) => year.to_string(),
    }
}
