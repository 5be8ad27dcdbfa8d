//! FoodData Central wire formats. Only the fields the mapper reads.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    #[serde(default)]
    pub foods: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SearchHit {
    pub fdc_id: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FoodDetails {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub food_nutrients: Vec<FoodNutrient>,
}

/// FDC serves two shapes: abridged (`nutrientName` / `value`) and full
/// (`nutrient.name` / `amount`). Both are accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FoodNutrient {
    nutrient_name: Option<String>,
    unit_name: Option<String>,
    value: Option<f64>,
    amount: Option<f64>,
    nutrient: Option<NutrientInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NutrientInfo {
    name: Option<String>,
    unit_name: Option<String>,
}

impl FoodNutrient {
    pub fn name(&self) -> Option<&str> {
        self.nutrient_name
            .as_deref()
            .or_else(|| self.nutrient.as_ref().and_then(|n| n.name.as_deref()))
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit_name
            .as_deref()
            .or_else(|| self.nutrient.as_ref().and_then(|n| n.unit_name.as_deref()))
    }

    pub fn amount(&self) -> f64 {
        self.value.or(self.amount).unwrap_or(0.0)
    }
}
