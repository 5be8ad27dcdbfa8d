//! Nutrition facts: the profile value object and the lookup client seam.

mod dto;
pub mod fdc;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;

pub use fdc::FdcClient;

/// Nutrients for one logged portion. Core macros are always present; anything
/// else FDC reports lands in `micros`, keyed as `<nutrient>_<unit>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientProfile {
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    #[serde(default)]
    pub sugars_g: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub micros: BTreeMap<String, f64>,
}

impl NutrientProfile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let core = [
            ("calories", self.calories),
            ("protein_g", self.protein_g),
            ("fat_g", self.fat_g),
            ("carbs_g", self.carbs_g),
            ("sugars_g", self.sugars_g),
        ];
        let micros = self.micros.iter().map(|(k, v)| (k.as_str(), *v));
        for (name, value) in core.into_iter().chain(micros) {
            if !value.is_finite() {
                return Err(ValidationError(format!("{name} must be a finite number")));
            }
            if value < 0.0 {
                return Err(ValidationError(format!("{name} must not be negative")));
            }
        }
        Ok(())
    }

    /// Multiplies every nutrient by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein_g: self.protein_g * factor,
            fat_g: self.fat_g * factor,
            carbs_g: self.carbs_g * factor,
            sugars_g: self.sugars_g * factor,
            micros: self
                .micros
                .iter()
                .map(|(k, v)| (k.clone(), v * factor))
                .collect(),
        }
    }
}

/// A resolved food and its nutrients.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodMatch {
    pub fdc_id: Option<i64>,
    pub description: String,
    pub profile: NutrientProfile,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LookupError {
    /// Definitive: the database has no match. Never retried.
    #[error("no nutrition data found for '{0}'")]
    NotFound(String),
    /// Network failure, timeout or an unusable response from the source.
    #[error("nutrition service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[async_trait]
pub trait NutritionLookup: Send + Sync {
    /// Resolves a description to nutrients for one reference portion.
    async fn lookup(&self, description: &str) -> Result<FoodMatch, LookupError>;

    /// Resolves a description and scales the profile to `portion` reference
    /// amounts (default one).
    async fn profile_for(
        &self,
        description: &str,
        portion: Option<f64>,
    ) -> Result<FoodMatch, LookupError> {
        let mut found = self.lookup(description).await?;
        if let Some(p) = portion {
            found.profile = found.profile.scaled(p);
        }
        Ok(found)
    }
}

/// Canonical form used to recognize a food description that was seen before.
pub fn normalize_food_key(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
