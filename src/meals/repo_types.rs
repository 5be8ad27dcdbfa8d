use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::nutrition::NutrientProfile;
use crate::owner::Owner;

const MAX_FOOD_NAME_CHARS: usize = 200;

/// Where an entry's nutrient profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NutritionSource {
    Fdc,
    Manual,
    #[serde(rename = "none")]
    Missing,
}

impl NutritionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            NutritionSource::Fdc => "fdc",
            NutritionSource::Manual => "manual",
            NutritionSource::Missing => "none",
        }
    }

    fn from_db(s: &str) -> Self {
        match s {
            "fdc" => NutritionSource::Fdc,
            "manual" => NutritionSource::Manual,
            _ => NutritionSource::Missing,
        }
    }
}

/// A stored meal log. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealLogEntry {
    pub id: Uuid,
    pub owner: String,
    pub food_name: String,
    pub quantity: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub logged_at: OffsetDateTime,
    pub nutrition: Option<NutrientProfile>,
    pub nutrition_source: NutritionSource,
    pub fdc_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input to `MealLogStore::create`.
#[derive(Debug, Clone)]
pub struct NewMealLogEntry {
    pub owner: Owner,
    pub food_name: String,
    pub quantity: f64,
    pub logged_at: Option<OffsetDateTime>,
    pub nutrition: Option<NutrientProfile>,
    pub nutrition_source: NutritionSource,
    pub fdc_id: Option<i64>,
}

impl NewMealLogEntry {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.food_name.trim();
        if name.is_empty() {
            return Err(ValidationError::new("food_name is required"));
        }
        if name.chars().count() > MAX_FOOD_NAME_CHARS {
            return Err(ValidationError(format!(
                "food_name must be at most {MAX_FOOD_NAME_CHARS} characters"
            )));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(ValidationError::new("quantity must be a positive number"));
        }
        match (&self.nutrition, self.nutrition_source) {
            (Some(profile), NutritionSource::Fdc | NutritionSource::Manual) => profile.validate(),
            (None, NutritionSource::Missing) => Ok(()),
            _ => Err(ValidationError::new(
                "nutrition and nutrition_source disagree",
            )),
        }
    }

    /// Validates and fills in what the store assigns: id, UTC timestamp
    /// (now when absent, truncated to the database's microsecond precision).
    pub fn prepare(self, now: OffsetDateTime) -> Result<MealLogEntry, ValidationError> {
        self.validate()?;
        let now = truncate_to_micros(now.to_offset(UtcOffset::UTC));
        let logged_at = self
            .logged_at
            .map(|t| truncate_to_micros(t.to_offset(UtcOffset::UTC)))
            .unwrap_or(now);
        Ok(MealLogEntry {
            id: Uuid::new_v4(),
            owner: self.owner.as_str().to_string(),
            food_name: self.food_name.trim().to_string(),
            quantity: self.quantity,
            logged_at,
            nutrition: self.nutrition,
            nutrition_source: self.nutrition_source,
            fdc_id: self.fdc_id,
            created_at: now,
        })
    }
}

fn truncate_to_micros(t: OffsetDateTime) -> OffsetDateTime {
    t.replace_nanosecond(t.nanosecond() / 1_000 * 1_000).unwrap_or(t)
}

/// Most recent FDC-sourced profile for a food, rescaled to one portion.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceProfile {
    pub fdc_id: Option<i64>,
    pub food_name: String,
    pub per_portion: NutrientProfile,
}

impl ReferenceProfile {
    pub fn from_entry(entry: &MealLogEntry) -> Option<Self> {
        let profile = entry.nutrition.as_ref()?;
        Some(Self {
            fdc_id: entry.fdc_id,
            food_name: entry.food_name.clone(),
            per_portion: profile.scaled(1.0 / entry.quantity),
        })
    }
}

/// Row shape of `food_logs`.
#[derive(Debug, FromRow)]
pub struct FoodLogRow {
    pub id: Uuid,
    pub owner_id: String,
    pub food_name: String,
    pub quantity: f64,
    pub logged_at: OffsetDateTime,
    pub nutrition_source: String,
    pub fdc_id: Option<i64>,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub sugars_g: Option<f64>,
    pub micros: Json<BTreeMap<String, f64>>,
    pub created_at: OffsetDateTime,
}

impl From<FoodLogRow> for MealLogEntry {
    fn from(r: FoodLogRow) -> Self {
        let source = NutritionSource::from_db(&r.nutrition_source);
        let nutrition = match source {
            NutritionSource::Missing => None,
            NutritionSource::Fdc | NutritionSource::Manual => Some(NutrientProfile {
                calories: r.calories.unwrap_or(0.0),
                protein_g: r.protein_g.unwrap_or(0.0),
                fat_g: r.fat_g.unwrap_or(0.0),
                carbs_g: r.carbs_g.unwrap_or(0.0),
                sugars_g: r.sugars_g.unwrap_or(0.0),
                micros: r.micros.0,
            }),
        };
        Self {
            id: r.id,
            owner: r.owner_id,
            food_name: r.food_name,
            quantity: r.quantity,
            logged_at: r.logged_at,
            nutrition,
            nutrition_source: source,
            fdc_id: r.fdc_id,
            created_at: r.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn draft() -> NewMealLogEntry {
        NewMealLogEntry {
            owner: Owner::parse("alice").unwrap(),
            food_name: "  banana ".into(),
            quantity: 1.0,
            logged_at: None,
            nutrition: None,
            nutrition_source: NutritionSource::Missing,
            fdc_id: None,
        }
    }

    #[test]
    fn prepare_assigns_id_and_defaults_timestamp() {
        let now = datetime!(2024-03-10 14:00:00.123456789 UTC);
        let entry = draft().prepare(now).unwrap();
        assert_eq!(entry.food_name, "banana");
        assert_eq!(entry.logged_at, datetime!(2024-03-10 14:00:00.123456 UTC));
        assert_eq!(entry.created_at, entry.logged_at);
        assert_eq!(entry.owner, "alice");
    }

    #[test]
    fn prepare_normalizes_timestamp_to_utc() {
        let mut d = draft();
        d.logged_at = Some(datetime!(2024-03-10 09:00 -5));
        let entry = d.prepare(datetime!(2024-03-11 00:00 UTC)).unwrap();
        assert_eq!(entry.logged_at, datetime!(2024-03-10 14:00 UTC));
        assert_eq!(entry.logged_at.offset(), UtcOffset::UTC);
    }

    #[test]
    fn validation_rules() {
        let mut d = draft();
        d.food_name = "   ".into();
        assert!(d.validate().is_err());

        let mut d = draft();
        d.quantity = 0.0;
        assert!(d.validate().is_err());

        let mut d = draft();
        d.quantity = f64::INFINITY;
        assert!(d.validate().is_err());

        let mut d = draft();
        d.nutrition = Some(NutrientProfile { calories: -5.0, ..Default::default() });
        d.nutrition_source = NutritionSource::Manual;
        assert_eq!(
            d.validate().unwrap_err(),
            ValidationError::new("calories must not be negative")
        );

        let mut d = draft();
        d.nutrition_source = NutritionSource::Fdc;
        assert!(d.validate().is_err());
    }

    #[test]
    fn reference_profile_is_per_portion() {
        let mut d = draft();
        d.quantity = 2.0;
        d.nutrition = Some(NutrientProfile { calories: 178.0, protein_g: 2.2, ..Default::default() });
        d.nutrition_source = NutritionSource::Fdc;
        d.fdc_id = Some(173944);
        let entry = d.prepare(OffsetDateTime::now_utc()).unwrap();

        let reference = ReferenceProfile::from_entry(&entry).unwrap();
        assert_eq!(reference.per_portion.calories, 89.0);
        assert_eq!(reference.per_portion.protein_g, 1.1);
        assert_eq!(reference.fdc_id, Some(173944));
    }

    #[test]
    fn source_serializes_as_lowercase_words() {
        assert_eq!(serde_json::to_string(&NutritionSource::Missing).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&NutritionSource::Fdc).unwrap(), "\"fdc\"");
    }
}
