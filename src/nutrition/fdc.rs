//! USDA FoodData Central client.
//!
//! Two requests per lookup: a one-result search for the description, then the
//! detail record for the hit. Transient failures (transport errors, timeouts,
//! 429, 5xx) are retried with exponential backoff; a definitive miss is not.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::dto::{FoodDetails, FoodNutrient, SearchResponse};
use super::{FoodMatch, LookupError, NutrientProfile, NutritionLookup};
use crate::config::FdcConfig;

enum Field {
    Calories,
    Protein,
    Carbs,
    Fat,
    Sugars,
    Micro(&'static str),
}

const NUTRIENT_MAP: &[(&str, Field)] = &[
    ("Energy", Field::Calories),
    ("Protein", Field::Protein),
    ("Carbohydrate, by difference", Field::Carbs),
    ("Total lipid (fat)", Field::Fat),
    ("Sugars, total", Field::Sugars),
    ("Total Sugars", Field::Sugars),
    ("Cholesterol", Field::Micro("cholesterol_mg")),
    ("Fatty acids, total saturated", Field::Micro("sat_fat_g")),
    ("Fatty acids, total monounsaturated", Field::Micro("mono_fat_g")),
    ("Fatty acids, total polyunsaturated", Field::Micro("poly_fat_g")),
    ("Fatty acids, total trans", Field::Micro("trans_fat_g")),
    ("Fiber, total dietary", Field::Micro("fiber_g")),
    ("Vitamin A, RAE", Field::Micro("vitamin_a_ug")),
    ("Beta-carotene", Field::Micro("beta_carotene_ug")),
    ("Thiamin", Field::Micro("vitamin_b1_mg")),
    ("Riboflavin", Field::Micro("vitamin_b2_mg")),
    ("Niacin", Field::Micro("vitamin_b3_mg")),
    ("Pantothenic acid", Field::Micro("vitamin_b5_mg")),
    ("Vitamin B-6", Field::Micro("vitamin_b6_mg")),
    ("Folate, total", Field::Micro("vitamin_b9_ug")),
    ("Vitamin B-12", Field::Micro("vitamin_b12_ug")),
    ("Vitamin C, total ascorbic acid", Field::Micro("vitamin_c_mg")),
    ("Vitamin D (D2 + D3)", Field::Micro("vitamin_d_ug")),
    ("Vitamin E (alpha-tocopherol)", Field::Micro("vitamin_e_mg")),
    ("Vitamin K (phylloquinone)", Field::Micro("vitamin_k_ug")),
    ("Calcium, Ca", Field::Micro("calcium_mg")),
    ("Iron, Fe", Field::Micro("iron_mg")),
    ("Magnesium, Mg", Field::Micro("magnesium_mg")),
    ("Phosphorus, P", Field::Micro("phosphorus_mg")),
    ("Potassium, K", Field::Micro("potassium_mg")),
    ("Sodium, Na", Field::Micro("sodium_mg")),
    ("Zinc, Zn", Field::Micro("zinc_mg")),
    ("Copper, Cu", Field::Micro("copper_mg")),
    ("Manganese, Mn", Field::Micro("manganese_mg")),
    ("Selenium, Se", Field::Micro("selenium_ug")),
    ("Chromium, Cr", Field::Micro("chromium_ug")),
    ("Molybdenum, Mo", Field::Micro("molybdenum_ug")),
    ("Fluoride, F", Field::Micro("fluoride_mg")),
];

const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

pub struct FdcClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    initial_backoff: Duration,
    total_timeout: Duration,
}

impl FdcClient {
    pub fn new(cfg: &FdcConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("build FDC http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
            max_retries: cfg.max_retries,
            initial_backoff: INITIAL_BACKOFF,
            total_timeout: cfg.total_timeout,
        })
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// GET with retry. `Ok(None)` means the resource definitively does not exist.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, LookupError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;
        loop {
            let failure = match self
                .http
                .get(&url)
                .query(&[("api_key", self.api_key.as_str())])
                .query(query)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    if status.is_success() {
                        return resp.json::<T>().await.map(Some).map_err(|e| {
                            LookupError::ServiceUnavailable(format!("malformed FDC response: {e}"))
                        });
                    }
                    let msg = format!("FDC returned HTTP {status}");
                    if !is_transient(status) {
                        return Err(LookupError::ServiceUnavailable(msg));
                    }
                    msg
                }
                Err(e) if e.is_builder() => {
                    return Err(LookupError::ServiceUnavailable(e.to_string()));
                }
                Err(e) if e.is_timeout() => "FDC request timed out".to_string(),
                Err(e) => format!("FDC request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(LookupError::ServiceUnavailable(failure));
            }
            attempt += 1;
            let backoff = self.initial_backoff * 2_u32.pow(attempt - 1);
            warn!(
                %path,
                attempt,
                max_retries = self.max_retries,
                backoff_ms = backoff.as_millis() as u64,
                error = %failure,
                "transient FDC failure; retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn map_nutrients(nutrients: &[FoodNutrient]) -> NutrientProfile {
    let mut profile = NutrientProfile::default();
    for n in nutrients {
        let Some(name) = n.name() else { continue };
        let Some((_, field)) = NUTRIENT_MAP.iter().find(|(fdc_name, _)| *fdc_name == name) else {
            continue;
        };
        let value = n.amount();
        match field {
            // FDC also reports energy in kJ under the same name
            Field::Calories => {
                if n.unit().map_or(true, |u| u.eq_ignore_ascii_case("kcal")) {
                    profile.calories = value;
                }
            }
            Field::Protein => profile.protein_g = value,
            Field::Carbs => profile.carbs_g = value,
            Field::Fat => profile.fat_g = value,
            Field::Sugars => profile.sugars_g = value,
            Field::Micro(key) => {
                profile.micros.insert((*key).to_string(), value);
            }
        }
    }
    profile
}

impl FdcClient {
    async fn search_and_fetch(&self, description: &str) -> Result<FoodMatch, LookupError> {
        let search: Option<SearchResponse> = self
            .get_json("/foods/search", &[("query", description), ("pageSize", "1")])
            .await?;
        let hit = search
            .and_then(|s| s.foods.into_iter().next())
            .ok_or_else(|| LookupError::NotFound(description.to_string()))?;

        let details: FoodDetails = self
            .get_json(&format!("/food/{}", hit.fdc_id), &[])
            .await?
            .ok_or_else(|| LookupError::NotFound(description.to_string()))?;

        let profile = map_nutrients(&details.food_nutrients);
        debug!(fdc_id = hit.fdc_id, calories = profile.calories, "FDC match");

        Ok(FoodMatch {
            fdc_id: Some(hit.fdc_id),
            description: if details.description.is_empty() {
                hit.description
            } else {
                details.description
            },
            profile,
        })
    }
}

#[async_trait]
impl NutritionLookup for FdcClient {
    #[instrument(skip(self))]
    async fn lookup(&self, description: &str) -> Result<FoodMatch, LookupError> {
        match tokio::time::timeout(self.total_timeout, self.search_and_fetch(description)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    total_timeout_ms = self.total_timeout.as_millis() as u64,
                    "FDC lookup deadline exceeded"
                );
                Err(LookupError::ServiceUnavailable(format!(
                    "FDC lookup exceeded {}ms",
                    self.total_timeout.as_millis()
                )))
            }
        }
    }
}
