use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::feedback::{CoachingService, OllamaCoach};
use crate::meals::repo::{MealLogStore, PgMealLogStore};
use crate::nutrition::{FdcClient, NutritionLookup};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn MealLogStore>,
    pub nutrition: Arc<dyn NutritionLookup>,
    pub coach: Arc<dyn CoachingService>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let store =
            PgMealLogStore::connect(&config.database_url, config.database_max_connections).await?;
        // Run migrations if present
        if let Err(e) = store.migrate().await {
            warn!(error = %e, "migrations folder not found or migration failed; continuing");
        }

        let nutrition = FdcClient::new(&config.fdc).context("init FDC client")?;
        let coach = OllamaCoach::new(&config.ollama).context("init Ollama client")?;
        info!(
            fdc = %config.fdc.base_url,
            ollama = %config.ollama.base_url,
            model = %config.ollama.model,
            "clients ready"
        );

        Ok(Self::from_parts(
            config,
            Arc::new(store),
            Arc::new(nutrition),
            Arc::new(coach),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn MealLogStore>,
        nutrition: Arc<dyn NutritionLookup>,
        coach: Arc<dyn CoachingService>,
    ) -> Self {
        Self { config, store, nutrition, coach }
    }
}
