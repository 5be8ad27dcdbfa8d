use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use super::repo_types::{FoodLogRow, MealLogEntry, NewMealLogEntry, ReferenceProfile};
use crate::error::ValidationError;
use crate::nutrition::normalize_food_key;
use crate::owner::Owner;
use crate::summaries::window::SummaryWindow;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for meal logs. One logical table, queried by owner and time.
#[async_trait]
pub trait MealLogStore: Send + Sync {
    /// Validates, assigns id/timestamp and writes a single row.
    async fn create(&self, entry: NewMealLogEntry) -> Result<MealLogEntry, StoreError>;

    /// Entries with `window.start <= logged_at < window.end`, oldest first.
    async fn list_by_owner_and_window(
        &self,
        owner: &Owner,
        window: &SummaryWindow,
    ) -> Result<Vec<MealLogEntry>, StoreError>;

    /// Paged listing, optionally restricted to a window. Same ordering.
    async fn page_by_owner(
        &self,
        owner: &Owner,
        window: Option<&SummaryWindow>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<MealLogEntry>, StoreError>;

    /// Latest FDC-sourced profile recorded for a normalized food key.
    async fn latest_reference(&self, food_key: &str)
        -> Result<Option<ReferenceProfile>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

const COLUMNS: &str = "id, owner_id, food_name, quantity, logged_at, nutrition_source, fdc_id, \
                       calories, protein_g, fat_g, carbs_g, sugars_g, micros, created_at";

#[derive(Clone)]
pub struct PgMealLogStore {
    db: PgPool,
}

impl PgMealLogStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }
}

#[async_trait]
impl MealLogStore for PgMealLogStore {
    async fn create(&self, entry: NewMealLogEntry) -> Result<MealLogEntry, StoreError> {
        let entry = entry.prepare(OffsetDateTime::now_utc())?;
        let n = entry.nutrition.as_ref();
        let row = sqlx::query_as::<_, FoodLogRow>(&format!(
            r#"
            INSERT INTO food_logs (id, owner_id, food_name, food_key, quantity, logged_at,
                                   nutrition_source, fdc_id, calories, protein_g, fat_g,
                                   carbs_g, sugars_g, micros, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(entry.id)
        .bind(&entry.owner)
        .bind(&entry.food_name)
        .bind(normalize_food_key(&entry.food_name))
        .bind(entry.quantity)
        .bind(entry.logged_at)
        .bind(entry.nutrition_source.as_str())
        .bind(entry.fdc_id)
        .bind(n.map(|p| p.calories))
        .bind(n.map(|p| p.protein_g))
        .bind(n.map(|p| p.fat_g))
        .bind(n.map(|p| p.carbs_g))
        .bind(n.map(|p| p.sugars_g))
        .bind(Json(n.map(|p| p.micros.clone()).unwrap_or_default()))
        .bind(entry.created_at)
        .fetch_one(&self.db)
        .await?;

        debug!(id = %row.id, owner = %row.owner_id, "food log inserted");
        Ok(row.into())
    }

    async fn list_by_owner_and_window(
        &self,
        owner: &Owner,
        window: &SummaryWindow,
    ) -> Result<Vec<MealLogEntry>, StoreError> {
        let rows = sqlx::query_as::<_, FoodLogRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM food_logs
            WHERE owner_id = $1 AND logged_at >= $2 AND logged_at < $3
            ORDER BY logged_at ASC, id ASC
            "#
        ))
        .bind(owner.as_str())
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(MealLogEntry::from).collect())
    }

    async fn page_by_owner(
        &self,
        owner: &Owner,
        window: Option<&SummaryWindow>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<MealLogEntry>, StoreError> {
        let rows = sqlx::query_as::<_, FoodLogRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM food_logs
            WHERE owner_id = $1
              AND ($2::timestamptz IS NULL OR logged_at >= $2)
              AND ($3::timestamptz IS NULL OR logged_at < $3)
            ORDER BY logged_at ASC, id ASC
            OFFSET $4 LIMIT $5
            "#
        ))
        .bind(owner.as_str())
        .bind(window.map(|w| w.start))
        .bind(window.map(|w| w.end))
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(MealLogEntry::from).collect())
    }

    async fn latest_reference(
        &self,
        food_key: &str,
    ) -> Result<Option<ReferenceProfile>, StoreError> {
        let row = sqlx::query_as::<_, FoodLogRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM food_logs
            WHERE food_key = $1 AND nutrition_source = 'fdc'
            ORDER BY logged_at DESC
            LIMIT 1
            "#
        ))
        .bind(food_key)
        .fetch_optional(&self.db)
        .await?;
        Ok(row
            .map(MealLogEntry::from)
            .as_ref()
            .and_then(ReferenceProfile::from_entry))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
