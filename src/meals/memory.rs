use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::repo::{MealLogStore, StoreError};
use super::repo_types::{MealLogEntry, NewMealLogEntry, NutritionSource, ReferenceProfile};
use crate::nutrition::normalize_food_key;
use crate::owner::Owner;
use crate::summaries::window::SummaryWindow;

/// Process-local store with the same semantics as the Postgres one.
#[derive(Default)]
pub struct InMemoryMealLogStore {
    rows: Mutex<Vec<MealLogEntry>>,
    failing: AtomicBool,
    ping_delay: Option<Duration>,
}

impl InMemoryMealLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ping_delay(delay: Duration) -> Self {
        Self { ping_delay: Some(delay), ..Self::default() }
    }

    /// Makes every call fail as if the database were down.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".into()));
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<MealLogEntry>, StoreError> {
        self.check()?;
        self.rows
            .lock()
            .map(|r| r.clone())
            .map_err(|_| StoreError::Unavailable("poisoned lock".into()))
    }
}

fn sorted(mut entries: Vec<MealLogEntry>) -> Vec<MealLogEntry> {
    entries.sort_by(|a, b| a.logged_at.cmp(&b.logged_at).then(a.id.cmp(&b.id)));
    entries
}

#[async_trait]
impl MealLogStore for InMemoryMealLogStore {
    async fn create(&self, entry: NewMealLogEntry) -> Result<MealLogEntry, StoreError> {
        self.check()?;
        let entry = entry.prepare(OffsetDateTime::now_utc())?;
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable("poisoned lock".into()))?
            .push(entry.clone());
        Ok(entry)
    }

    async fn list_by_owner_and_window(
        &self,
        owner: &Owner,
        window: &SummaryWindow,
    ) -> Result<Vec<MealLogEntry>, StoreError> {
        let rows = self.snapshot()?;
        Ok(sorted(
            rows.into_iter()
                .filter(|e| e.owner == owner.as_str() && window.contains(e.logged_at))
                .collect(),
        ))
    }

    async fn page_by_owner(
        &self,
        owner: &Owner,
        window: Option<&SummaryWindow>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<MealLogEntry>, StoreError> {
        let rows = self.snapshot()?;
        let owned = rows
            .into_iter()
            .filter(|e| e.owner == owner.as_str())
            .filter(|e| window.map_or(true, |w| w.contains(e.logged_at)))
            .collect();
        Ok(sorted(owned)
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn latest_reference(
        &self,
        food_key: &str,
    ) -> Result<Option<ReferenceProfile>, StoreError> {
        let rows = self.snapshot()?;
        Ok(rows
            .iter()
            .filter(|e| e.nutrition_source == NutritionSource::Fdc)
            .filter(|e| normalize_food_key(&e.food_name) == food_key)
            .max_by_key(|e| e.logged_at)
            .and_then(ReferenceProfile::from_entry))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if let Some(delay) = self.ping_delay {
            tokio::time::sleep(delay).await;
        }
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::NutrientProfile;
    use crate::summaries::window::Period;
    use chrono::NaiveDate;
    use time::macros::datetime;

    fn new_entry(owner: &str, name: &str, at: OffsetDateTime) -> NewMealLogEntry {
        NewMealLogEntry {
            owner: Owner::parse(owner).unwrap(),
            food_name: name.into(),
            quantity: 1.0,
            logged_at: Some(at),
            nutrition: None,
            nutrition_source: NutritionSource::Missing,
            fdc_id: None,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> SummaryWindow {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        SummaryWindow::for_period(Period::Day(date), chrono_tz::UTC).unwrap()
    }

    #[tokio::test]
    async fn window_listing_is_owner_scoped_and_ordered() {
        let store = InMemoryMealLogStore::new();
        store.create(new_entry("alice", "dinner", datetime!(2024-05-01 19:00 UTC))).await.unwrap();
        store.create(new_entry("alice", "breakfast", datetime!(2024-05-01 07:00 UTC))).await.unwrap();
        store.create(new_entry("bob", "lunch", datetime!(2024-05-01 12:00 UTC))).await.unwrap();
        store.create(new_entry("alice", "midnight", datetime!(2024-05-02 00:00 UTC))).await.unwrap();

        let alice = Owner::parse("alice").unwrap();
        let got = store.list_by_owner_and_window(&alice, &day(2024, 5, 1)).await.unwrap();
        let names: Vec<_> = got.iter().map(|e| e.food_name.as_str()).collect();
        assert_eq!(names, ["breakfast", "dinner"]);
    }

    #[tokio::test]
    async fn paging_skips_and_limits() {
        let store = InMemoryMealLogStore::new();
        for h in 0..5 {
            let at = datetime!(2024-05-01 00:00 UTC) + time::Duration::hours(h);
            store.create(new_entry("alice", &format!("snack {h}"), at)).await.unwrap();
        }
        let alice = Owner::parse("alice").unwrap();
        let page = store.page_by_owner(&alice, None, 1, 2).await.unwrap();
        let names: Vec<_> = page.iter().map(|e| e.food_name.as_str()).collect();
        assert_eq!(names, ["snack 1", "snack 2"]);
    }

    #[tokio::test]
    async fn invalid_entries_are_not_written() {
        let store = InMemoryMealLogStore::new();
        let mut bad = new_entry("alice", "toast", datetime!(2024-05-01 08:00 UTC));
        bad.quantity = -1.0;
        assert!(matches!(store.create(bad).await, Err(StoreError::Invalid(_))));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn latest_reference_matches_normalized_names() {
        let store = InMemoryMealLogStore::new();
        let mut older = new_entry("bob", "Banana", datetime!(2024-04-01 08:00 UTC));
        older.nutrition = Some(NutrientProfile { calories: 80.0, ..Default::default() });
        older.nutrition_source = NutritionSource::Fdc;
        let mut newer = new_entry("bob", "banana", datetime!(2024-05-01 08:00 UTC));
        newer.quantity = 2.0;
        newer.nutrition = Some(NutrientProfile { calories: 178.0, ..Default::default() });
        newer.nutrition_source = NutritionSource::Fdc;
        store.create(older).await.unwrap();
        store.create(newer).await.unwrap();

        let found = store.latest_reference("banana").await.unwrap().unwrap();
        assert_eq!(found.per_portion.calories, 89.0);
        assert!(store.latest_reference("kale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failing_store_reports_unavailable() {
        let store = InMemoryMealLogStore::new();
        store.set_failing(true);
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
    }
}
