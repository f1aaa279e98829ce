//! In-memory test doubles, compiled with the `test-util` feature.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::events::{CollectionEvent, EventSink};
use crate::records::{MarketRecord, NewMarketRecord};
use crate::store::{MarketStats, MarketStore, StoreError, QUERY_ROW_CAP};

/// A `MarketStore` backed by a `Vec`, with switchable failure injection.
#[derive(Debug, Default)]
pub struct MemoryMarketStore {
    rows: Mutex<Vec<MarketRecord>>,
    fail_inserts: AtomicBool,
    fail_queries: AtomicBool,
}

impl MemoryMarketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds fully-formed rows (with chosen `created_at`) bypassing dedup.
    pub fn seed(&self, records: impl IntoIterator<Item = MarketRecord>) {
        self.lock().extend(records);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn rows(&self) -> Vec<MarketRecord> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MarketRecord>> {
        self.rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_queries(&self) -> Result<(), StoreError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected query failure".to_string()));
        }
        Ok(())
    }

    fn select<F>(&self, brand: &str, recency_days: u32, keep: F) -> Vec<MarketRecord>
    where
        F: Fn(&MarketRecord) -> bool,
    {
        let cutoff = Utc::now() - Duration::days(i64::from(recency_days));
        let brand = brand.to_lowercase();
        let mut rows: Vec<MarketRecord> = self
            .lock()
            .iter()
            .filter(|r| r.brand.to_lowercase() == brand)
            .filter(|r| r.price_eur > 0.0 && r.created_at > cutoff)
            .filter(|r| keep(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(usize::try_from(QUERY_ROW_CAP).unwrap_or(usize::MAX));
        rows
    }
}

fn like_contains(haystack: &str, pattern: &str) -> bool {
    let needle = pattern.trim_matches('%').to_lowercase();
    haystack.to_lowercase().contains(&needle)
}

#[async_trait]
impl MarketStore for MemoryMarketStore {
    async fn exists(&self, source_platform: &str, source_ad_id: &str) -> Result<bool, StoreError> {
        self.check_queries()?;
        Ok(self
            .lock()
            .iter()
            .any(|r| r.source_platform == source_platform && r.source_ad_id == source_ad_id))
    }

    async fn insert(&self, record: &NewMarketRecord) -> Result<bool, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected insert failure".to_string()));
        }
        let mut rows = self.lock();
        if rows.iter().any(|r| {
            r.source_platform == record.source_platform && r.source_ad_id == record.source_ad_id
        }) {
            return Ok(false);
        }
        let id = i64::try_from(rows.len()).unwrap_or(i64::MAX) + 1;
        rows.push(MarketRecord {
            id,
            source_platform: record.source_platform.clone(),
            source_url: record.source_url.clone(),
            source_ad_id: record.source_ad_id.clone(),
            brand: record.brand.clone(),
            model: record.model.clone(),
            year: record.year,
            price_eur: record.price_eur,
            currency: record.currency.clone(),
            frame_size: record.frame_size.clone(),
            frame_material: record.frame_material.clone(),
            condition_status: record.condition_status.clone(),
            title: record.title.clone(),
            image_url: record.image_url.clone(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn query_matching(
        &self,
        brand: &str,
        patterns: &[String],
        recency_days: u32,
    ) -> Result<Vec<MarketRecord>, StoreError> {
        self.check_queries()?;
        Ok(self.select(brand, recency_days, |r| {
            patterns
                .iter()
                .any(|p| like_contains(&r.model, p) || like_contains(&r.title, p))
        }))
    }

    async fn query_brand(
        &self,
        brand: &str,
        recency_days: u32,
    ) -> Result<Vec<MarketRecord>, StoreError> {
        self.check_queries()?;
        Ok(self.select(brand, recency_days, |_| true))
    }

    async fn market_stats(&self) -> Result<MarketStats, StoreError> {
        self.check_queries()?;
        let rows = self.lock();
        let week_ago = Utc::now() - Duration::days(7);
        let priced: Vec<f64> = rows
            .iter()
            .map(|r| r.price_eur)
            .filter(|p| *p > 0.0)
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let avg_price = if priced.is_empty() {
            0.0
        } else {
            priced.iter().sum::<f64>() / priced.len() as f64
        };

        let mut by_source: BTreeMap<String, i64> = BTreeMap::new();
        let mut by_year: BTreeMap<i32, i64> = BTreeMap::new();
        for r in rows.iter() {
            *by_source.entry(r.source_platform.clone()).or_default() += 1;
            if let Some(y) = r.year {
                *by_year.entry(y).or_default() += 1;
            }
        }
        let mut by_source: Vec<(String, i64)> = by_source.into_iter().collect();
        by_source.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(MarketStats {
            total_records: i64::try_from(rows.len()).unwrap_or(i64::MAX),
            recent_records: i64::try_from(rows.iter().filter(|r| r.created_at > week_ago).count())
                .unwrap_or(i64::MAX),
            avg_price: avg_price.round(),
            by_source,
            by_year: by_year.into_iter().collect(),
        })
    }
}

/// Captures every emitted event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CollectionEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<CollectionEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: CollectionEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(ad_id: &str) -> NewMarketRecord {
        NewMarketRecord {
            source_platform: "buycycle".to_string(),
            source_url: format!("https://buycycle.com/de-de/product/{ad_id}"),
            source_ad_id: ad_id.to_string(),
            brand: "YT".to_string(),
            model: "Capra".to_string(),
            year: Some(2021),
            price_eur: 2400.0,
            currency: "EUR".to_string(),
            frame_size: None,
            frame_material: None,
            condition_status: None,
            title: "YT Capra 29 Core 3".to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn second_insert_of_same_key_is_rejected() {
        let store = MemoryMarketStore::new();
        assert!(store.insert(&new_record("a1")).await.unwrap());
        assert!(!store.insert(&new_record("a1")).await.unwrap());
        assert!(store.exists("buycycle", "a1").await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn query_falls_back_to_brand_when_few_matches() {
        let store = MemoryMarketStore::new();
        store.insert(&new_record("a1")).await.unwrap();
        let mut other = new_record("a2");
        other.model = "Jeffsy".to_string();
        other.title = "YT Jeffsy".to_string();
        store.insert(&other).await.unwrap();

        let rows = store
            .query("yt", &["%capra%".to_string()], 365)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2, "brand-only fallback should widen the set");
    }
}
