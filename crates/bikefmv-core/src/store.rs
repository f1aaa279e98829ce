//! Storage contract for `market_history`.
//!
//! The collector writes through [`MarketStore::insert`]; the FMV estimator
//! reads through [`MarketStore::query`]. Implementations live outside this
//! crate (Postgres in `bikefmv-db`, an in-memory store behind the `test-util`
//! feature).

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::records::{MarketRecord, NewMarketRecord};

/// Maximum rows returned by a single market query.
pub const QUERY_ROW_CAP: i64 = 300;

/// Minimum number of pattern matches before the brand-only query is skipped.
pub const MIN_PATTERN_MATCHES: usize = 3;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store query failed: {0}")]
    Query(String),
}

/// Aggregate counts over `market_history`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketStats {
    pub total_records: i64,
    /// Records created in the last 7 days.
    pub recent_records: i64,
    pub avg_price: f64,
    pub by_source: Vec<(String, i64)>,
    pub by_year: Vec<(i32, i64)>,
}

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Returns `true` if a row with this dedup key already exists.
    async fn exists(&self, source_platform: &str, source_ad_id: &str) -> Result<bool, StoreError>;

    /// Inserts a row. Returns `false` when the `(source_platform, source_ad_id)`
    /// uniqueness constraint rejected it.
    async fn insert(&self, record: &NewMarketRecord) -> Result<bool, StoreError>;

    /// Rows for `brand` (case-insensitive) whose model or title matches any of
    /// `patterns`, newer than `recency_days`, newest first, capped at
    /// [`QUERY_ROW_CAP`].
    async fn query_matching(
        &self,
        brand: &str,
        patterns: &[String],
        recency_days: u32,
    ) -> Result<Vec<MarketRecord>, StoreError>;

    /// Same as [`MarketStore::query_matching`] without the model filter.
    async fn query_brand(
        &self,
        brand: &str,
        recency_days: u32,
    ) -> Result<Vec<MarketRecord>, StoreError>;

    /// Candidate records for a valuation.
    ///
    /// Runs the pattern query first; when there are no patterns or it matches
    /// fewer than [`MIN_PATTERN_MATCHES`] rows, the brand-only result set is
    /// returned instead.
    async fn query(
        &self,
        brand: &str,
        patterns: &[String],
        recency_days: u32,
    ) -> Result<Vec<MarketRecord>, StoreError> {
        if !patterns.is_empty() {
            let rows = self.query_matching(brand, patterns, recency_days).await?;
            if rows.len() >= MIN_PATTERN_MATCHES {
                return Ok(rows);
            }
            tracing::debug!(
                brand,
                matched = rows.len(),
                "too few model matches; widening to brand-only query"
            );
        }
        self.query_brand(brand, recency_days).await
    }

    async fn market_stats(&self) -> Result<MarketStats, StoreError>;
}
