//! Market data records and collection bookkeeping types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::Source;

/// One concrete unit of collection work: a brand/model/year on one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionTarget {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub source: Source,
    /// Source-specific search URL for page 1.
    pub url: String,
}

/// A stored `market_history` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub id: i64,
    pub source_platform: String,
    pub source_url: String,
    pub source_ad_id: String,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub price_eur: f64,
    pub currency: String,
    pub frame_size: Option<String>,
    pub frame_material: Option<String>,
    pub condition_status: Option<String>,
    pub title: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `market_history`. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMarketRecord {
    pub source_platform: String,
    pub source_url: String,
    pub source_ad_id: String,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub price_eur: f64,
    pub currency: String,
    pub frame_size: Option<String>,
    pub frame_material: Option<String>,
    pub condition_status: Option<String>,
    pub title: String,
    pub image_url: Option<String>,
}

/// Counters for one target, one source, one model, or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collected: u32,
    pub duplicates: u32,
    pub errors: u32,
}

impl CollectionStats {
    /// Adds another set of counters into this one.
    pub fn merge(&mut self, other: &CollectionStats) {
        self.collected = self.collected.saturating_add(other.collected);
        self.duplicates = self.duplicates.saturating_add(other.duplicates);
        self.errors = self.errors.saturating_add(other.errors);
    }
}
