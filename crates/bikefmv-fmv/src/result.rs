use bikefmv_core::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FmvError {
    #[error("{0} is required")]
    MissingInput(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where an FMV figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Median of stored comparable listings.
    MarketHistory,
    /// Brand-tier depreciation estimate; no comparables were found.
    Estimation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FmvResult {
    /// Fair market value in whole euros.
    pub fmv: f64,
    pub confidence: f64,
    pub sample_size: usize,
    pub price_range: PriceRange,
    pub data_source: DataSource,
    pub last_updated: DateTime<Utc>,
}

/// Optional refinements for a valuation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FmvOptions {
    /// Exact (case-insensitive) frame size such as `"L"`.
    pub frame_size: Option<String>,
    /// Substring (case-insensitive) of the frame material such as `"carbon"`.
    pub frame_material: Option<String>,
    /// Asking price of the listing being valued; floors the estimate.
    pub listing_price: Option<f64>,
    /// Comparables window in days; 365 when unset.
    pub recent_days: Option<u32>,
}
