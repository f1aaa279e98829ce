use std::sync::Arc;

use bikefmv_core::{build_model_patterns, MarketRecord, MarketStore};
use chrono::{Datelike, Utc};

use crate::fallback;
use crate::params::{DEFAULT_RECENT_DAYS, MIN_FILTERED_CANDIDATES};
use crate::result::{DataSource, FmvError, FmvOptions, FmvResult, PriceRange};
use crate::stats::{
    adjust_price_for_year, confidence, extract_year_from_title, median, percentile,
    remove_outliers, select_year_window,
};

/// Computes fair market values from stored comparables, falling back to a
/// brand-tier estimate when there are none.
pub struct FmvEstimator {
    store: Arc<dyn MarketStore>,
    current_year: Option<i32>,
}

impl FmvEstimator {
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self {
            store,
            current_year: None,
        }
    }

    /// Pins "now" for age calculations instead of reading the clock.
    #[must_use]
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    fn current_year(&self) -> i32 {
        self.current_year.unwrap_or_else(|| Utc::now().year())
    }

    /// Fair market value of a `brand` `model` from model year `year`.
    ///
    /// # Errors
    ///
    /// Returns [`FmvError::MissingInput`] when `brand` or `model` is blank and
    /// [`FmvError::Store`] when the candidate query fails.
    pub async fn fair_market_value(
        &self,
        brand: &str,
        model: &str,
        year: i32,
        options: &FmvOptions,
    ) -> Result<FmvResult, FmvError> {
        let brand = brand.trim();
        let model = model.trim();
        if brand.is_empty() {
            return Err(FmvError::MissingInput("brand"));
        }
        if model.is_empty() {
            return Err(FmvError::MissingInput("model"));
        }

        let current_year = self.current_year();
        let patterns = build_model_patterns(model);
        let recent_days = options.recent_days.unwrap_or(DEFAULT_RECENT_DAYS);
        let candidates = self.store.query(brand, &patterns, recent_days).await?;

        if candidates.is_empty() {
            tracing::info!(brand, model, year, "no comparables; using brand-tier estimate");
            return Ok(fallback_estimate(brand, year, options, current_year));
        }
        let fetched = candidates.len();

        let candidates = narrow(candidates, options.frame_size.as_deref(), |r, size| {
            r.frame_size
                .as_deref()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(size.trim()))
        });
        let candidates = narrow(candidates, options.frame_material.as_deref(), |r, material| {
            let needle = material.trim().to_lowercase();
            r.frame_material
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains(&needle))
        });

        let dated: Vec<(f64, Option<i32>)> = candidates
            .iter()
            .map(|r| {
                let row_year = r
                    .year
                    .or_else(|| extract_year_from_title(&r.title, current_year));
                (r.price_eur, row_year)
            })
            .collect();
        let (windowed, window) = select_year_window(dated, year, |(_, y)| *y);

        let adjusted: Vec<f64> = windowed
            .iter()
            .map(|(price, row_year)| adjust_price_for_year(*price, *row_year, year))
            .collect();
        let prices = remove_outliers(&adjusted);
        if prices.is_empty() {
            return Ok(fallback_estimate(brand, year, options, current_year));
        }

        let result = FmvResult {
            fmv: median(&prices).round(),
            confidence: confidence(&prices),
            sample_size: prices.len(),
            price_range: PriceRange {
                min: prices.iter().copied().fold(f64::INFINITY, f64::min).round(),
                max: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max).round(),
                q1: Some(percentile(&prices, 25.0).round()),
                q3: Some(percentile(&prices, 75.0).round()),
            },
            data_source: DataSource::MarketHistory,
            last_updated: Utc::now(),
        };

        tracing::info!(
            brand,
            model,
            year,
            fetched,
            window = window.as_str(),
            outliers = adjusted.len() - prices.len(),
            fmv = result.fmv,
            confidence = result.confidence,
            "fair market value computed"
        );
        Ok(result)
    }
}

fn fallback_estimate(brand: &str, year: i32, options: &FmvOptions, current_year: i32) -> FmvResult {
    fallback::estimate(
        brand,
        year,
        options.frame_material.as_deref(),
        options.listing_price,
        current_year,
        Utc::now(),
    )
}

/// Applies an optional attribute filter, keeping it only when enough
/// candidates survive.
fn narrow<F>(candidates: Vec<MarketRecord>, wanted: Option<&str>, matches: F) -> Vec<MarketRecord>
where
    F: Fn(&MarketRecord, &str) -> bool,
{
    let Some(wanted) = wanted.filter(|w| !w.trim().is_empty()) else {
        return candidates;
    };
    let kept = candidates.iter().filter(|r| matches(r, wanted)).count();
    if kept < MIN_FILTERED_CANDIDATES {
        tracing::debug!(wanted, kept, "attribute filter too narrow; ignoring it");
        return candidates;
    }
    candidates.into_iter().filter(|r| matches(r, wanted)).collect()
}
