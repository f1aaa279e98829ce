//! Tunable constants for valuation.

/// Value lost per year of age when normalizing a comparable's price to the
/// requested model year.
pub const ANNUAL_DEPRECIATION: f64 = 0.12;

/// Largest year gap (either direction) the age adjustment compounds over.
pub const MAX_AGE_ADJUSTMENT_YEARS: i32 = 6;

/// Fences sit this many IQRs outside the quartiles.
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Outlier removal needs at least this many prices.
pub const MIN_PRICES_FOR_OUTLIERS: usize = 4;

/// Comparables window used when the caller does not pass one.
pub const DEFAULT_RECENT_DAYS: u32 = 365;

/// A frame size or material filter is applied only if it leaves this many
/// candidates.
pub const MIN_FILTERED_CANDIDATES: usize = 3;

/// Candidates needed in the exact-year window.
pub const MIN_EXACT_YEAR: usize = 3;

/// Candidates needed in the ±1 and ±2 year windows.
pub const MIN_NEAR_YEAR: usize = 5;

/// Earliest plausible model year parsed out of a listing title.
pub const MIN_TITLE_YEAR: i32 = 1990;

/// `(minimum sample size, base confidence)`, checked top to bottom.
pub const CONFIDENCE_BY_SAMPLE: [(usize, f64); 4] = [(20, 0.95), (10, 0.85), (5, 0.75), (3, 0.60)];

/// Base confidence below the smallest bucket.
pub const MIN_CONFIDENCE: f64 = 0.40;

/// Coefficient of variation is only evaluated from this many samples.
pub const MIN_SAMPLES_FOR_DISPERSION: usize = 3;

/// Above this CV confidence is multiplied by [`DISPERSION_PENALTY`].
pub const HIGH_DISPERSION_CV: f64 = 0.3;
pub const DISPERSION_PENALTY: f64 = 0.9;

/// Above this CV confidence is additionally multiplied by
/// [`EXTREME_DISPERSION_PENALTY`].
pub const EXTREME_DISPERSION_CV: f64 = 0.5;
pub const EXTREME_DISPERSION_PENALTY: f64 = 0.8;

/// Fixed confidence of a brand-tier estimate.
pub const ESTIMATION_CONFIDENCE: f64 = 0.50;

/// New-price multiplier for carbon frames in the estimate.
pub const CARBON_MULTIPLIER: f64 = 1.5;

/// An estimate never drops below this share of the listing's asking price.
pub const LISTING_PRICE_FLOOR: f64 = 0.8;

/// Estimate range as shares of the estimate.
pub const ESTIMATE_RANGE_LOW: f64 = 0.8;
pub const ESTIMATE_RANGE_HIGH: f64 = 1.2;

/// `(maximum age in years, share of new price retained)`, checked top to
/// bottom; older bikes retain [`MIN_RETENTION`].
pub const RETENTION_BY_AGE: [(i32, f64); 5] =
    [(1, 0.80), (2, 0.70), (3, 0.60), (5, 0.45), (7, 0.30)];
pub const MIN_RETENTION: f64 = 0.20;

/// Deal evaluation thresholds.
pub const GOOD_DEAL_MIN_DISCOUNT_PCT: f64 = 15.0;
pub const GOOD_DEAL_MIN_CONFIDENCE: f64 = 0.6;

/// Market band upper bounds (inclusive) on the price/FMV difference in
/// percent.
pub const WELL_BELOW_MAX_PCT: f64 = -20.0;
pub const BELOW_MAX_PCT: f64 = -10.0;
pub const AT_MARKET_MAX_PCT: f64 = 10.0;
pub const ABOVE_MAX_PCT: f64 = 25.0;
