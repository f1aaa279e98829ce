//! Brand-tier estimate used when no comparable listings exist.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::params::{
    CARBON_MULTIPLIER, ESTIMATE_RANGE_HIGH, ESTIMATE_RANGE_LOW, ESTIMATION_CONFIDENCE,
    LISTING_PRICE_FLOOR, MIN_RETENTION, RETENTION_BY_AGE,
};
use crate::result::{DataSource, FmvResult, PriceRange};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BrandTier {
    pub tier: u8,
    /// Typical new price in EUR.
    pub base_price: f64,
}

const UNKNOWN_BRAND: BrandTier = BrandTier {
    tier: 3,
    base_price: 1500.0,
};

const BRAND_TIERS: &[(&str, BrandTier)] = &[
    ("specialized", BrandTier { tier: 1, base_price: 3500.0 }),
    ("trek", BrandTier { tier: 1, base_price: 3500.0 }),
    ("santa cruz", BrandTier { tier: 1, base_price: 4500.0 }),
    ("yt", BrandTier { tier: 1, base_price: 3200.0 }),
    ("canyon", BrandTier { tier: 1, base_price: 3000.0 }),
    ("scott", BrandTier { tier: 1, base_price: 3000.0 }),
    ("evil", BrandTier { tier: 1, base_price: 5000.0 }),
    ("yeti", BrandTier { tier: 1, base_price: 5500.0 }),
    ("pivot", BrandTier { tier: 1, base_price: 5000.0 }),
    ("giant", BrandTier { tier: 2, base_price: 2000.0 }),
    ("cube", BrandTier { tier: 2, base_price: 2000.0 }),
    ("focus", BrandTier { tier: 2, base_price: 2000.0 }),
    ("merida", BrandTier { tier: 2, base_price: 1800.0 }),
    ("ghost", BrandTier { tier: 2, base_price: 1800.0 }),
    ("commencal", BrandTier { tier: 2, base_price: 2500.0 }),
    ("nukeproof", BrandTier { tier: 2, base_price: 2200.0 }),
    ("bulls", BrandTier { tier: 3, base_price: 1500.0 }),
    ("kellys", BrandTier { tier: 3, base_price: 1200.0 }),
    ("radon", BrandTier { tier: 3, base_price: 1800.0 }),
];

#[must_use]
pub fn brand_tier(brand: &str) -> BrandTier {
    let key = brand.trim().to_lowercase();
    BRAND_TIERS
        .iter()
        .find(|(name, _)| *name == key)
        .map_or(UNKNOWN_BRAND, |(_, tier)| *tier)
}

/// Share of the new price a bike of `age` years typically retains.
#[must_use]
pub fn retention_factor(age: i32) -> f64 {
    RETENTION_BY_AGE
        .iter()
        .find(|(max_age, _)| age <= *max_age)
        .map_or(MIN_RETENTION, |(_, factor)| *factor)
}

/// Brand-tier estimate for a model year.
///
/// A positive `listing_price` floors the result at 80% of that price.
#[must_use]
pub fn estimate(
    brand: &str,
    year: i32,
    frame_material: Option<&str>,
    listing_price: Option<f64>,
    current_year: i32,
    now: DateTime<Utc>,
) -> FmvResult {
    let mut base = brand_tier(brand).base_price;
    if frame_material.is_some_and(|m| m.trim().eq_ignore_ascii_case("carbon")) {
        base *= CARBON_MULTIPLIER;
    }

    let mut fmv = (base * retention_factor(current_year.saturating_sub(year))).round();
    if let Some(listing) = listing_price.filter(|p| p.is_finite() && *p > 0.0) {
        fmv = fmv.max((listing * LISTING_PRICE_FLOOR).round());
    }

    FmvResult {
        fmv,
        confidence: ESTIMATION_CONFIDENCE,
        sample_size: 0,
        price_range: PriceRange {
            min: (fmv * ESTIMATE_RANGE_LOW).round(),
            max: (fmv * ESTIMATE_RANGE_HIGH).round(),
            q1: None,
            q3: None,
        },
        data_source: DataSource::Estimation,
        last_updated: now,
    }
}

/// One point of a depreciation curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub year: i32,
    pub age: i32,
    pub factor: f64,
    pub retention_pct: f64,
}

/// Retention factor per model year, in the order given.
#[must_use]
pub fn depreciation_curve(years: &[i32], current_year: i32) -> Vec<CurvePoint> {
    years
        .iter()
        .map(|&year| {
            let age = current_year.saturating_sub(year);
            let factor = retention_factor(age);
            CurvePoint {
                year,
                age,
                factor,
                retention_pct: (factor * 100.0).round(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_brands() {
        assert_eq!(brand_tier(" Santa Cruz ").base_price, 4500.0);
        assert_eq!(brand_tier("YT").tier, 1);
        assert_eq!(brand_tier("Radon").tier, 3);
        assert_eq!(brand_tier("Stevens"), UNKNOWN_BRAND);
    }

    #[test]
    fn retention_bands() {
        assert_eq!(retention_factor(-1), 0.80);
        assert_eq!(retention_factor(1), 0.80);
        assert_eq!(retention_factor(2), 0.70);
        assert_eq!(retention_factor(3), 0.60);
        assert_eq!(retention_factor(5), 0.45);
        assert_eq!(retention_factor(7), 0.30);
        assert_eq!(retention_factor(8), 0.20);
    }

    #[test]
    fn unknown_brand_three_years_old() {
        let r = estimate("Stevens", 2022, None, None, 2025, Utc::now());
        assert_eq!(r.fmv, 900.0);
        assert_eq!(r.sample_size, 0);
        assert_eq!(r.data_source, DataSource::Estimation);
        assert_eq!(r.price_range.min, 720.0);
        assert_eq!(r.price_range.max, 1080.0);
        assert!(r.price_range.q1.is_none());
    }

    #[test]
    fn listing_price_floors_the_estimate() {
        let r = estimate("Stevens", 2022, None, Some(1200.0), 2025, Utc::now());
        assert_eq!(r.fmv, 960.0);

        let r = estimate("Stevens", 2022, None, Some(500.0), 2025, Utc::now());
        assert_eq!(r.fmv, 900.0);
    }

    #[test]
    fn carbon_frames_raise_base_price() {
        let r = estimate("Canyon", 2024, Some("Carbon"), None, 2025, Utc::now());
        assert_eq!(r.fmv, (3000.0_f64 * 1.5 * 0.8).round());

        let r = estimate("Canyon", 2024, Some("alu"), None, 2025, Utc::now());
        assert_eq!(r.fmv, 2400.0);
    }

    #[test]
    fn curve_keeps_input_order() {
        let curve = depreciation_curve(&[2024, 2016, 2020], 2025);
        let ages: Vec<i32> = curve.iter().map(|p| p.age).collect();
        assert_eq!(ages, vec![1, 9, 5]);
        assert_eq!(curve[0].retention_pct, 80.0);
        assert_eq!(curve[1].factor, 0.20);
        assert_eq!(curve[2].retention_pct, 45.0);
    }

    #[test]
    fn extreme_years_saturate_instead_of_overflowing() {
        let r = estimate("Stevens", i32::MIN, None, None, i32::MAX, Utc::now());
        assert_eq!(r.fmv, (1500.0_f64 * MIN_RETENTION).round());

        let curve = depreciation_curve(&[i32::MAX, i32::MIN], i32::MIN);
        assert_eq!(curve[0].age, i32::MIN);
        assert_eq!(curve[0].factor, 0.80);
        assert_eq!(curve[1].age, 0);
    }
}
