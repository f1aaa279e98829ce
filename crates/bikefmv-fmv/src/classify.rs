//! Where an asking price sits relative to fair market value.

use serde::{Deserialize, Serialize};

use crate::params::{
    ABOVE_MAX_PCT, AT_MARKET_MAX_PCT, BELOW_MAX_PCT, GOOD_DEAL_MIN_CONFIDENCE,
    GOOD_DEAL_MIN_DISCOUNT_PCT, WELL_BELOW_MAX_PCT,
};
use crate::result::FmvResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketBand {
    WellBelowMarket,
    BelowMarket,
    AtMarket,
    AboveMarket,
    WellAboveMarket,
    Unknown,
}

impl MarketBand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MarketBand::WellBelowMarket => "well_below_market",
            MarketBand::BelowMarket => "below_market",
            MarketBand::AtMarket => "at_market",
            MarketBand::AboveMarket => "above_market",
            MarketBand::WellAboveMarket => "well_above_market",
            MarketBand::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MarketBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fair market value to compare against: a bare number or a full result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FmvReference(Option<f64>);

impl From<f64> for FmvReference {
    fn from(value: f64) -> Self {
        Self(Some(value))
    }
}

impl From<Option<f64>> for FmvReference {
    fn from(value: Option<f64>) -> Self {
        Self(value)
    }
}

impl From<&FmvResult> for FmvReference {
    fn from(result: &FmvResult) -> Self {
        Self(Some(result.fmv))
    }
}

impl FmvReference {
    fn usable(self) -> Option<f64> {
        self.0.filter(|v| v.is_finite() && *v > 0.0)
    }
}

/// Band for `price` against `fmv`. Boundaries are inclusive on the upper end
/// of each band, so exactly +10% is still `AtMarket`.
#[must_use]
pub fn classify(price: f64, fmv: impl Into<FmvReference>) -> MarketBand {
    let Some(fmv) = fmv.into().usable() else {
        return MarketBand::Unknown;
    };
    if !price.is_finite() || price <= 0.0 {
        return MarketBand::Unknown;
    }

    // Multiply before dividing so round-number percentages stay exact.
    let diff_pct = (price - fmv) * 100.0 / fmv;
    if diff_pct <= WELL_BELOW_MAX_PCT {
        MarketBand::WellBelowMarket
    } else if diff_pct <= BELOW_MAX_PCT {
        MarketBand::BelowMarket
    } else if diff_pct <= AT_MARKET_MAX_PCT {
        MarketBand::AtMarket
    } else if diff_pct <= ABOVE_MAX_PCT {
        MarketBand::AboveMarket
    } else {
        MarketBand::WellAboveMarket
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealEvaluation {
    pub is_good_deal: bool,
    /// Percent below FMV, rounded; negative when priced above.
    pub discount: i64,
    pub confidence: f64,
    pub reason: String,
}

/// Whether `price` is a good deal given `fmv`: at least 15% below market
/// with confidence of at least 0.6.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn evaluate_deal(price: f64, fmv: &FmvResult) -> DealEvaluation {
    if !(price.is_finite() && price > 0.0 && fmv.fmv.is_finite() && fmv.fmv > 0.0) {
        return DealEvaluation {
            is_good_deal: false,
            discount: 0,
            confidence: 0.0,
            reason: "Insufficient FMV data".to_string(),
        };
    }

    let raw_discount = (fmv.fmv - price) * 100.0 / fmv.fmv;
    let discount = raw_discount.round() as i64;
    let confidence_pct = (fmv.confidence * 100.0).round() as i64;
    let cheap_enough = raw_discount >= GOOD_DEAL_MIN_DISCOUNT_PCT;
    let trusted = fmv.confidence >= GOOD_DEAL_MIN_CONFIDENCE;

    let reason = if cheap_enough && trusted {
        format!(
            "{discount}% below market (FMV: €{}, confidence: {confidence_pct}%)",
            fmv.fmv
        )
    } else if !cheap_enough {
        format!("Discount too small ({discount}%, need 15%+)")
    } else {
        format!("Low FMV confidence ({confidence_pct}%, need 60%+)")
    };

    DealEvaluation {
        is_good_deal: cheap_enough && trusted,
        discount,
        confidence: fmv.confidence,
        reason,
    }
}
