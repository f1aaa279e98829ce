//! Fair market value estimation for secondhand bikes.
//!
//! [`FmvEstimator`] values a brand/model/year from comparable listings in a
//! [`bikefmv_core::MarketStore`]; [`classify`] and [`evaluate_deal`] place an
//! asking price against the result.

pub mod classify;
pub mod estimator;
pub mod fallback;
pub mod params;
pub mod result;
pub mod stats;

pub use classify::{classify, evaluate_deal, DealEvaluation, FmvReference, MarketBand};
pub use estimator::FmvEstimator;
pub use fallback::{brand_tier, depreciation_curve, BrandTier, CurvePoint};
pub use result::{DataSource, FmvError, FmvOptions, FmvResult, PriceRange};
pub use stats::YearWindow;
