//! `fmv` subcommands. Results are printed as JSON.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use clap::{Args, Subcommand};
use serde_json::json;

use bikefmv_core::AppConfig;
use bikefmv_fmv::{brand_tier, classify, depreciation_curve, evaluate_deal, FmvEstimator, FmvOptions};

use crate::connect_store;

/// Refinements shared by `estimate` and `compare`.
#[derive(Debug, Clone, Default, Args)]
pub struct ValuationArgs {
    /// Only compare against this frame size when enough listings match
    #[arg(long)]
    pub frame_size: Option<String>,

    /// Only compare against this frame material when enough listings match
    #[arg(long)]
    pub frame_material: Option<String>,

    /// Comparables window in days
    #[arg(long)]
    pub recent_days: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum FmvCommands {
    /// Fair market value for a brand, model and model year
    Estimate {
        brand: String,
        model: String,
        year: i32,

        #[command(flatten)]
        valuation: ValuationArgs,

        /// Asking price of the listing being valued; floors estimates
        #[arg(long)]
        listing_price: Option<f64>,
    },
    /// Compare an asking price against the fair market value
    Compare {
        price: f64,
        brand: String,
        model: String,
        year: i32,

        #[command(flatten)]
        valuation: ValuationArgs,
    },
    /// Typical value retention per model year for a brand
    Curve {
        brand: String,
        model: String,
        #[arg(required = true)]
        years: Vec<i32>,
    },
}

impl ValuationArgs {
    fn options(self, listing_price: Option<f64>) -> FmvOptions {
        FmvOptions {
            frame_size: self.frame_size,
            frame_material: self.frame_material,
            listing_price,
            recent_days: self.recent_days,
        }
    }
}

pub(crate) async fn run(config: &AppConfig, command: FmvCommands) -> anyhow::Result<()> {
    match command {
        FmvCommands::Estimate {
            brand,
            model,
            year,
            valuation,
            listing_price,
        } => {
            let store = Arc::new(connect_store(config).await?);
            let estimator = FmvEstimator::new(store.clone());
            let result = estimator
                .fair_market_value(&brand, &model, year, &valuation.options(listing_price))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            store.close().await;
        }
        FmvCommands::Compare {
            price,
            brand,
            model,
            year,
            valuation,
        } => {
            let store = Arc::new(connect_store(config).await?);
            let estimator = FmvEstimator::new(store.clone());
            let fmv = estimator
                .fair_market_value(&brand, &model, year, &valuation.options(Some(price)))
                .await?;
            let report = json!({
                "price": price,
                "band": classify(price, &fmv),
                "deal": evaluate_deal(price, &fmv),
                "fmv": fmv,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            store.close().await;
        }
        FmvCommands::Curve {
            brand,
            model,
            years,
        } => {
            println!(
                "{}",
                serde_json::to_string_pretty(&curve_report(&brand, &model, &years, Utc::now().year()))?
            );
        }
    }
    Ok(())
}

pub(crate) fn curve_report(
    brand: &str,
    model: &str,
    years: &[i32],
    current_year: i32,
) -> serde_json::Value {
    let tier = brand_tier(brand);
    let curve: Vec<serde_json::Value> = depreciation_curve(years, current_year)
        .into_iter()
        .map(|point| {
            json!({
                "year": point.year,
                "age": point.age,
                "factor": point.factor,
                "retention_pct": point.retention_pct,
                "estimated_value": (tier.base_price * point.factor).round(),
            })
        })
        .collect();
    json!({
        "brand": brand,
        "model": model,
        "tier": tier.tier,
        "base_price": tier.base_price,
        "curve": curve,
    })
}
