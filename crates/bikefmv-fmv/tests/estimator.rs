//! `FmvEstimator` against the in-memory market store.

use std::sync::Arc;

use bikefmv_core::testing::MemoryMarketStore;
use bikefmv_core::MarketRecord;
use bikefmv_fmv::{DataSource, FmvError, FmvEstimator, FmvOptions};
use chrono::{Duration, Utc};

const CURRENT_YEAR: i32 = 2025;

fn listing(id: i64, model: &str, year: Option<i32>, price: f64) -> MarketRecord {
    MarketRecord {
        id,
        source_platform: "buycycle".to_string(),
        source_url: format!("https://buycycle.com/de-de/product/{id}"),
        source_ad_id: id.to_string(),
        brand: "YT".to_string(),
        model: model.to_string(),
        year,
        price_eur: price,
        currency: "EUR".to_string(),
        frame_size: None,
        frame_material: None,
        condition_status: None,
        title: format!("YT {model}"),
        image_url: None,
        created_at: Utc::now() - Duration::days(3),
    }
}

fn capras(year: i32, prices: &[f64]) -> Vec<MarketRecord> {
    prices
        .iter()
        .enumerate()
        .map(|(i, price)| listing(i64::try_from(i).unwrap() + 1, "Capra", Some(year), *price))
        .collect()
}

fn estimator(store: &Arc<MemoryMarketStore>) -> FmvEstimator {
    FmvEstimator::new(store.clone()).with_current_year(CURRENT_YEAR)
}

#[tokio::test]
async fn median_of_exact_year_comparables() {
    let store = Arc::new(MemoryMarketStore::new());
    store.seed(capras(2021, &[2000.0, 2100.0, 2200.0, 2300.0, 2400.0]));

    let fmv = estimator(&store)
        .fair_market_value("YT", "Capra", 2021, &FmvOptions::default())
        .await
        .unwrap();

    assert_eq!(fmv.data_source, DataSource::MarketHistory);
    assert_eq!(fmv.fmv, 2200.0);
    assert_eq!(fmv.sample_size, 5);
    assert!((fmv.confidence - 0.75).abs() < 1e-9);
    assert_eq!(fmv.price_range.min, 2000.0);
    assert_eq!(fmv.price_range.max, 2400.0);
    assert_eq!(fmv.price_range.q1, Some(2100.0));
    assert_eq!(fmv.price_range.q3, Some(2300.0));
}

#[tokio::test]
async fn extreme_price_is_dropped() {
    let store = Arc::new(MemoryMarketStore::new());
    store.seed(capras(2021, &[2000.0, 2100.0, 2200.0, 2300.0, 2400.0, 9000.0]));

    let fmv = estimator(&store)
        .fair_market_value("YT", "Capra", 2021, &FmvOptions::default())
        .await
        .unwrap();

    assert_eq!(fmv.sample_size, 5);
    assert_eq!(fmv.price_range.max, 2400.0);
    assert_eq!(fmv.fmv, 2200.0);
}

#[tokio::test]
async fn sparse_years_are_adjusted_for_age() {
    let store = Arc::new(MemoryMarketStore::new());
    store.seed(capras(2020, &[1000.0, 1000.0, 1000.0]));

    let fmv = estimator(&store)
        .fair_market_value("YT", "Capra", 2021, &FmvOptions::default())
        .await
        .unwrap();

    // No year window has enough rows, so all three are used and each is
    // scaled up by one year of depreciation.
    assert_eq!(fmv.sample_size, 3);
    assert_eq!(fmv.fmv, (1000.0_f64 / 0.88).round());
}

#[tokio::test]
async fn year_is_read_from_title_when_missing() {
    let store = Arc::new(MemoryMarketStore::new());
    let mut rows = capras(2019, &[900.0, 950.0]);
    for (i, price) in [2100.0, 2200.0, 2300.0].into_iter().enumerate() {
        let mut row = listing(10 + i64::try_from(i).unwrap(), "Capra", None, price);
        row.title = "YT Capra 29 Comp 2021".to_string();
        rows.push(row);
    }
    store.seed(rows);

    let fmv = estimator(&store)
        .fair_market_value("YT", "Capra", 2021, &FmvOptions::default())
        .await
        .unwrap();

    assert_eq!(fmv.sample_size, 3);
    assert_eq!(fmv.fmv, 2200.0);
}

#[tokio::test]
async fn frame_size_filter_applies_only_with_enough_matches() {
    let store = Arc::new(MemoryMarketStore::new());
    let mut rows = capras(2021, &[2000.0, 2000.0, 2000.0, 3000.0, 3000.0]);
    for row in &mut rows[..3] {
        row.frame_size = Some("L".to_string());
    }
    for row in &mut rows[3..] {
        row.frame_size = Some("M".to_string());
    }
    store.seed(rows);
    let estimator = estimator(&store);

    let large = estimator
        .fair_market_value(
            "YT",
            "Capra",
            2021,
            &FmvOptions {
                frame_size: Some("l".to_string()),
                ..FmvOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(large.sample_size, 3);
    assert_eq!(large.fmv, 2000.0);

    let medium = estimator
        .fair_market_value(
            "YT",
            "Capra",
            2021,
            &FmvOptions {
                frame_size: Some("M".to_string()),
                ..FmvOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(medium.sample_size, 5);
}

#[tokio::test]
async fn frame_material_filter_applies_only_with_enough_matches() {
    let store = Arc::new(MemoryMarketStore::new());
    let mut rows = capras(2021, &[3000.0, 3000.0, 3000.0, 2000.0, 2000.0]);
    for (row, material) in rows.iter_mut().zip(["Carbon", "carbon fibre", "CARBON"]) {
        row.frame_material = Some(material.to_string());
    }
    for row in &mut rows[3..] {
        row.frame_material = Some("Aluminium".to_string());
    }
    store.seed(rows);
    let estimator = estimator(&store);

    let carbon = estimator
        .fair_market_value(
            "YT",
            "Capra",
            2021,
            &FmvOptions {
                frame_material: Some(" carbon ".to_string()),
                ..FmvOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(carbon.sample_size, 3);
    assert_eq!(carbon.fmv, 3000.0);
    assert_eq!(carbon.price_range.min, 3000.0);

    let alu = estimator
        .fair_market_value(
            "YT",
            "Capra",
            2021,
            &FmvOptions {
                frame_material: Some("alu".to_string()),
                ..FmvOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(alu.sample_size, 5);
    assert_eq!(alu.price_range.min, 2000.0);
}

#[tokio::test]
async fn empty_history_falls_back_to_brand_tier() {
    let store = Arc::new(MemoryMarketStore::new());

    let fmv = estimator(&store)
        .fair_market_value(
            "Stevens",
            "Whaka",
            2022,
            &FmvOptions {
                listing_price: Some(1200.0),
                ..FmvOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(fmv.data_source, DataSource::Estimation);
    assert_eq!(fmv.sample_size, 0);
    assert_eq!(fmv.fmv, 960.0);
    assert!((fmv.confidence - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn stale_rows_are_outside_the_window() {
    let store = Arc::new(MemoryMarketStore::new());
    let mut rows = capras(2021, &[2000.0, 2100.0, 2200.0]);
    for row in &mut rows {
        row.created_at = Utc::now() - Duration::days(120);
    }
    store.seed(rows);

    let fmv = estimator(&store)
        .fair_market_value(
            "YT",
            "Capra",
            2021,
            &FmvOptions {
                recent_days: Some(90),
                ..FmvOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(fmv.data_source, DataSource::Estimation);
}

#[tokio::test]
async fn blank_inputs_are_rejected() {
    let store = Arc::new(MemoryMarketStore::new());
    let err = estimator(&store)
        .fair_market_value("  ", "Capra", 2021, &FmvOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FmvError::MissingInput("brand")));

    let err = estimator(&store)
        .fair_market_value("YT", "", 2021, &FmvOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FmvError::MissingInput("model")));
}

#[tokio::test]
async fn store_failure_propagates() {
    let store = Arc::new(MemoryMarketStore::new());
    store.fail_queries(true);

    let err = estimator(&store)
        .fair_market_value("YT", "Capra", 2021, &FmvOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FmvError::Store(_)));
}
