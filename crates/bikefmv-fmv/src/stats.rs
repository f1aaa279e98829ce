//! Price statistics over comparable listings.

use std::sync::LazyLock;

use regex::Regex;

use crate::params::{
    ANNUAL_DEPRECIATION, CONFIDENCE_BY_SAMPLE, DISPERSION_PENALTY, EXTREME_DISPERSION_CV,
    EXTREME_DISPERSION_PENALTY, HIGH_DISPERSION_CV, IQR_MULTIPLIER, MAX_AGE_ADJUSTMENT_YEARS,
    MIN_CONFIDENCE, MIN_EXACT_YEAR, MIN_NEAR_YEAR, MIN_PRICES_FOR_OUTLIERS,
    MIN_SAMPLES_FOR_DISPERSION, MIN_TITLE_YEAR,
};

static TITLE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid title year regex"));

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Median; `0.0` for an empty slice.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Percentile `p` (0–100) with linear interpolation between closest ranks;
/// `0.0` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted(values);
    let index = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = index - index.floor();
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Drops prices outside `[Q1 - k·IQR, Q3 + k·IQR]`. Slices shorter than
/// [`MIN_PRICES_FOR_OUTLIERS`] are returned unchanged. Order is preserved.
#[must_use]
pub fn remove_outliers(values: &[f64]) -> Vec<f64> {
    if values.len() < MIN_PRICES_FOR_OUTLIERS {
        return values.to_vec();
    }
    let q1 = percentile(values, 25.0);
    let q3 = percentile(values, 75.0);
    let iqr = q3 - q1;
    let low = q1 - IQR_MULTIPLIER * iqr;
    let high = q3 + IQR_MULTIPLIER * iqr;
    values
        .iter()
        .copied()
        .filter(|v| *v >= low && *v <= high)
        .collect()
}

/// Population coefficient of variation (`stddev / mean`); `None` when empty
/// or the mean is not positive.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt() / mean)
}

/// Confidence in `[0, 1]` from sample size, reduced for dispersed prices.
#[must_use]
pub fn confidence(values: &[f64]) -> f64 {
    let n = values.len();
    let mut confidence = CONFIDENCE_BY_SAMPLE
        .iter()
        .find(|(min, _)| n >= *min)
        .map_or(MIN_CONFIDENCE, |(_, c)| *c);

    if n >= MIN_SAMPLES_FOR_DISPERSION {
        if let Some(cv) = coefficient_of_variation(values) {
            if cv > HIGH_DISPERSION_CV {
                confidence *= DISPERSION_PENALTY;
            }
            if cv > EXTREME_DISPERSION_CV {
                confidence *= EXTREME_DISPERSION_PENALTY;
            }
        }
    }
    confidence.min(1.0)
}

/// Normalizes a comparable's price to `target_year`: older bikes are scaled
/// up, newer ones down, by [`ANNUAL_DEPRECIATION`] per year of difference
/// (at most [`MAX_AGE_ADJUSTMENT_YEARS`]).
#[must_use]
pub fn adjust_price_for_year(price: f64, row_year: Option<i32>, target_year: i32) -> f64 {
    let Some(row_year) = row_year else {
        return price;
    };
    let diff = target_year
        .saturating_sub(row_year)
        .clamp(-MAX_AGE_ADJUSTMENT_YEARS, MAX_AGE_ADJUSTMENT_YEARS);
    if diff == 0 {
        return price;
    }
    price * (1.0 - ANNUAL_DEPRECIATION).powi(-diff)
}

/// First plausible 4-digit model year in a listing title, bounded to
/// `[1990, current_year + 1]`.
#[must_use]
pub fn extract_year_from_title(title: &str, current_year: i32) -> Option<i32> {
    let year: i32 = TITLE_YEAR.find(title)?.as_str().parse().ok()?;
    (MIN_TITLE_YEAR..=current_year.saturating_add(1))
        .contains(&year)
        .then_some(year)
}

/// Which year window [`select_year_window`] settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearWindow {
    Exact,
    WithinOne,
    WithinTwo,
    All,
}

impl YearWindow {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            YearWindow::Exact => "exact",
            YearWindow::WithinOne => "within_1",
            YearWindow::WithinTwo => "within_2",
            YearWindow::All => "all",
        }
    }
}

/// Narrowest year window around `target_year` with enough candidates:
/// exact year (3+), then ±1 (5+), then ±2 (5+), else every candidate.
/// Candidates without a year only survive in the last case.
pub fn select_year_window<T, F>(items: Vec<T>, target_year: i32, year_of: F) -> (Vec<T>, YearWindow)
where
    F: Fn(&T) -> Option<i32>,
{
    let within =
        |item: &T, span: u32| year_of(item).is_some_and(|y| y.abs_diff(target_year) <= span);
    let count = |span: u32| items.iter().filter(|item| within(item, span)).count();

    let (span, window) = if count(0) >= MIN_EXACT_YEAR {
        (0, YearWindow::Exact)
    } else if count(1) >= MIN_NEAR_YEAR {
        (1, YearWindow::WithinOne)
    } else if count(2) >= MIN_NEAR_YEAR {
        (2, YearWindow::WithinTwo)
    } else {
        return (items, YearWindow::All);
    };

    let selected = items.into_iter().filter(|item| within(item, span)).collect();
    (selected, window)
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod tests;
