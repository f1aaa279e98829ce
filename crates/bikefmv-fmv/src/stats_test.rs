use super::*;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn median_of_odd_and_even_lengths() {
    assert!(approx(median(&[10.0, 20.0, 30.0]), 20.0));
    assert!(approx(median(&[40.0, 10.0, 30.0, 20.0]), 25.0));
    assert!(approx(median(&[]), 0.0));
}

#[test]
fn percentile_interpolates_between_ranks() {
    assert!(approx(percentile(&[10.0, 20.0, 30.0, 40.0], 25.0), 17.5));
    assert!(approx(percentile(&[10.0, 20.0, 30.0, 40.0], 75.0), 32.5));
    assert!(approx(percentile(&[40.0, 10.0, 30.0, 20.0], 0.0), 10.0));
    assert!(approx(percentile(&[10.0, 20.0, 30.0, 40.0], 100.0), 40.0));
    assert!(approx(percentile(&[7.0], 50.0), 7.0));
    assert!(approx(percentile(&[], 50.0), 0.0));
}

#[test]
fn same_year_leaves_price_unchanged() {
    assert!(approx(adjust_price_for_year(2000.0, Some(2020), 2020), 2000.0));
    assert!(approx(adjust_price_for_year(2000.0, None, 2020), 2000.0));
}

#[test]
fn older_comparables_are_scaled_up() {
    // Target 2021, row 2020: one year older, so worth more as a 2021.
    let adjusted = adjust_price_for_year(1000.0, Some(2020), 2021);
    assert!(approx(adjusted, 1000.0 / 0.88));

    let adjusted = adjust_price_for_year(1000.0, Some(2022), 2021);
    assert!(approx(adjusted, 880.0));
}

#[test]
fn age_adjustment_is_clamped_to_six_years() {
    let six = adjust_price_for_year(1000.0, Some(2010), 2016);
    let ten = adjust_price_for_year(1000.0, Some(2006), 2016);
    assert!(approx(six, ten));
}

#[test]
fn extreme_year_gaps_saturate_before_clamping() {
    let six_older = adjust_price_for_year(1000.0, Some(2010), 2016);
    let six_newer = adjust_price_for_year(1000.0, Some(2016), 2010);
    assert!(approx(adjust_price_for_year(1000.0, Some(i32::MIN), i32::MAX), six_older));
    assert!(approx(adjust_price_for_year(1000.0, Some(i32::MAX), i32::MIN), six_newer));
}

#[test]
fn short_inputs_skip_outlier_removal() {
    let prices = [100.0, 5000.0, 90_000.0];
    assert_eq!(remove_outliers(&prices), prices.to_vec());
}

#[test]
fn iqr_rule_drops_extreme_price() {
    let kept = remove_outliers(&[1000.0, 1100.0, 1050.0, 1200.0, 5000.0]);
    assert_eq!(kept.len(), 4);
    assert!(!kept.contains(&5000.0));
}

#[test]
fn confidence_follows_sample_size_buckets() {
    let flat = |n: usize| vec![1000.0; n];
    assert!(approx(confidence(&flat(25)), 0.95));
    assert!(approx(confidence(&flat(12)), 0.85));
    assert!(approx(confidence(&flat(6)), 0.75));
    assert!(approx(confidence(&flat(3)), 0.60));
    assert!(approx(confidence(&flat(2)), 0.40));
}

#[test]
fn dispersed_prices_lower_confidence() {
    let tight = [1000.0, 1050.0, 980.0, 1020.0, 1010.0];
    let wide = [200.0, 3000.0, 400.0, 2500.0, 100.0];
    let cv_wide = coefficient_of_variation(&wide).unwrap();
    assert!(cv_wide > 0.5);
    assert!(coefficient_of_variation(&tight).unwrap() <= 0.3);

    assert!(confidence(&wide) <= confidence(&tight));
    assert!(approx(confidence(&wide), 0.75 * 0.9 * 0.8));
}

#[test]
fn title_year_is_bounded() {
    assert_eq!(extract_year_from_title("Canyon Spectral 2019 CF", 2026), Some(2019));
    assert_eq!(extract_year_from_title("Canyon Spectral 29", 2026), None);
    assert_eq!(extract_year_from_title("Rad von 1985", 2026), None);
    assert_eq!(extract_year_from_title("Modell 2027", 2026), Some(2027));
    assert_eq!(extract_year_from_title("Modell 2028", 2026), None);
    assert_eq!(extract_year_from_title("Modell 12019", 2026), None);
}

#[test]
fn exact_year_window_wins_with_three_matches() {
    let years = vec![Some(2020), Some(2020), Some(2020), Some(2019), None];
    let (selected, window) = select_year_window(years, 2020, |y| *y);
    assert_eq!(window, YearWindow::Exact);
    assert_eq!(selected.len(), 3);
}

#[test]
fn widens_to_two_years_then_everything() {
    let years = vec![Some(2018), Some(2018), Some(2022), Some(2021), Some(2020), None];
    let (selected, window) = select_year_window(years, 2020, |y| *y);
    assert_eq!(window, YearWindow::WithinTwo);
    assert_eq!(selected.len(), 5);

    let years = vec![Some(2015), Some(2020), None, Some(2025)];
    let (selected, window) = select_year_window(years, 2020, |y| *y);
    assert_eq!(window, YearWindow::All);
    assert_eq!(selected.len(), 4);
}

#[test]
fn within_one_needs_five() {
    let years = vec![Some(2019), Some(2021), Some(2020), Some(2019), Some(2021)];
    let (_, window) = select_year_window(years, 2020, |y| *y);
    assert_eq!(window, YearWindow::WithinOne);
}

#[test]
fn distant_years_never_fall_inside_a_window() {
    let years = vec![Some(i32::MIN), Some(i32::MAX), Some(2020), Some(2020), Some(2020)];
    let (selected, window) = select_year_window(years, 2020, |y| *y);
    assert_eq!(window, YearWindow::Exact);
    assert_eq!(selected, vec![Some(2020); 3]);

    let years = vec![Some(i32::MIN), Some(i32::MIN)];
    let (_, window) = select_year_window(years, i32::MAX, |y| *y);
    assert_eq!(window, YearWindow::All);
}
