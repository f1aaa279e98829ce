//! Expands the whitelist into concrete collection targets.

use bikefmv_core::{CollectionTarget, Source, WhitelistEntry};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::error::PlannerError;

/// One target per whitelist entry × year × source, ordered by whitelist
/// order, then ascending year, then source declaration order.
///
/// `sources` is deduplicated and sorted into declaration order first.
///
/// # Errors
///
/// Returns [`PlannerError::InvalidYearRange`] when `start > end` and
/// [`PlannerError::NoSources`] for an empty source set.
pub fn plan_targets(
    entries: &[WhitelistEntry],
    start_year: i32,
    end_year: i32,
    sources: &[Source],
) -> Result<Vec<CollectionTarget>, PlannerError> {
    if start_year > end_year {
        return Err(PlannerError::InvalidYearRange {
            start: start_year,
            end: end_year,
        });
    }
    let mut sources = sources.to_vec();
    sources.sort();
    sources.dedup();
    if sources.is_empty() {
        return Err(PlannerError::NoSources);
    }

    let mut targets = Vec::new();
    for entry in entries {
        for year in start_year..=end_year {
            for &source in &sources {
                targets.push(CollectionTarget {
                    brand: entry.brand.clone(),
                    model: entry.model.clone(),
                    year,
                    source,
                    url: search_url(source, &entry.brand, &entry.model, year),
                });
            }
        }
    }

    tracing::debug!(
        entries = entries.len(),
        start_year,
        end_year,
        sources = sources.len(),
        targets = targets.len(),
        "collection targets planned"
    );
    Ok(targets)
}

/// Page-1 search URL for a brand/model/year on one source.
#[must_use]
pub fn search_url(source: Source, brand: &str, model: &str, year: i32) -> String {
    let query = format!("{} {}", brand.trim(), model.trim());
    match source {
        Source::Buycycle => format!(
            "https://buycycle.com/de-de/shop/search?min-year={year}&max-year={year}&search={}",
            utf8_percent_encode(&query, NON_ALPHANUMERIC)
        ),
        Source::Bikeflip => {
            let search = query
                .to_lowercase()
                .split_whitespace()
                .map(|word| utf8_percent_encode(word, NON_ALPHANUMERIC).to_string())
                .collect::<Vec<_>>()
                .join("+");
            format!("https://www.bikeflip.com/de/bikes?search={search}&model_year={year}")
        }
        Source::Kleinanzeigen => format!(
            "https://www.kleinanzeigen.de/s-fahrraeder/{}/k0c217",
            slugify(&format!("{query} {year}"))
        ),
    }
}

/// Lowercases and replaces every run of non-alphanumeric characters with a
/// single `-`.
fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_owned()
}
