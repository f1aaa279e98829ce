//! Per-source pagination conventions.

use bikefmv_core::Source;

/// How a source paginates its search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStrategy {
    /// `base&page=N`, 24 results per page.
    Buycycle,
    /// `base&page=N&per_page=27`.
    Bikeflip,
    /// Page 1 is the base URL; page N inserts `seite:N/` after the category
    /// segment. 25 results per page.
    Kleinanzeigen,
}

const KLEINANZEIGEN_CATEGORY: &str = "/s-fahrraeder/";

impl SourceStrategy {
    #[must_use]
    pub fn for_source(source: Source) -> Self {
        match source {
            Source::Buycycle => SourceStrategy::Buycycle,
            Source::Bikeflip => SourceStrategy::Bikeflip,
            Source::Kleinanzeigen => SourceStrategy::Kleinanzeigen,
        }
    }

    #[must_use]
    pub fn page_size(self) -> u32 {
        match self {
            SourceStrategy::Buycycle => 24,
            SourceStrategy::Bikeflip => 27,
            SourceStrategy::Kleinanzeigen => 25,
        }
    }

    /// URL of results page `page` (1-based) for a target's base search URL.
    #[must_use]
    pub fn page_url(self, base_url: &str, page: u32) -> String {
        match self {
            SourceStrategy::Buycycle => {
                format!("{base_url}{}page={page}", query_separator(base_url))
            }
            SourceStrategy::Bikeflip => format!(
                "{base_url}{}page={page}&per_page={}",
                query_separator(base_url),
                self.page_size()
            ),
            SourceStrategy::Kleinanzeigen => {
                if page <= 1 {
                    return base_url.to_owned();
                }
                match base_url.find(KLEINANZEIGEN_CATEGORY) {
                    Some(idx) => {
                        let split = idx + KLEINANZEIGEN_CATEGORY.len();
                        format!("{}seite:{page}/{}", &base_url[..split], &base_url[split..])
                    }
                    None => format!("{}/seite:{page}", base_url.trim_end_matches('/')),
                }
            }
        }
    }
}

fn query_separator(url: &str) -> char {
    if url.contains('?') {
        '&'
    } else {
        '?'
    }
}
