//! Listing providers.
//!
//! Page rendering and DOM extraction happen in a headless-browser sidecar;
//! this crate only sees the extracted listings. [`HttpListingProvider`] talks
//! to that sidecar over HTTP:
//!
//! `GET {base}/listings?source=<source>&url=<page url>&page=<n>&limit=<page size>`
//!
//! returning `{"listings": [{"title", "price", "url", "ad_id", "frame_size"?, "image_url"?}]}`.

use std::time::Duration;

use async_trait::async_trait;
use bikefmv_core::{AppConfig, Source};
use reqwest::{Client, Url};
use serde::{Deserialize, Deserializer};

use crate::error::ProviderError;
use crate::rate_limit::retry_with_backoff;

/// One listing as extracted from a search results page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawListing {
    pub title: String,
    /// Asking price in EUR. Sidecars may send a number or a display string
    /// such as `"2.450 €"`; unparseable values become `None`.
    #[serde(default, deserialize_with = "deserialize_price")]
    pub price: Option<f64>,
    pub url: String,
    #[serde(default)]
    pub ad_id: Option<String>,
    #[serde(default)]
    pub frame_size: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl RawListing {
    /// The listing's ad id, or the last path segment of its URL when the
    /// provider did not supply one.
    #[must_use]
    pub fn source_ad_id(&self) -> Option<String> {
        if let Some(id) = self.ad_id.as_deref().map(str::trim) {
            if !id.is_empty() {
                return Some(id.to_owned());
            }
        }
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
            .map(str::to_owned)
    }
}

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    listings: Vec<RawListing>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceValue {
    Number(f64),
    Text(String),
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<PriceValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(PriceValue::Number(n)) if n.is_finite() => Some(n),
        Some(PriceValue::Text(s)) => parse_price(&s),
        _ => None,
    })
}

/// Parses a German-formatted price string (`"1.299,00 €"`, `"2.450 € VB"`).
///
/// A dot followed by exactly three digits is a thousands separator; a comma
/// is the decimal separator.
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let mut cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.contains(',') {
        cleaned = cleaned.replace('.', "").replacen(',', ".", 1).replace(',', "");
    } else if has_thousands_dot(&cleaned) {
        cleaned = cleaned.replace('.', "");
    }
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

fn has_thousands_dot(value: &str) -> bool {
    value
        .split('.')
        .skip(1)
        .any(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit()))
}

/// Source of search result pages.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Fetches the listings shown on one page of search results.
    async fn fetch_page(
        &self,
        source: Source,
        page_url: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<RawListing>, ProviderError>;
}

/// HTTP client for the listing sidecar.
///
/// Transient errors (429, network failures) are retried with exponential
/// back-off up to `max_retries` additional attempts.
#[derive(Debug, Clone)]
pub struct HttpListingProvider {
    client: Client,
    endpoint: Url,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl HttpListingProvider {
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidProviderUrl`] if `base_url` is not an
    /// absolute http(s) URL, or [`ProviderError::Http`] if the client cannot
    /// be built.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ProviderError> {
        let endpoint = listings_endpoint(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            max_retries,
            backoff_base_secs,
        })
    }

    /// # Errors
    ///
    /// See [`HttpListingProvider::new`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ProviderError> {
        Self::new(
            &config.provider_url,
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_secs,
        )
    }

    fn request_url(&self, source: Source, page_url: &str, page: u32, limit: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("source", source.as_str())
            .append_pair("url", page_url)
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());
        url
    }
}

fn listings_endpoint(base_url: &str) -> Result<Url, ProviderError> {
    let invalid = |reason: &str| ProviderError::InvalidProviderUrl {
        url: base_url.to_owned(),
        reason: reason.to_owned(),
    };
    let base = Url::parse(base_url.trim_end_matches('/')).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let path = format!("{}/listings", base.path().trim_end_matches('/'));
    let mut endpoint = base;
    endpoint.set_path(&path);
    endpoint.set_query(None);
    Ok(endpoint)
}

#[async_trait]
impl ListingProvider for HttpListingProvider {
    async fn fetch_page(
        &self,
        source: Source,
        page_url: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<RawListing>, ProviderError> {
        let url = self.request_url(source, page_url, page, limit);

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(ProviderError::RateLimited {
                        domain: url.host_str().unwrap_or_default().to_owned(),
                        retry_after_secs,
                    });
                }

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(ProviderError::NotFound {
                        url: url.to_string(),
                    });
                }

                if !status.is_success() {
                    return Err(ProviderError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let body = response.text().await?;
                let parsed = serde_json::from_str::<ListingsResponse>(&body).map_err(|e| {
                    ProviderError::Deserialize {
                        context: format!("{source} page {page}"),
                        source: e,
                    }
                })?;
                Ok(parsed.listings)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_german_price_strings() {
        assert_eq!(parse_price("2.450 €"), Some(2450.0));
        assert_eq!(parse_price("1.299,00 €"), Some(1299.0));
        assert_eq!(parse_price("899,50"), Some(899.5));
        assert_eq!(parse_price("1850"), Some(1850.0));
        assert_eq!(parse_price("12.5"), Some(12.5));
        assert_eq!(parse_price("VB"), None);
    }

    #[test]
    fn listing_price_accepts_number_or_string() {
        let listing: RawListing = serde_json::from_str(
            r#"{"title":"Canyon Spectral","price":"3.100 € VB","url":"https://x/s-anzeige/abc/123-217-1"}"#,
        )
        .unwrap();
        assert_eq!(listing.price, Some(3100.0));

        let listing: RawListing =
            serde_json::from_str(r#"{"title":"t","price":1800,"url":"u","ad_id":"9"}"#).unwrap();
        assert_eq!(listing.price, Some(1800.0));

        let listing: RawListing =
            serde_json::from_str(r#"{"title":"t","price":null,"url":"u"}"#).unwrap();
        assert_eq!(listing.price, None);
    }

    #[test]
    fn ad_id_falls_back_to_last_url_segment() {
        let listing = RawListing {
            title: "t".to_owned(),
            price: Some(1000.0),
            url: "https://buycycle.com/de-de/product/yt-capra-2021-58213/?ref=search".to_owned(),
            ad_id: Some("  ".to_owned()),
            frame_size: None,
            image_url: None,
        };
        assert_eq!(listing.source_ad_id().as_deref(), Some("yt-capra-2021-58213"));
    }

    #[test]
    fn explicit_ad_id_wins() {
        let listing = RawListing {
            title: "t".to_owned(),
            price: None,
            url: "https://www.kleinanzeigen.de/s-anzeige/x/2871".to_owned(),
            ad_id: Some(" 2871 ".to_owned()),
            frame_size: None,
            image_url: None,
        };
        assert_eq!(listing.source_ad_id().as_deref(), Some("2871"));
    }

    #[test]
    fn endpoint_appends_listings_path() {
        let endpoint = listings_endpoint("http://127.0.0.1:3100/").unwrap();
        assert_eq!(endpoint.as_str(), "http://127.0.0.1:3100/listings");

        let endpoint = listings_endpoint("https://sidecar.local/api").unwrap();
        assert_eq!(endpoint.as_str(), "https://sidecar.local/api/listings");

        assert!(matches!(
            listings_endpoint("ftp://sidecar.local"),
            Err(ProviderError::InvalidProviderUrl { .. })
        ));
        assert!(listings_endpoint("not a url").is_err());
    }
}
