use thiserror::Error;

/// Failures talking to the listing provider sidecar.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid provider URL \"{url}\": {reason}")]
    InvalidProviderUrl { url: String, reason: String },
}

/// A failure that ends one collection target.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("target {brand} {model} {year} has no search URL")]
    MissingUrl {
        brand: String,
        model: String,
        year: i32,
    },
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid year range {start}..={end}: start is after end")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("no sources selected")]
    NoSources,
}
