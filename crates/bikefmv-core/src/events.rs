//! Structured collection events.
//!
//! Collectors and the orchestrator report progress as typed
//! [`CollectionEvent`]s through an injected [`EventSink`]. The default sink
//! forwards them to `tracing`; tests use a recording sink and assert on the
//! events directly.

use std::time::Duration;

use crate::records::CollectionStats;
use crate::source::Source;

/// Why a paginated collection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The per-target record limit was reached.
    LimitReached,
    /// Too many consecutive pages returned no listings.
    EmptyPages,
    /// Every valid listing on the last page was already stored.
    AllDuplicates,
    /// The hard page ceiling was hit.
    PageCeiling,
    /// The run was cancelled between pages.
    Cancelled,
}

impl StopReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::LimitReached => "limit_reached",
            StopReason::EmptyPages => "empty_pages",
            StopReason::AllDuplicates => "all_duplicates",
            StopReason::PageCeiling => "page_ceiling",
            StopReason::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionEvent {
    PageFetched {
        source: Source,
        page: u32,
        listings: usize,
        elapsed: Duration,
    },
    PageFailed {
        source: Source,
        page: u32,
        error: String,
    },
    PageProcessed {
        source: Source,
        page: u32,
        valid: u32,
        duplicates: u32,
    },
    StoreFailed {
        source: Source,
        ad_id: String,
        error: String,
    },
    Stopped {
        source: Source,
        page: u32,
        reason: StopReason,
    },
    TargetFinished {
        source: Source,
        brand: String,
        model: String,
        year: i32,
        stats: CollectionStats,
        elapsed: Duration,
    },
    TargetFailed {
        source: Source,
        brand: String,
        model: String,
        year: i32,
        error: String,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: CollectionEvent);
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: CollectionEvent) {
        match event {
            CollectionEvent::PageFetched {
                source,
                page,
                listings,
                elapsed,
            } => {
                tracing::debug!(
                    %source,
                    page,
                    listings,
                    elapsed_ms = elapsed.as_millis(),
                    "page fetched"
                );
            }
            CollectionEvent::PageFailed {
                source,
                page,
                error,
            } => {
                tracing::warn!(%source, page, error = %error, "page fetch failed; treating as empty");
            }
            CollectionEvent::PageProcessed {
                source,
                page,
                valid,
                duplicates,
            } => {
                tracing::debug!(%source, page, valid, duplicates, "page processed");
            }
            CollectionEvent::StoreFailed {
                source,
                ad_id,
                error,
            } => {
                tracing::warn!(%source, ad_id = %ad_id, error = %error, "failed to store listing");
            }
            CollectionEvent::Stopped {
                source,
                page,
                reason,
            } => {
                tracing::info!(%source, page, reason = reason.as_str(), "pagination stopped");
            }
            CollectionEvent::TargetFinished {
                source,
                brand,
                model,
                year,
                stats,
                elapsed,
            } => {
                tracing::info!(
                    %source,
                    brand = %brand,
                    model = %model,
                    year,
                    collected = stats.collected,
                    duplicates = stats.duplicates,
                    errors = stats.errors,
                    elapsed_ms = elapsed.as_millis(),
                    "target finished"
                );
            }
            CollectionEvent::TargetFailed {
                source,
                brand,
                model,
                year,
                error,
            } => {
                tracing::error!(
                    %source,
                    brand = %brand,
                    model = %model,
                    year,
                    error = %error,
                    "target failed"
                );
            }
        }
    }
}
