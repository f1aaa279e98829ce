//! Paginated collection of one target.
//!
//! Each page goes through fetch → parse → persist → decide. The decision
//! stops the target when the record limit is reached, after two consecutive
//! empty pages, when every valid listing on a page was already known, at the
//! page ceiling, or on cancellation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bikefmv_core::{
    AppConfig, CollectionEvent, CollectionStats, CollectionTarget, EventSink, MarketStore,
    NewMarketRecord, Source, StopReason,
};

use crate::error::CollectError;
use crate::provider::{ListingProvider, RawListing};
use crate::strategy::SourceStrategy;

/// Hard ceiling on pages fetched for a single target.
pub const MAX_PAGES: u32 = 50;

/// Consecutive empty (or failed) pages after which a target stops.
pub const MAX_CONSECUTIVE_EMPTY_PAGES: u32 = 2;

/// Listings priced below this are accessories, parts or placeholders.
pub const MIN_LISTING_PRICE_EUR: f64 = 100.0;

/// Title fragments marking frame-only listings.
const FRAME_ONLY_MARKERS: [&str; 2] = ["frameset", "rahmen"];

const DEFAULT_PAGE_DELAY_MS: u64 = 2000;

/// Cooperative cancellation shared by the CLI, orchestrator and collector.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ad ids already handled in the current run, keyed by source.
#[derive(Debug, Default)]
pub struct SeenAds(HashSet<(Source, String)>);

impl SeenAds {
    /// Returns `false` if the ad was already seen.
    pub fn insert(&mut self, source: Source, ad_id: &str) -> bool {
        self.0.insert((source, ad_id.to_owned()))
    }

    #[must_use]
    pub fn contains(&self, source: Source, ad_id: &str) -> bool {
        self.0.contains(&(source, ad_id.to_owned()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollectorSettings {
    /// Cooldown between two pages of one target.
    pub page_delay: Duration,
    pub max_pages: u32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            max_pages: MAX_PAGES,
        }
    }
}

impl CollectorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            page_delay: Duration::from_millis(config.page_delay_ms),
            max_pages: MAX_PAGES,
        }
    }
}

/// Result of collecting one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetOutcome {
    pub stats: CollectionStats,
    pub stop: StopReason,
    pub pages: u32,
}

/// Valid and duplicate counts for one persisted page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTally {
    pub valid: u32,
    pub duplicates: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NextPage,
    Stop(StopReason),
}

/// Chooses what happens after page `page` has been persisted.
#[must_use]
pub fn decide(
    page: u32,
    max_pages: u32,
    consecutive_empty: u32,
    tally: PageTally,
    collected: u32,
    limit: u32,
) -> Decision {
    if collected >= limit {
        Decision::Stop(StopReason::LimitReached)
    } else if consecutive_empty >= MAX_CONSECUTIVE_EMPTY_PAGES {
        Decision::Stop(StopReason::EmptyPages)
    } else if tally.valid > 0 && tally.duplicates == tally.valid {
        Decision::Stop(StopReason::AllDuplicates)
    } else if page >= max_pages {
        Decision::Stop(StopReason::PageCeiling)
    } else {
        Decision::NextPage
    }
}

/// Whether a raw listing is worth storing at all.
#[must_use]
pub fn is_valid_listing(listing: &RawListing) -> bool {
    let Some(price) = listing.price else {
        return false;
    };
    if price < MIN_LISTING_PRICE_EUR {
        return false;
    }
    let title = listing.title.to_lowercase();
    !FRAME_ONLY_MARKERS.iter().any(|m| title.contains(m))
}

/// Walks the result pages of one target and writes listings to the store.
#[derive(Clone)]
pub struct PaginatedCollector {
    provider: Arc<dyn ListingProvider>,
    store: Arc<dyn MarketStore>,
    events: Arc<dyn EventSink>,
    settings: CollectorSettings,
    cancel: CancelFlag,
}

impl PaginatedCollector {
    #[must_use]
    pub fn new(
        provider: Arc<dyn ListingProvider>,
        store: Arc<dyn MarketStore>,
        events: Arc<dyn EventSink>,
        settings: CollectorSettings,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            provider,
            store,
            events,
            settings,
            cancel,
        }
    }

    #[must_use]
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Collects up to `limit` new records for `target`.
    ///
    /// Provider failures count as empty pages and store failures count as
    /// `errors`; neither aborts the target.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::MissingUrl`] if the target has no search URL.
    pub async fn collect(
        &self,
        target: &CollectionTarget,
        limit: u32,
        seen: &mut SeenAds,
    ) -> Result<TargetOutcome, CollectError> {
        if target.url.trim().is_empty() {
            return Err(CollectError::MissingUrl {
                brand: target.brand.clone(),
                model: target.model.clone(),
                year: target.year,
            });
        }

        let strategy = SourceStrategy::for_source(target.source);
        let mut stats = CollectionStats::default();
        let mut consecutive_empty = 0u32;
        let mut page = 1u32;

        let stop = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if stats.collected >= limit {
                break StopReason::LimitReached;
            }

            let listings = self.fetch(target.source, strategy, &target.url, page).await;

            let tally = if listings.is_empty() {
                consecutive_empty += 1;
                PageTally::default()
            } else {
                consecutive_empty = 0;
                self.persist(target, &listings, limit, &mut stats, seen).await
            };
            self.events.emit(CollectionEvent::PageProcessed {
                source: target.source,
                page,
                valid: tally.valid,
                duplicates: tally.duplicates,
            });

            match decide(
                page,
                self.settings.max_pages,
                consecutive_empty,
                tally,
                stats.collected,
                limit,
            ) {
                Decision::Stop(reason) => break reason,
                Decision::NextPage => {
                    page += 1;
                    if !self.settings.page_delay.is_zero() {
                        tokio::time::sleep(self.settings.page_delay).await;
                    }
                }
            }
        };

        self.events.emit(CollectionEvent::Stopped {
            source: target.source,
            page,
            reason: stop,
        });
        Ok(TargetOutcome {
            stats,
            stop,
            pages: page,
        })
    }

    async fn fetch(
        &self,
        source: Source,
        strategy: SourceStrategy,
        base_url: &str,
        page: u32,
    ) -> Vec<RawListing> {
        let url = strategy.page_url(base_url, page);
        let started = Instant::now();
        match self
            .provider
            .fetch_page(source, &url, page, strategy.page_size())
            .await
        {
            Ok(listings) => {
                self.events.emit(CollectionEvent::PageFetched {
                    source,
                    page,
                    listings: listings.len(),
                    elapsed: started.elapsed(),
                });
                listings
            }
            Err(e) => {
                self.events.emit(CollectionEvent::PageFailed {
                    source,
                    page,
                    error: e.to_string(),
                });
                Vec::new()
            }
        }
    }

    async fn persist(
        &self,
        target: &CollectionTarget,
        listings: &[RawListing],
        limit: u32,
        stats: &mut CollectionStats,
        seen: &mut SeenAds,
    ) -> PageTally {
        let mut tally = PageTally::default();
        let platform = target.source.as_str();

        for listing in listings {
            if stats.collected >= limit {
                break;
            }
            if !is_valid_listing(listing) {
                continue;
            }
            let Some(ad_id) = listing.source_ad_id() else {
                tracing::debug!(source = %target.source, url = %listing.url, "listing without ad id skipped");
                continue;
            };
            tally.valid += 1;

            if seen.contains(target.source, &ad_id) {
                tally.duplicates += 1;
                stats.duplicates += 1;
                continue;
            }

            // An ad is marked seen only once the store has answered for it.
            match self.store.exists(platform, &ad_id).await {
                Ok(true) => {
                    seen.insert(target.source, &ad_id);
                    tally.duplicates += 1;
                    stats.duplicates += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    stats.errors += 1;
                    self.store_failed(target.source, &ad_id, &e);
                    continue;
                }
            }

            let record = new_record(target, listing, ad_id.clone());
            match self.store.insert(&record).await {
                Ok(true) => {
                    seen.insert(target.source, &ad_id);
                    stats.collected += 1;
                }
                Ok(false) => {
                    seen.insert(target.source, &ad_id);
                    tally.duplicates += 1;
                    stats.duplicates += 1;
                }
                Err(e) => {
                    stats.errors += 1;
                    self.store_failed(target.source, &ad_id, &e);
                }
            }
        }
        tally
    }

    fn store_failed(&self, source: Source, ad_id: &str, error: &dyn std::fmt::Display) {
        self.events.emit(CollectionEvent::StoreFailed {
            source,
            ad_id: ad_id.to_owned(),
            error: error.to_string(),
        });
    }
}

/// Builds the stored row. Brand, model and year come from the target, not
/// the listing.
fn new_record(target: &CollectionTarget, listing: &RawListing, ad_id: String) -> NewMarketRecord {
    NewMarketRecord {
        source_platform: target.source.as_str().to_owned(),
        source_url: listing.url.clone(),
        source_ad_id: ad_id,
        brand: target.brand.clone(),
        model: target.model.clone(),
        year: Some(target.year),
        price_eur: listing.price.unwrap_or_default(),
        currency: "EUR".to_owned(),
        frame_size: listing.frame_size.clone().filter(|s| !s.trim().is_empty()),
        frame_material: None,
        condition_status: None,
        title: listing.title.clone(),
        image_url: listing.image_url.clone(),
    }
}

#[cfg(test)]
#[path = "collector_test.rs"]
mod tests;
