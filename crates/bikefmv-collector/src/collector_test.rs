use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bikefmv_core::testing::{MemoryMarketStore, RecordingSink};

use super::*;
use crate::error::ProviderError;

/// Serves queued pages in order, then empty pages forever.
#[derive(Default)]
struct ScriptedProvider {
    pages: Mutex<VecDeque<Result<Vec<RawListing>, ProviderError>>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn with_pages(pages: Vec<Result<Vec<RawListing>, ProviderError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingProvider for ScriptedProvider {
    async fn fetch_page(
        &self,
        _source: Source,
        page_url: &str,
        _page: u32,
        _limit: u32,
    ) -> Result<Vec<RawListing>, ProviderError> {
        self.requested.lock().unwrap().push(page_url.to_owned());
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn listing(ad_id: &str, price: f64) -> RawListing {
    RawListing {
        title: format!("YT Capra Core 3 {ad_id}"),
        price: Some(price),
        url: format!("https://buycycle.com/de-de/product/{ad_id}"),
        ad_id: Some(ad_id.to_owned()),
        frame_size: Some("L".to_owned()),
        image_url: None,
    }
}

fn target() -> CollectionTarget {
    CollectionTarget {
        brand: "YT".to_owned(),
        model: "Capra".to_owned(),
        year: 2021,
        source: Source::Buycycle,
        url: "https://buycycle.com/de-de/shop/search?min-year=2021&max-year=2021&search=YT%20Capra"
            .to_owned(),
    }
}

struct Harness {
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryMarketStore>,
    sink: Arc<RecordingSink>,
    collector: PaginatedCollector,
}

fn harness(pages: Vec<Result<Vec<RawListing>, ProviderError>>, max_pages: u32) -> Harness {
    let provider = Arc::new(ScriptedProvider::with_pages(pages));
    let store = Arc::new(MemoryMarketStore::new());
    let sink = Arc::new(RecordingSink::new());
    let collector = PaginatedCollector::new(
        provider.clone(),
        store.clone(),
        sink.clone(),
        CollectorSettings {
            page_delay: Duration::ZERO,
            max_pages,
        },
        CancelFlag::new(),
    );
    Harness {
        provider,
        store,
        sink,
        collector,
    }
}

fn provider_down() -> ProviderError {
    ProviderError::UnexpectedStatus {
        status: 502,
        url: "http://127.0.0.1:3100/listings".to_owned(),
    }
}

#[tokio::test]
async fn same_key_twice_is_collected_once() {
    let h = harness(
        vec![Ok(vec![listing("a1", 2400.0), listing("a1", 2400.0)])],
        MAX_PAGES,
    );

    let outcome = h
        .collector
        .collect(&target(), 20, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stats.collected, 1);
    assert_eq!(outcome.stats.duplicates, 1);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn page_of_known_listings_stops_before_limit() {
    let h = harness(
        vec![
            Ok(vec![listing("a1", 2400.0), listing("a2", 2600.0)]),
            Ok(vec![listing("a3", 2500.0)]),
        ],
        MAX_PAGES,
    );
    for id in ["a1", "a2"] {
        let record = new_record(&target(), &listing(id, 2000.0), id.to_owned());
        assert!(h.store.insert(&record).await.unwrap());
    }

    let outcome = h
        .collector
        .collect(&target(), 20, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::AllDuplicates);
    assert_eq!(outcome.stats.collected, 0);
    assert_eq!(outcome.stats.duplicates, 2);
    assert_eq!(h.provider.requested().len(), 1, "page 2 must not be fetched");
}

#[tokio::test]
async fn two_consecutive_empty_pages_stop() {
    let h = harness(vec![Ok(Vec::new()), Ok(Vec::new())], MAX_PAGES);

    let outcome = h
        .collector
        .collect(&target(), 20, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::EmptyPages);
    assert_eq!(outcome.pages, 2);
    assert_eq!(h.provider.requested().len(), 2);
}

#[tokio::test]
async fn non_empty_page_resets_empty_counter() {
    let h = harness(
        vec![
            Ok(Vec::new()),
            Ok(vec![listing("a1", 2400.0)]),
            Ok(Vec::new()),
            Ok(Vec::new()),
        ],
        MAX_PAGES,
    );

    let outcome = h
        .collector
        .collect(&target(), 20, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::EmptyPages);
    assert_eq!(outcome.pages, 4);
    assert_eq!(outcome.stats.collected, 1);
}

#[tokio::test]
async fn provider_errors_count_as_empty_pages() {
    let h = harness(vec![Err(provider_down()), Err(provider_down())], MAX_PAGES);

    let outcome = h
        .collector
        .collect(&target(), 20, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::EmptyPages);
    assert_eq!(outcome.stats, CollectionStats::default());
    let failed = h
        .sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, CollectionEvent::PageFailed { .. }))
        .count();
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn stops_mid_page_at_limit() {
    let page: Vec<RawListing> = (1..=5)
        .map(|i| listing(&format!("a{i}"), 2000.0))
        .collect();
    let h = harness(vec![Ok(page)], MAX_PAGES);

    let outcome = h
        .collector
        .collect(&target(), 3, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::LimitReached);
    assert_eq!(outcome.stats.collected, 3);
    assert_eq!(h.store.len(), 3);
    assert_eq!(h.provider.requested().len(), 1);
}

#[tokio::test]
async fn invalid_listings_are_not_stored() {
    let mut no_price = listing("a4", 0.0);
    no_price.price = None;
    let mut frameset = listing("a2", 1500.0);
    frameset.title = "YT Capra Frameset".to_owned();
    let mut rahmen = listing("a3", 900.0);
    rahmen.title = "YT Capra Rahmen Gr. L".to_owned();
    let h = harness(
        vec![Ok(vec![listing("a1", 99.0), frameset, rahmen, no_price])],
        MAX_PAGES,
    );

    let outcome = h
        .collector
        .collect(&target(), 20, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stats, CollectionStats::default());
    assert!(h.store.is_empty());
    // The page had listings, so only pages 2 and 3 count as empty.
    assert_eq!(outcome.pages, 3);
}

#[tokio::test]
async fn insert_failures_count_as_errors() {
    let h = harness(
        vec![Ok(vec![listing("a1", 2400.0), listing("a2", 2500.0)])],
        MAX_PAGES,
    );
    h.store.fail_inserts(true);

    let outcome = h
        .collector
        .collect(&target(), 20, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stats.errors, 2);
    assert_eq!(outcome.stats.duplicates, 0);
    assert_eq!(outcome.stats.collected, 0);
    assert!(h
        .sink
        .events()
        .iter()
        .any(|e| matches!(e, CollectionEvent::StoreFailed { ad_id, .. } if ad_id == "a1")));
}

#[tokio::test]
async fn failed_insert_is_retried_when_the_ad_reappears() {
    let h = harness(
        vec![Ok(vec![listing("a1", 2400.0)]), Ok(vec![listing("a1", 2400.0)])],
        1,
    );
    let mut seen = SeenAds::default();

    h.store.fail_inserts(true);
    let first = h.collector.collect(&target(), 20, &mut seen).await.unwrap();
    assert_eq!(first.stats.errors, 1);
    assert_eq!(first.stats.duplicates, 0);
    assert!(seen.is_empty());

    h.store.fail_inserts(false);
    let second = h.collector.collect(&target(), 20, &mut seen).await.unwrap();
    assert_eq!(second.stats.collected, 1);
    assert_eq!(second.stats.duplicates, 0);
    assert_ne!(second.stop, StopReason::AllDuplicates);
    assert_eq!(h.store.len(), 1);
    assert!(seen.contains(Source::Buycycle, "a1"));
}

#[tokio::test]
async fn cancelled_before_first_page_fetches_nothing() {
    let h = harness(vec![Ok(vec![listing("a1", 2400.0)])], MAX_PAGES);
    h.collector.cancel_flag().cancel();

    let outcome = h
        .collector
        .collect(&target(), 20, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::Cancelled);
    assert!(h.provider.requested().is_empty());
}

#[tokio::test]
async fn page_ceiling_bounds_pagination() {
    let pages = (0..5)
        .map(|p| Ok(vec![listing(&format!("p{p}"), 2000.0)]))
        .collect();
    let h = harness(pages, 2);

    let outcome = h
        .collector
        .collect(&target(), 100, &mut SeenAds::default())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::PageCeiling);
    assert_eq!(outcome.pages, 2);
    let requested = h.provider.requested();
    assert!(requested[0].ends_with("&page=1"));
    assert!(requested[1].ends_with("&page=2"));
}

#[tokio::test]
async fn ads_seen_in_an_earlier_target_are_duplicates() {
    let h = harness(
        vec![
            Ok(vec![listing("a1", 2400.0)]),
            Ok(Vec::new()),
            Ok(Vec::new()),
            Ok(vec![listing("a1", 2400.0), listing("a9", 2100.0)]),
        ],
        MAX_PAGES,
    );
    let mut seen = SeenAds::default();

    let first = h.collector.collect(&target(), 20, &mut seen).await.unwrap();
    let second = h.collector.collect(&target(), 20, &mut seen).await.unwrap();

    assert_eq!(first.stats.collected, 1);
    assert_eq!(second.stats.collected, 1);
    assert_eq!(second.stats.duplicates, 1);
    assert_eq!(seen.len(), 2);
}

#[tokio::test]
async fn stored_record_takes_identity_from_target() {
    let mut raw = listing("a1", 2400.0);
    raw.title = "YT Capra 2019 Core 2".to_owned();
    let h = harness(vec![Ok(vec![raw])], MAX_PAGES);

    h.collector
        .collect(&target(), 1, &mut SeenAds::default())
        .await
        .unwrap();

    let rows = h.store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].year, Some(2021));
    assert_eq!(rows[0].source_platform, "buycycle");
    assert_eq!(rows[0].brand, "YT");
    assert_eq!(rows[0].currency, "EUR");
}

#[tokio::test]
async fn missing_url_fails_the_target() {
    let h = harness(Vec::new(), MAX_PAGES);
    let mut t = target();
    t.url = "  ".to_owned();

    let err = h
        .collector
        .collect(&t, 20, &mut SeenAds::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CollectError::MissingUrl { year: 2021, .. }));
}

#[test]
fn decide_prefers_limit_over_other_stops() {
    let tally = PageTally {
        valid: 2,
        duplicates: 2,
    };
    assert_eq!(
        decide(1, MAX_PAGES, 0, tally, 5, 5),
        Decision::Stop(StopReason::LimitReached)
    );
    assert_eq!(
        decide(1, MAX_PAGES, 0, tally, 0, 5),
        Decision::Stop(StopReason::AllDuplicates)
    );
    assert_eq!(
        decide(1, MAX_PAGES, 0, PageTally::default(), 0, 5),
        Decision::NextPage
    );
    assert_eq!(
        decide(MAX_PAGES, MAX_PAGES, 0, PageTally::default(), 0, 5),
        Decision::Stop(StopReason::PageCeiling)
    );
}

#[test]
fn price_threshold_is_inclusive() {
    assert!(is_valid_listing(&listing("a", MIN_LISTING_PRICE_EUR)));
    assert!(!is_valid_listing(&listing("a", 99.99)));
}
