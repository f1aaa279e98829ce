//! Market data collection: listing provider client, per-source pagination,
//! target planning and resumable run orchestration.

pub mod collector;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod provider;
pub(crate) mod rate_limit;
pub mod strategy;

pub use collector::{
    CancelFlag, CollectorSettings, PaginatedCollector, SeenAds, TargetOutcome, MAX_PAGES,
};
pub use error::{CollectError, PlannerError, ProviderError};
pub use orchestrator::{Orchestrator, OrchestratorSettings, RunSummary};
pub use planner::{plan_targets, search_url};
pub use provider::{HttpListingProvider, ListingProvider, RawListing};
pub use strategy::SourceStrategy;
