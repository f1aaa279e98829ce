//! Shared domain types, configuration, and storage contracts for bikefmv.

pub mod app_config;
pub mod config;
pub mod error;
pub mod events;
pub mod matcher;
pub mod plan;
pub mod records;
pub mod source;
pub mod store;
pub mod whitelist;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, CoreError};
pub use events::{CollectionEvent, EventSink, StopReason, TracingSink};
pub use matcher::build_model_patterns;
pub use plan::{CollectionPlan, JsonPlanFile, PlanError, PlanRecorder, PlanTask, TaskStatus};
pub use records::{CollectionStats, CollectionTarget, MarketRecord, NewMarketRecord};
pub use source::Source;
pub use store::{MarketStats, MarketStore, StoreError};
pub use whitelist::{load_whitelist, WhitelistEntry, WhitelistFile};
