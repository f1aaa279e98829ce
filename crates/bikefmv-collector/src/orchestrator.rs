//! Runs a collection plan target by target.
//!
//! Every finished task is written back into the plan and handed to the
//! [`PlanRecorder`] before the next one starts, so an interrupted run can be
//! resumed from its plan. With `max_concurrent_sources > 1` the runnable
//! tasks are split into one lane per source; lanes run concurrently and each
//! lane stays sequential.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bikefmv_core::{
    AppConfig, CollectionEvent, CollectionPlan, CollectionStats, EventSink, PlanRecorder, Source,
    StopReason,
};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use crate::collector::{CancelFlag, PaginatedCollector, SeenAds};

const DEFAULT_TARGET_DELAY_MS: u64 = 2500;

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Cooldown between two targets in the same lane.
    pub target_delay: Duration,
    pub max_concurrent_sources: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            target_delay: Duration::from_millis(DEFAULT_TARGET_DELAY_MS),
            max_concurrent_sources: 1,
        }
    }
}

impl OrchestratorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            target_delay: Duration::from_millis(config.target_delay_ms),
            max_concurrent_sources: config.max_concurrent_sources.max(1),
        }
    }
}

/// Totals and breakdowns for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub totals: CollectionStats,
    pub by_source: BTreeMap<Source, CollectionStats>,
    /// Keyed by `"<brand> <model>"`.
    pub by_model: BTreeMap<String, CollectionStats>,
    /// Tasks that reached `completed` or `failed` in this run.
    pub processed: usize,
    /// Tasks already completed before the run started.
    pub skipped: usize,
    /// Failed tasks moved back to pending at the start of the run.
    pub requeued: usize,
    /// Tasks left `failed` at the end of the run.
    pub failed_tasks: usize,
    pub cancelled: bool,
}

impl RunSummary {
    fn record(&mut self, source: Source, model_key: String, stats: &CollectionStats) {
        self.totals.merge(stats);
        self.by_source.entry(source).or_default().merge(stats);
        self.by_model.entry(model_key).or_default().merge(stats);
    }

    fn absorb(&mut self, lane: RunSummary) {
        self.totals.merge(&lane.totals);
        for (source, stats) in lane.by_source {
            self.by_source.entry(source).or_default().merge(&stats);
        }
        for (model, stats) in lane.by_model {
            self.by_model.entry(model).or_default().merge(&stats);
        }
        self.processed += lane.processed;
        self.cancelled |= lane.cancelled;
    }
}

pub struct Orchestrator {
    collector: PaginatedCollector,
    recorder: Arc<dyn PlanRecorder>,
    events: Arc<dyn EventSink>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        collector: PaginatedCollector,
        recorder: Arc<dyn PlanRecorder>,
        events: Arc<dyn EventSink>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            collector,
            recorder,
            events,
            settings,
        }
    }

    fn cancel(&self) -> &CancelFlag {
        self.collector.cancel_flag()
    }

    /// Runs every pending task of `plan` (after requeueing failed ones) and
    /// returns the updated plan with a summary.
    ///
    /// Target failures are recorded in the plan and never abort the run.
    pub async fn run(&self, mut plan: CollectionPlan) -> (CollectionPlan, RunSummary) {
        let requeued = plan.requeue_failed();
        let runnable = plan.runnable_indices();
        let skipped = plan.tasks.len() - runnable.len();
        tracing::info!(
            total = plan.tasks.len(),
            runnable = runnable.len(),
            skipped,
            requeued,
            lanes = self.settings.max_concurrent_sources,
            "collection run starting"
        );

        let lanes = partition_lanes(&plan, runnable, self.settings.max_concurrent_sources);
        let shared = Mutex::new(plan);

        let lane_summaries: Vec<RunSummary> = stream::iter(lanes)
            .map(|lane| self.run_lane(lane, &shared))
            .buffer_unordered(self.settings.max_concurrent_sources.max(1))
            .collect()
            .await;

        let plan = shared.into_inner();
        let mut summary = RunSummary {
            skipped,
            requeued,
            ..RunSummary::default()
        };
        for lane in lane_summaries {
            summary.absorb(lane);
        }
        summary.failed_tasks = plan.failed_tasks();

        tracing::info!(
            collected = summary.totals.collected,
            duplicates = summary.totals.duplicates,
            errors = summary.totals.errors,
            processed = summary.processed,
            failed_tasks = summary.failed_tasks,
            cancelled = summary.cancelled,
            "collection run finished"
        );
        (plan, summary)
    }

    async fn run_lane(&self, indices: Vec<usize>, plan: &Mutex<CollectionPlan>) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut seen = SeenAds::default();

        for (n, index) in indices.into_iter().enumerate() {
            if n > 0 && !self.settings.target_delay.is_zero() {
                tokio::time::sleep(self.settings.target_delay).await;
            }
            if self.cancel().is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let (target, limit, model_key) = {
                let plan = plan.lock().await;
                let task = &plan.tasks[index];
                (task.target(), task.records_target, task.model_key())
            };

            let started = Instant::now();
            let result = self.collector.collect(&target, limit, &mut seen).await;

            let mut plan = plan.lock().await;
            let transition = match result {
                Ok(outcome) => {
                    summary.record(target.source, model_key, &outcome.stats);
                    if outcome.stop == StopReason::Cancelled {
                        // Partial target stays pending for the next resume.
                        summary.cancelled = true;
                        break;
                    }
                    summary.processed += 1;
                    self.events.emit(CollectionEvent::TargetFinished {
                        source: target.source,
                        brand: target.brand.clone(),
                        model: target.model.clone(),
                        year: target.year,
                        stats: outcome.stats,
                        elapsed: started.elapsed(),
                    });
                    plan.mark_completed(index, outcome.stats)
                }
                Err(e) => {
                    summary.processed += 1;
                    self.events.emit(CollectionEvent::TargetFailed {
                        source: target.source,
                        brand: target.brand.clone(),
                        model: target.model.clone(),
                        year: target.year,
                        error: e.to_string(),
                    });
                    plan.mark_failed(index, e.to_string())
                }
            };

            if let Err(e) = transition {
                tracing::error!(index, error = %e, "plan task transition rejected");
                continue;
            }
            if let Err(e) = self.recorder.record_task(&plan, index).await {
                tracing::warn!(index, error = %e, "failed to persist plan progress");
            }
        }
        summary
    }
}

/// Splits runnable task indices into lanes. One lane in plan order when
/// `max_concurrent_sources <= 1`; otherwise one lane per source, each in plan
/// order.
fn partition_lanes(
    plan: &CollectionPlan,
    runnable: Vec<usize>,
    max_concurrent_sources: usize,
) -> Vec<Vec<usize>> {
    if runnable.is_empty() {
        return Vec::new();
    }
    if max_concurrent_sources <= 1 {
        return vec![runnable];
    }
    let mut by_source: BTreeMap<Source, Vec<usize>> = BTreeMap::new();
    for index in runnable {
        by_source
            .entry(plan.tasks[index].source)
            .or_default()
            .push(index);
    }
    by_source.into_values().collect()
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
