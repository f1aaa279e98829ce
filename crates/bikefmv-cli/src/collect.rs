//! `collect` subcommands.
//!
//! Plans are generated from the whitelist and either written to a JSON file
//! (`collect plan`) or stored in Postgres when a run starts without `--plan`.
//! Target failures are recorded on the plan and never abort the run.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Subcommand;
use uuid::Uuid;

use bikefmv_collector::{
    plan_targets, CancelFlag, CollectorSettings, HttpListingProvider, Orchestrator,
    OrchestratorSettings, PaginatedCollector, RunSummary,
};
use bikefmv_core::{
    load_whitelist, AppConfig, CollectionPlan, EventSink, JsonPlanFile, PlanRecorder, Source,
    TracingSink,
};
use bikefmv_db::PgPlanStore;

use crate::connect_store;

/// Inclusive model-year range, written `2015..2025`, `2015-2025` or `2021`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

pub(crate) fn parse_year_range(value: &str) -> Result<YearRange, String> {
    let value = value.trim();
    let (start, end) = match value.split_once("..") {
        Some((start, end)) => (start, end.trim_start_matches('=')),
        None => value.split_once('-').unwrap_or((value, value)),
    };
    let year = |s: &str| {
        s.trim()
            .parse::<i32>()
            .map_err(|_| format!("invalid year `{}` in `{value}`", s.trim()))
    };
    let range = YearRange {
        start: year(start)?,
        end: year(end)?,
    };
    if range.start > range.end {
        return Err(format!("year range `{value}` starts after it ends"));
    }
    Ok(range)
}

/// Sub-commands available under `collect`.
#[derive(Debug, Subcommand)]
pub enum CollectCommands {
    /// Generate a collection plan from the whitelist and write it to a file
    Plan {
        /// Model years to cover, e.g. 2015..2025
        #[arg(long, value_parser = parse_year_range)]
        years: YearRange,

        /// Restrict to these sources (repeatable); all sources by default
        #[arg(long = "source")]
        sources: Vec<Source>,

        /// Records to collect per target
        #[arg(long)]
        limit: Option<u32>,

        /// Output path for the plan JSON
        #[arg(long)]
        out: PathBuf,
    },
    /// Run a collection plan
    Run {
        /// Run (and update) a plan file written by `collect plan`
        #[arg(long, conflicts_with = "resume_plan")]
        plan: Option<PathBuf>,

        /// Resume a plan stored in the database by its id
        #[arg(long)]
        resume_plan: Option<Uuid>,

        /// Model years for a fresh plan, e.g. 2015..2025
        #[arg(long, value_parser = parse_year_range)]
        years: Option<YearRange>,

        /// Restrict a fresh plan to these sources (repeatable)
        #[arg(long = "source")]
        sources: Vec<Source>,

        /// Records to collect per target for a fresh plan
        #[arg(long)]
        limit: Option<u32>,

        /// Show what would run without fetching or writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

pub(crate) async fn run(config: &AppConfig, command: CollectCommands) -> anyhow::Result<()> {
    match command {
        CollectCommands::Plan {
            years,
            sources,
            limit,
            out,
        } => {
            let plan = build_plan(config, years, &sources, limit)?;
            JsonPlanFile::new(&out).save(&plan).await?;
            println!(
                "wrote plan with {} tasks to {}",
                plan.total_tasks,
                out.display()
            );
            Ok(())
        }
        CollectCommands::Run {
            plan,
            resume_plan,
            years,
            sources,
            limit,
            dry_run,
        } => {
            run_collection(
                config,
                RunRequest {
                    plan_path: plan,
                    resume_plan,
                    years,
                    sources,
                    limit,
                    dry_run,
                },
            )
            .await
        }
    }
}

struct RunRequest {
    plan_path: Option<PathBuf>,
    resume_plan: Option<Uuid>,
    years: Option<YearRange>,
    sources: Vec<Source>,
    limit: Option<u32>,
    dry_run: bool,
}

fn build_plan(
    config: &AppConfig,
    years: YearRange,
    sources: &[Source],
    limit: Option<u32>,
) -> anyhow::Result<CollectionPlan> {
    let whitelist = load_whitelist(&config.whitelist_path).with_context(|| {
        format!(
            "failed to load whitelist from {}",
            config.whitelist_path.display()
        )
    })?;
    let sources = if sources.is_empty() {
        Source::ALL.to_vec()
    } else {
        sources.to_vec()
    };
    let targets = plan_targets(&whitelist.entries(), years.start, years.end, &sources)?;
    Ok(CollectionPlan::from_targets(
        targets,
        limit.unwrap_or(config.records_per_target),
    ))
}

async fn run_collection(config: &AppConfig, request: RunRequest) -> anyhow::Result<()> {
    // Dry runs only touch the database to read a stored plan.
    let store = if request.dry_run && request.resume_plan.is_none() {
        None
    } else {
        Some(connect_store(config).await?)
    };

    let (plan, recorder): (CollectionPlan, Option<Arc<dyn PlanRecorder>>) =
        if let Some(path) = request.plan_path {
            let file = JsonPlanFile::new(path);
            let plan = file
                .load()
                .await
                .with_context(|| format!("failed to read plan {}", file.path().display()))?;
            let recorder: Arc<dyn PlanRecorder> = Arc::new(file);
            (plan, Some(recorder))
        } else if let Some(id) = request.resume_plan {
            let pool = store
                .as_ref()
                .map(|s| s.pool().clone())
                .context("database connection required to resume a plan")?;
            let (stored, plan) = PgPlanStore::resume(pool, id).await?;
            println!("resuming plan {id}");
            let recorder: Arc<dyn PlanRecorder> = Arc::new(stored);
            (plan, Some(recorder))
        } else {
            let years = request.years.context(
                "--years is required unless --plan or --resume-plan is given",
            )?;
            (
                build_plan(config, years, &request.sources, request.limit)?,
                None,
            )
        };

    if request.dry_run {
        print!("{}", describe_plan(&plan));
        if let Some(store) = store {
            store.close().await;
        }
        return Ok(());
    }

    let store = match store {
        Some(store) => Arc::new(store),
        None => Arc::new(connect_store(config).await?),
    };
    let recorder: Arc<dyn PlanRecorder> = match recorder {
        Some(recorder) => recorder,
        None => {
            let stored = PgPlanStore::create(store.pool().clone(), &plan).await?;
            println!("created plan {}", stored.public_id());
            Arc::new(stored)
        }
    };

    let provider = Arc::new(HttpListingProvider::from_app_config(config)?);
    let events: Arc<dyn EventSink> = Arc::new(TracingSink);
    let cancel = CancelFlag::new();
    cancel_on_interrupt(cancel.clone());

    let collector = PaginatedCollector::new(
        provider,
        store.clone(),
        events.clone(),
        CollectorSettings::from_app_config(config),
        cancel,
    );
    let orchestrator = Orchestrator::new(
        collector,
        recorder,
        events,
        OrchestratorSettings::from_app_config(config),
    );

    let (plan, summary) = orchestrator.run(plan).await;
    print!("{}", format_summary(&summary));
    println!(
        "plan progress: {}/{} tasks completed",
        plan.completed_tasks, plan.total_tasks
    );
    if summary.cancelled {
        println!("run interrupted; resume the plan to continue");
    }

    store.close().await;
    Ok(())
}

fn cancel_on_interrupt(cancel: CancelFlag) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("interrupt received; stopping after the current page");
                cancel.cancel();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
        }
    });
}

/// What a run of `plan` would do, for `--dry-run`.
pub(crate) fn describe_plan(plan: &CollectionPlan) -> String {
    let mut plan = plan.clone();
    let requeued = plan.requeue_failed();
    let runnable = plan.runnable_indices();

    let mut per_source: BTreeMap<Source, usize> = BTreeMap::new();
    for &i in &runnable {
        *per_source.entry(plan.tasks[i].source).or_default() += 1;
    }

    let mut out = format!(
        "dry-run: would run {} of {} tasks ({} already completed, {requeued} failed requeued)\n",
        runnable.len(),
        plan.tasks.len(),
        plan.completed_tasks,
    );
    for (source, count) in per_source {
        let _ = writeln!(out, "  {source}: {count} targets");
    }
    out
}

pub(crate) fn format_summary(summary: &RunSummary) -> String {
    let t = summary.totals;
    let mut out = format!(
        "collected {} listings ({} duplicates, {} errors) over {} targets\n",
        t.collected, t.duplicates, t.errors, summary.processed
    );
    for (source, s) in &summary.by_source {
        let _ = writeln!(
            out,
            "  {source}: {} collected, {} duplicates, {} errors",
            s.collected, s.duplicates, s.errors
        );
    }
    for (model, s) in &summary.by_model {
        let _ = writeln!(out, "  {model}: {} collected", s.collected);
    }
    let _ = writeln!(
        out,
        "skipped {} completed, requeued {}, failed {}",
        summary.skipped, summary.requeued, summary.failed_tasks
    );
    out
}

#[cfg(test)]
#[path = "collect_test.rs"]
mod tests;
