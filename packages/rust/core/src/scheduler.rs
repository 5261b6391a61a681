//! Long-running scheduler loop.
//!
//! Wraps repeated rounds of {analyze → plan → fill} under an overall
//! wall-clock deadline. Each round recomputes the gap report against the
//! now-updated store, so later rounds naturally see reduced deficits, and
//! shuffles work-item order with a seedable RNG so low-priority buckets are
//! not starved when the deadline lands mid-round.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, instrument};

use quizsmith_coverage::planner::{PlanFilter, WorkItem, plan};
use quizsmith_coverage::{CoverageModel, gaps};
use quizsmith_genclient::GenerationClient;
use quizsmith_shared::Result;
use quizsmith_storage::ContentStore;

use crate::pipeline::{FillContext, FillOptions, FillStats, ProgressReporter, run_fill};

/// Configuration for a scheduler run.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Overall wall-clock budget for the run.
    pub max_runtime: Duration,
    /// Per-bucket request cap for each round's plan.
    pub per_run_cap: u32,
    /// Optional catalog constraints applied to every round.
    pub filter: PlanFilter,
    /// Per-item options (delay, dry-run, calibration).
    pub fill: FillOptions,
    /// Base seed for the per-round shuffle. `None` draws a fresh seed, which
    /// is logged so a run can be replayed.
    pub shuffle_seed: Option<u64>,
}

/// Aggregate result of a scheduler run.
#[derive(Debug, Clone, Default)]
pub struct SchedulerOutcome {
    /// Rounds that executed at least one plan.
    pub rounds: usize,
    /// Counters summed over all rounds.
    pub stats: FillStats,
    /// True when the loop stopped because the catalog reached its targets.
    pub coverage_complete: bool,
}

/// Shuffle a round's work list with a deterministic per-seed order.
pub fn shuffle_work(work: &mut [WorkItem], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    work.shuffle(&mut rng);
}

/// Run rounds until the deadline, a shutdown signal, or full coverage.
///
/// Cancellation is cooperative: the deadline and the shutdown flag are
/// checked before each round and before each item within a round; in-flight
/// work always finishes.
#[instrument(skip_all, fields(max_runtime_secs = config.max_runtime.as_secs()))]
pub async fn run_scheduler(
    model: &CoverageModel,
    client: &GenerationClient,
    store: &dyn ContentStore,
    config: &SchedulerConfig,
    shutdown: watch::Receiver<bool>,
    progress: &dyn ProgressReporter,
) -> Result<SchedulerOutcome> {
    let deadline = Instant::now() + config.max_runtime;
    let base_seed = config
        .shuffle_seed
        .unwrap_or_else(|| rand::rng().random());
    info!(base_seed, "scheduler starting");

    let mut outcome = SchedulerOutcome::default();
    let ctx = FillContext {
        client,
        store,
        model,
    };

    loop {
        if Instant::now() >= deadline {
            info!("deadline reached, stopping");
            break;
        }
        if *shutdown.borrow() {
            info!("shutdown requested, stopping");
            break;
        }

        progress.phase(&format!("Round {}: analyzing coverage", outcome.rounds + 1));
        let report = gaps::analyze(model, store).await?;
        if report.is_empty() {
            info!("catalog fully covered, stopping");
            outcome.coverage_complete = true;
            break;
        }

        let mut work = plan(&report, &config.filter, config.per_run_cap, None);
        if work.is_empty() {
            // Gaps exist but the filter excludes them all.
            info!("no work under the configured filter, stopping");
            outcome.coverage_complete = true;
            break;
        }

        // Distinct order each round, reproducible from the base seed.
        let round_seed = base_seed.wrapping_add(outcome.rounds as u64);
        shuffle_work(&mut work, round_seed);

        outcome.rounds += 1;
        info!(
            round = outcome.rounds,
            work_items = work.len(),
            total_deficit = report.total_deficit(),
            "starting round"
        );

        let stats = run_fill(
            &ctx,
            &work,
            &config.fill,
            Some(deadline),
            Some(&shutdown),
            progress,
        )
        .await;
        outcome.stats.absorb(&stats);
    }

    progress.summary(&outcome.stats);
    info!(
        rounds = outcome.rounds,
        succeeded = outcome.stats.succeeded,
        failed = outcome.stats.failed,
        coverage_complete = outcome.coverage_complete,
        "scheduler finished"
    );

    Ok(outcome)
}
