//! One fill round: per-item generate → validate → persist.
//!
//! Work items are processed strictly sequentially — one item's full sequence
//! completes (success or failure) before the next begins. This keeps
//! outbound call volume to the generation backend within its rate limits
//! without a separate limiter. All failures below configuration level are
//! isolated to the offending item and counted; the round always proceeds to
//! the next planned unit of work.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use quizsmith_coverage::CoverageModel;
use quizsmith_coverage::planner::WorkItem;
use quizsmith_genclient::GenerationClient;
use quizsmith_jobs::{JobClient, PollConfig, PollOutcome, poll_to_completion};
use quizsmith_shared::{CoverageKey, ItemId};
use quizsmith_storage::{ContentStore, persist_candidate};

// ---------------------------------------------------------------------------
// Options and stats
// ---------------------------------------------------------------------------

/// Options for one fill round.
#[derive(Debug, Clone)]
pub struct FillOptions {
    /// Fixed delay between consecutive items, respecting backend rate limits.
    pub item_delay: Duration,
    /// Generate and validate but skip persistence.
    pub dry_run: bool,
    /// Cross-check each accepted item's difficulty with a calibration
    /// scoring call; disagreements are logged, never fatal.
    pub calibrate: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_millis(1000),
            dry_run: false,
            calibrate: false,
        }
    }
}

/// Outcome of processing a single planned item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// Validated and written to the store.
    Persisted(ItemId),
    /// Validated; persistence skipped (dry run).
    Validated,
    /// Failed at any stage; the message names the stage's error.
    Failed(String),
}

/// Aggregate counters for a round (or a whole scheduler run).
#[derive(Debug, Clone, Default)]
pub struct FillStats {
    /// Items actually attempted.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Planned items never started because the deadline or a shutdown
    /// signal arrived first.
    pub skipped: usize,
    pub elapsed: Duration,
}

impl FillStats {
    /// Success rate over attempted items, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.attempted as f64
    }

    /// Fold another round's counters into this one.
    pub fn absorb(&mut self, other: &FillStats) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.elapsed += other.elapsed;
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before an item's generate → validate → persist sequence.
    fn item_started(&self, current: usize, total: usize, key: &CoverageKey);
    /// Called with the item's outcome.
    fn item_finished(&self, current: usize, total: usize, key: &CoverageKey, outcome: &ItemOutcome);
    /// Called with the end-of-round counters.
    fn summary(&self, stats: &FillStats);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item_started(&self, _current: usize, _total: usize, _key: &CoverageKey) {}
    fn item_finished(
        &self,
        _current: usize,
        _total: usize,
        _key: &CoverageKey,
        _outcome: &ItemOutcome,
    ) {
    }
    fn summary(&self, _stats: &FillStats) {}
}

// ---------------------------------------------------------------------------
// Inline fill
// ---------------------------------------------------------------------------

/// Shared collaborators for a fill round.
pub struct FillContext<'a> {
    pub client: &'a GenerationClient,
    pub store: &'a dyn ContentStore,
    pub model: &'a CoverageModel,
}

/// Whether the round should stop before starting another unit of work.
fn should_stop(deadline: Option<Instant>, shutdown: Option<&watch::Receiver<bool>>) -> bool {
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return true;
        }
    }
    if let Some(shutdown) = shutdown {
        if *shutdown.borrow() {
            return true;
        }
    }
    false
}

/// Run one fill round over a planned work list.
///
/// The deadline and shutdown flag are checked before each item; the item in
/// flight always finishes. Never returns an error — every failure is an item
/// failure recorded in the stats.
#[instrument(skip_all, fields(work_items = work.len()))]
pub async fn run_fill(
    ctx: &FillContext<'_>,
    work: &[WorkItem],
    options: &FillOptions,
    deadline: Option<Instant>,
    shutdown: Option<&watch::Receiver<bool>>,
    progress: &dyn ProgressReporter,
) -> FillStats {
    let start = Instant::now();
    let total: usize = work.iter().map(|w| w.requested as usize).sum();
    let mut stats = FillStats::default();
    let mut current = 0usize;

    'work: for work_item in work {
        let title = ctx
            .model
            .skill_title(&work_item.key.skill_node)
            .unwrap_or(&work_item.key.skill_node);

        for _ in 0..work_item.requested {
            if should_stop(deadline, shutdown) {
                info!(remaining = total - current, "stopping before next item");
                stats.skipped = total - current;
                break 'work;
            }

            current += 1;
            progress.item_started(current, total, &work_item.key);

            let outcome = process_item(ctx, &work_item.key, title, options).await;
            match &outcome {
                ItemOutcome::Persisted(_) | ItemOutcome::Validated => stats.succeeded += 1,
                ItemOutcome::Failed(reason) => {
                    warn!(key = %work_item.key, %reason, "item failed");
                    stats.failed += 1;
                }
            }
            stats.attempted += 1;
            progress.item_finished(current, total, &work_item.key, &outcome);

            if current < total && !options.item_delay.is_zero() {
                tokio::time::sleep(options.item_delay).await;
            }
        }
    }

    stats.elapsed = start.elapsed();
    progress.summary(&stats);

    info!(
        attempted = stats.attempted,
        succeeded = stats.succeeded,
        failed = stats.failed,
        skipped = stats.skipped,
        "fill round complete"
    );

    stats
}

/// One item's full sequence. Each stage failure becomes `ItemOutcome::Failed`.
async fn process_item(
    ctx: &FillContext<'_>,
    key: &CoverageKey,
    skill_title: &str,
    options: &FillOptions,
) -> ItemOutcome {
    let candidate = match ctx.client.generate_candidate(key, skill_title).await {
        Ok(candidate) => candidate,
        Err(e) => return ItemOutcome::Failed(e.to_string()),
    };

    let candidate = match quizsmith_validate::normalize(candidate, key) {
        Ok(candidate) => candidate,
        Err(e) => return ItemOutcome::Failed(e.to_string()),
    };

    if options.calibrate {
        // Advisory cross-check; a disagreement or scoring failure never
        // blocks the item.
        match ctx.client.score_difficulty(&candidate.prompt).await {
            Ok(scored) if scored != key.difficulty => {
                warn!(
                    key = %key,
                    scored = scored.value(),
                    "calibration disagrees with bucket difficulty"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "calibration scoring failed"),
        }
    }

    if options.dry_run {
        return ItemOutcome::Validated;
    }

    match persist_candidate(ctx.store, key.clone(), &candidate, ctx.client.model_id()).await {
        Ok(item) => ItemOutcome::Persisted(item.id),
        Err(e) => ItemOutcome::Failed(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Remote fill (async batch jobs)
// ---------------------------------------------------------------------------

/// Run a round by submitting each work item as a remote generation job and
/// polling it to completion.
///
/// A timed-out job counts every requested item as failed, even though some
/// may have completed remotely; the next gap-analysis pass reconciles
/// against actual store counts.
#[instrument(skip_all, fields(work_items = work.len()))]
pub async fn run_remote(
    client: &JobClient,
    work: &[WorkItem],
    poll: &PollConfig,
    deadline: Option<Instant>,
    progress: &dyn ProgressReporter,
) -> FillStats {
    let start = Instant::now();
    let total: usize = work.iter().map(|w| w.requested as usize).sum();
    let mut stats = FillStats::default();
    let mut current = 0usize;

    for work_item in work {
        if should_stop(deadline, None) {
            stats.skipped = total - current;
            break;
        }

        let requested = work_item.requested as usize;
        current += requested;
        progress.phase(&format!("Submitting job for {}", work_item.key));

        let job_id = match client.submit(&work_item.key, work_item.requested).await {
            Ok(job_id) => job_id,
            Err(e) => {
                warn!(key = %work_item.key, error = %e, "job submission failed");
                stats.attempted += requested;
                stats.failed += requested;
                continue;
            }
        };

        progress.phase(&format!("Polling job {job_id}"));
        stats.attempted += requested;

        match poll_to_completion(client, &job_id, poll, deadline).await {
            PollOutcome::Completed { completed, .. } => {
                let succeeded = (completed as usize).min(requested);
                stats.succeeded += succeeded;
                stats.failed += requested - succeeded;
            }
            PollOutcome::Failed { completed, .. } => {
                let succeeded = (completed as usize).min(requested);
                stats.succeeded += succeeded;
                stats.failed += requested - succeeded;
            }
            PollOutcome::TimedOut => {
                warn!(%job_id, "job timed out; counting all requested items as failed");
                stats.failed += requested;
            }
        }
    }

    stats.elapsed = start.elapsed();
    progress.summary(&stats);
    stats
}
