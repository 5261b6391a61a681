//! CLI command definitions, routing, and tracing setup.

use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use quizsmith_core::pipeline::{
    FillContext, FillOptions, FillStats, ItemOutcome, ProgressReporter, run_fill, run_remote,
};
use quizsmith_core::scheduler::{SchedulerConfig, run_scheduler};
use quizsmith_coverage::planner::{PlanFilter, plan};
use quizsmith_coverage::{CoverageModel, gaps};
use quizsmith_genclient::{ClientConfig, GenerationClient};
use quizsmith_jobs::{JobClient, JobClientConfig, PollConfig};
use quizsmith_shared::{
    AppConfig, CoverageKey, Difficulty, ItemId, QuestionType, init_config, load_config,
    resolve_api_key, resolve_db_path,
};
use quizsmith_storage::{ContentStore, LibsqlStore};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Quizsmith — keep the question catalog covered.
#[derive(Parser)]
#[command(
    name = "quizsmith",
    version,
    about = "Coverage-driven question generation for the tutoring platform.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show the current coverage gap report.
    Gaps {
        /// Restrict to one skill node.
        #[arg(long)]
        skill: Option<String>,

        /// Restrict to one difficulty (1-5).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        difficulty: Option<u8>,

        /// Restrict to one question type (e.g., multiple_choice).
        #[arg(long = "type")]
        question_type: Option<String>,

        /// Restrict to one language code.
        #[arg(long)]
        language: Option<String>,

        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run one planning and fill round against the generation backend.
    Fill {
        /// Restrict to one skill node.
        #[arg(long)]
        skill: Option<String>,

        /// Restrict to one difficulty (1-5).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        difficulty: Option<u8>,

        /// Restrict to one question type (e.g., multiple_choice).
        #[arg(long = "type")]
        question_type: Option<String>,

        /// Restrict to one language code.
        #[arg(long)]
        language: Option<String>,

        /// Bound the total items requested this run.
        #[arg(long)]
        count: Option<u32>,

        /// Generate and validate but skip persistence.
        #[arg(long)]
        dry_run: bool,

        /// Cross-check accepted items with a calibration scoring call.
        #[arg(long)]
        calibrate: bool,

        /// Submit work as backend jobs and poll them instead of generating
        /// inline.
        #[arg(long)]
        remote: bool,
    },

    /// Run the long-running fill loop until a wall-clock deadline.
    Run {
        /// Overall runtime budget, in minutes.
        #[arg(long)]
        minutes: u64,

        /// Seed for the round-fairness shuffle (a fresh one is drawn and
        /// logged when omitted).
        #[arg(long)]
        seed: Option<u64>,

        /// Generate and validate but skip persistence.
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-score a stored item's difficulty (report only).
    Calibrate {
        /// Content item id.
        #[arg(long)]
        item: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "quizsmith=info",
        1 => "quizsmith=debug",
        _ => "quizsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Gaps {
            skill,
            difficulty,
            question_type,
            language,
            json,
        } => {
            let filter = build_filter(skill, difficulty, question_type, language)?;
            cmd_gaps(&filter, json).await
        }
        Command::Fill {
            skill,
            difficulty,
            question_type,
            language,
            count,
            dry_run,
            calibrate,
            remote,
        } => {
            let filter = build_filter(skill, difficulty, question_type, language)?;
            cmd_fill(&filter, count, dry_run, calibrate, remote).await
        }
        Command::Run {
            minutes,
            seed,
            dry_run,
        } => cmd_run(minutes, seed, dry_run).await,
        Command::Calibrate { item } => cmd_calibrate(&item).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Build a plan filter from CLI flags.
fn build_filter(
    skill: Option<String>,
    difficulty: Option<u8>,
    question_type: Option<String>,
    language: Option<String>,
) -> Result<PlanFilter> {
    let question_type = question_type
        .map(|raw| {
            raw.parse::<QuestionType>()
                .map_err(|e| eyre!("--type: {e}"))
        })
        .transpose()?;

    Ok(PlanFilter {
        skill_node: skill,
        difficulty: difficulty.map(|d| Difficulty::clamp(i64::from(d))),
        question_type,
        language,
    })
}

/// Open the configured content store.
async fn open_store(config: &AppConfig) -> Result<LibsqlStore> {
    let db_path = resolve_db_path(config)?;
    Ok(LibsqlStore::open(&db_path).await?)
}

/// Build the generation client from config + environment.
fn build_gen_client(config: &AppConfig) -> Result<GenerationClient> {
    let api_key = resolve_api_key(config)?;
    Ok(GenerationClient::new(ClientConfig {
        base_url: config.backend.base_url.clone(),
        api_key,
        model_id: config.backend.default_model.clone(),
        max_output_tokens: config.backend.max_output_tokens,
        generation_temperature: config.backend.generation_temperature,
        calibration_temperature: config.backend.calibration_temperature,
    })?)
}

// ---------------------------------------------------------------------------
// gaps
// ---------------------------------------------------------------------------

async fn cmd_gaps(filter: &PlanFilter, json: bool) -> Result<()> {
    let config = load_config()?;
    let model = CoverageModel::new(&config.catalog)?;
    let store = open_store(&config).await?;

    let report = gaps::analyze(&model, &store).await?;
    let entries: Vec<_> = report
        .entries
        .iter()
        .filter(|e| filter.matches(&e.key))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("All matching buckets are at target. Nothing to fill.");
        return Ok(());
    }

    println!();
    println!("  {:<55} {:>9} {:>8} {:>9}", "BUCKET", "HAVE/WANT", "DEFICIT", "PRIORITY");
    for entry in &entries {
        println!(
            "  {:<55} {:>5}/{:<3} {:>8} {:>9}",
            entry.key.to_string(),
            entry.current,
            entry.target,
            entry.deficit,
            entry.priority,
        );
    }
    println!();
    println!(
        "  {} under-covered buckets, total deficit {}",
        entries.len(),
        entries.iter().map(|e| u64::from(e.deficit)).sum::<u64>(),
    );
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// fill
// ---------------------------------------------------------------------------

async fn cmd_fill(
    filter: &PlanFilter,
    count: Option<u32>,
    dry_run: bool,
    calibrate: bool,
    remote: bool,
) -> Result<()> {
    let config = load_config()?;
    // Validate the credential before doing anything.
    let api_key = resolve_api_key(&config)?;
    let model = CoverageModel::new(&config.catalog)?;
    let store = open_store(&config).await?;

    let report = gaps::analyze(&model, &store).await?;
    let work = plan(&report, filter, config.defaults.per_run_cap, count);

    if work.is_empty() {
        println!("All matching buckets are at target. Nothing to fill.");
        return Ok(());
    }

    info!(
        work_items = work.len(),
        dry_run,
        remote,
        "starting fill round"
    );

    let reporter = CliProgress::new();
    let stats = if remote {
        let client = JobClient::new(JobClientConfig {
            base_url: config.backend.base_url.clone(),
            api_key,
        })?;
        let poll = PollConfig {
            interval: Duration::from_millis(config.jobs.poll_interval_ms),
            timeout: Duration::from_secs(config.jobs.timeout_secs),
        };
        run_remote(&client, &work, &poll, None, &reporter).await
    } else {
        let client = build_gen_client(&config)?;
        let ctx = FillContext {
            client: &client,
            store: &store,
            model: &model,
        };
        let options = FillOptions {
            item_delay: Duration::from_millis(config.defaults.item_delay_ms),
            dry_run,
            calibrate,
        };
        run_fill(&ctx, &work, &options, None, None, &reporter).await
    };

    print_summary(&stats, dry_run);
    Ok(())
}

// ---------------------------------------------------------------------------
// run (scheduler loop)
// ---------------------------------------------------------------------------

async fn cmd_run(minutes: u64, seed: Option<u64>, dry_run: bool) -> Result<()> {
    let config = load_config()?;
    let _ = resolve_api_key(&config)?;
    let model = CoverageModel::new(&config.catalog)?;
    let store = open_store(&config).await?;
    let client = build_gen_client(&config)?;

    let scheduler_config = SchedulerConfig {
        max_runtime: Duration::from_secs(minutes * 60),
        per_run_cap: config.defaults.per_run_cap,
        filter: PlanFilter::default(),
        fill: FillOptions {
            item_delay: Duration::from_millis(config.defaults.item_delay_ms),
            dry_run,
            calibrate: false,
        },
        shuffle_seed: seed,
    };

    // Ctrl-C flips the shutdown flag; the in-flight item finishes first.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    info!(minutes, dry_run, "starting scheduler loop");

    let reporter = CliProgress::new();
    let outcome = run_scheduler(
        &model,
        &client,
        &store,
        &scheduler_config,
        shutdown_rx,
        &reporter,
    )
    .await?;

    println!();
    println!("  Scheduler finished.");
    println!("  Rounds:   {}", outcome.rounds);
    if outcome.coverage_complete {
        println!("  Catalog reached its coverage targets.");
    }
    print_summary(&outcome.stats, dry_run);
    Ok(())
}

// ---------------------------------------------------------------------------
// calibrate
// ---------------------------------------------------------------------------

async fn cmd_calibrate(item: &str) -> Result<()> {
    let config = load_config()?;
    let _ = resolve_api_key(&config)?;
    let store = open_store(&config).await?;
    let client = build_gen_client(&config)?;

    let id: ItemId = item.parse().map_err(|e| eyre!("invalid item id '{item}': {e}"))?;
    let stored = store
        .get_item(&id)
        .await?
        .ok_or_else(|| eyre!("no content item with id {id}"))?;

    let scored = client.score_difficulty(&stored.prompt).await?;

    println!();
    println!("  Item:    {id}");
    println!("  Bucket:  {}", stored.key);
    println!("  Stored difficulty: {}", stored.key.difficulty);
    println!("  Scored difficulty: {scored}");
    if scored == stored.key.difficulty {
        println!("  Calibration agrees with the stored bucket.");
    } else {
        println!("  Calibration disagrees; consider regenerating this bucket.");
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner, with one printed line
/// per finished item.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item_started(&self, current: usize, total: usize, key: &CoverageKey) {
        self.spinner
            .set_message(format!("Generating [{current}/{total}] {key}"));
    }

    fn item_finished(
        &self,
        current: usize,
        total: usize,
        key: &CoverageKey,
        outcome: &ItemOutcome,
    ) {
        let line = match outcome {
            ItemOutcome::Persisted(id) => {
                format!("  ✓ [{current}/{total}] {key} → {id}")
            }
            ItemOutcome::Validated => {
                format!("  · [{current}/{total}] {key} (dry run, not persisted)")
            }
            ItemOutcome::Failed(reason) => {
                format!("  ✗ [{current}/{total}] {key}: {reason}")
            }
        };
        self.spinner.println(line);
    }

    fn summary(&self, _stats: &FillStats) {
        self.spinner.finish_and_clear();
    }
}

/// Print the end-of-run summary block.
fn print_summary(stats: &FillStats, dry_run: bool) {
    println!();
    if dry_run {
        println!("  Dry run — nothing was persisted.");
    }
    println!("  Attempted: {}", stats.attempted);
    println!("  Succeeded: {}", stats.succeeded);
    println!("  Failed:    {}", stats.failed);
    if stats.skipped > 0 {
        println!("  Skipped:   {} (deadline/shutdown)", stats.skipped);
    }
    println!(
        "  Success:   {:.0}%",
        stats.success_rate() * 100.0
    );
    println!("  Time:      {:.1}s", stats.elapsed.as_secs_f64());
    println!();
}
