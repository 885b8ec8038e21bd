//! Cadence: scheduled activity reconciliation
//!
//! Main binary with subcommands:
//! - `plan`: Diff scheduled activities against persisted ones and print the result
//! - `sync`: Run a full reconcile-and-write cycle against a file-backed store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cadence_executor::{BackoffConfig, ExecutorConfig, RetryExecutor, RetryOutcome};
use cadence_schedule::{
    ActivityStore, MemoryActivityStore, ScheduleContext, ScheduleService, ScheduledActivity,
    StaticScheduler, reconcile,
};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Scheduled activity reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the saves, deletes and results of reconciling two activity files
    Plan {
        /// JSON array of freshly scheduled activities
        #[arg(long)]
        scheduled: PathBuf,

        /// JSON array of persisted activities
        #[arg(long)]
        persisted: PathBuf,
    },

    /// Reconcile one participant and apply the writes through the retrying executor
    Sync {
        /// Participant health code
        #[arg(long, env = "CADENCE_PARTICIPANT")]
        participant: String,

        /// JSON array of freshly scheduled activities
        #[arg(long)]
        scheduled: PathBuf,

        /// JSON array of persisted activities
        #[arg(long)]
        persisted: PathBuf,

        /// Write the participant's final persisted state back to the persisted file
        #[arg(long)]
        write: bool,

        /// Worker pool size
        #[arg(long, env = "CADENCE_WORKER_THREADS", default_value = "4")]
        worker_threads: usize,

        /// Retries allowed after the first failed write
        #[arg(long, env = "CADENCE_MAX_ATTEMPTS", default_value = "3")]
        max_attempts: u32,

        /// Delay strategy between retries
        #[arg(long, env = "CADENCE_BACKOFF", value_enum, default_value = "linear")]
        backoff: BackoffKind,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackoffKind {
    /// 100ms per failed attempt
    Linear,
    /// Doubling from 100ms, capped at 30s
    Exponential,
    /// Flat ~200ms, as the replaced service behaved
    Legacy,
}

impl From<BackoffKind> for BackoffConfig {
    fn from(kind: BackoffKind) -> Self {
        match kind {
            BackoffKind::Linear => BackoffConfig::default(),
            BackoffKind::Exponential => BackoffConfig::Exponential {
                base_ms: 100,
                max_ms: 30_000,
            },
            BackoffKind::Legacy => BackoffConfig::Legacy,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cadence=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            scheduled,
            persisted,
        } => {
            let scheduled = load_activities(&scheduled)?;
            let persisted = load_activities(&persisted)?;
            let plan = reconcile(&scheduled, &persisted);
            print_json(&plan)?;
        }
        Commands::Sync {
            participant,
            scheduled,
            persisted,
            write,
            worker_threads,
            max_attempts,
            backoff,
        } => {
            let config = ExecutorConfig {
                worker_threads,
                max_attempts,
                backoff: backoff.into(),
            };
            let runtime = config.build_runtime().into_diagnostic()?;
            runtime.block_on(run_sync(&participant, &scheduled, &persisted, write, &config))?;
        }
    }

    Ok(())
}

async fn run_sync(
    participant: &str,
    scheduled_path: &Path,
    persisted_path: &Path,
    write: bool,
    config: &ExecutorConfig,
) -> Result<()> {
    let scheduled = load_activities(scheduled_path)?;
    let store = Arc::new(MemoryActivityStore::new());
    store.seed(load_activities(persisted_path)?);

    let executor = RetryExecutor::new(tokio::runtime::Handle::current())
        .with_shared_backoff(config.backoff.strategy());
    let service = ScheduleService::new(
        Arc::new(StaticScheduler::new(scheduled)),
        store.clone(),
        executor,
        config.max_attempts,
    );

    let context = ScheduleContext::new(participant, chrono::Utc::now());
    let view = service
        .get_scheduled_activities(&context)
        .await
        .into_diagnostic()?;

    let mut failed = 0;
    for handle in view.writes {
        let id = handle.id();
        match handle.outcome().await {
            RetryOutcome::Succeeded { attempts } => {
                tracing::info!(task_id = id, attempts, "write applied");
            }
            outcome => {
                tracing::error!(task_id = id, ?outcome, "write did not complete");
                failed += 1;
            }
        }
    }

    print_json(&view.activities)?;

    if failed > 0 {
        return Err(miette::miette!("{} write batch(es) did not complete", failed));
    }

    if write {
        let stored = store.all();
        save_activities(persisted_path, &stored)?;
        tracing::info!(
            path = %persisted_path.display(),
            count = stored.len(),
            "wrote persisted activities"
        );
    }

    Ok(())
}

/// Read a JSON array of activities.
fn load_activities(path: &Path) -> Result<Vec<ScheduledActivity>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| miette::miette!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| miette::miette!("failed to parse {}: {}", path.display(), e))
}

fn save_activities(path: &Path, activities: &[ScheduledActivity]) -> Result<()> {
    let json = serde_json::to_string_pretty(activities).into_diagnostic()?;
    std::fs::write(path, json)
        .map_err(|e| miette::miette!("failed to write {}: {}", path.display(), e))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}
