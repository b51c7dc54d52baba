//! assetflow - bulk operations over asset hierarchies.
//!
//! Usage:
//!   assetflow simulate --type move     Run a bulk operation against a simulated backend
//!   assetflow config                   Print the effective configuration
//!   assetflow --help                   Show help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use assetflow_cache::CacheMetrics;
use assetflow_core::{AssetId, OrchestratorConfig};
use assetflow_ops::{
    BulkOperationProgress, ClassifyOptions, DeleteOptions, ExportOptions, MoveOptions,
    OperationOptions, OperationReport, OperationType, Orchestrator, RenameOptions,
    SimulatedBackend, UndoError,
};
use assetflow_select::SelectionContext;

#[derive(Parser)]
#[command(
    name = "assetflow",
    version,
    about = "Bulk operation orchestration for asset hierarchies",
    long_about = "assetflow selects assets, submits bulk operations, tracks their \
                  progress and keeps an undo history.\n\n\
                  Use `assetflow simulate` to run an operation end to end against \
                  an in-memory backend."
)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a bulk operation against a simulated backend
    Simulate {
        /// Operation to run (move, delete, export, classify, rename)
        #[arg(short = 't', long = "type", default_value = "move")]
        operation: OperationType,

        /// Devices per folder in the sample hierarchy
        #[arg(short = 'n', long, default_value = "10")]
        count: u64,

        /// Number of folders in the sample hierarchy
        #[arg(long, default_value = "3", value_parser = clap::value_parser!(u64).range(2..))]
        folders: u64,

        /// Items the backend processes per poll
        #[arg(long, default_value = "2")]
        batch: u64,

        /// Number of selected items that fail during processing
        #[arg(long, default_value = "0")]
        fail: usize,

        /// Cancel once this many items have been processed
        #[arg(long)]
        cancel_after: Option<u64>,

        /// Undo the operation after it completes
        #[arg(long)]
        undo: bool,

        /// Poll interval in milliseconds (overrides the config file)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = OrchestratorConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Command::Simulate {
            operation,
            count,
            folders,
            batch,
            fail,
            cancel_after,
            undo,
            interval_ms,
            format,
        } => {
            if let Some(interval) = interval_ms {
                config.poll_interval_ms = interval;
                config.validate()?;
            }
            let run = SimulationRun {
                operation,
                count,
                folders,
                batch,
                fail,
                cancel_after,
                undo,
            };
            run_simulation(config, run, format).await?;
        }
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "assetflow=debug"
    } else {
        "assetflow=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct SimulationRun {
    operation: OperationType,
    count: u64,
    folders: u64,
    batch: u64,
    fail: usize,
    cancel_after: Option<u64>,
    undo: bool,
}

/// Run one operation over the first folder's devices.
async fn run_simulation(
    config: OrchestratorConfig,
    run: SimulationRun,
    format: OutputFormat,
) -> Result<()> {
    let backend = Arc::new(
        SimulatedBackend::sample(run.folders, run.count).with_items_per_poll(run.batch),
    );
    let mut orchestrator =
        Orchestrator::new(backend.clone(), config).with_provider(backend.clone());

    let root = AssetId(1);
    let source = AssetId(2);
    let target = AssetId(3);

    orchestrator
        .preload(&[root], 2, &CancellationToken::new())
        .await;

    let devices: Vec<AssetId> = backend.children(source).iter().map(|n| n.id).collect();
    if devices.is_empty() {
        bail!("Sample hierarchy has no devices to operate on");
    }
    for &id in devices.iter().take(run.fail) {
        backend.fail_item(id);
    }
    orchestrator
        .selection_mut()
        .select_all(&devices, SelectionContext::Tree);

    let tracked = orchestrator
        .submit(options_for(run.operation, target))
        .await
        .context("Submission failed")?;
    eprintln!(
        "Submitted {} {} of {} assets",
        tracked.operation.operation_type,
        tracked.operation.id,
        tracked.operation.asset_ids.len()
    );

    let printer = tokio::spawn(print_progress(tracked.tracker.subscribe()));

    if let Some(threshold) = run.cancel_after {
        let reached = tracked
            .tracker
            .subscribe()
            .wait_for(|p| {
                p.as_ref()
                    .is_some_and(|p| p.is_terminal() || p.processed_items >= threshold)
            })
            .await
            .map(|p| matches!(&*p, Some(p) if !p.is_terminal()));
        if reached.unwrap_or(false) {
            eprintln!("Requesting cancellation");
            tracked.tracker.cancel().await?;
        }
    }

    let mut reports = vec![orchestrator.complete(tracked).await];
    printer.await?;

    if run.undo {
        match orchestrator.undo().await {
            Ok(Some(undo)) => {
                for tracked in undo {
                    reports.push(orchestrator.complete(tracked).await);
                }
            }
            Ok(None) => eprintln!("Nothing to undo"),
            Err(UndoError::Partial { started, error, .. }) => {
                eprintln!("Undo only partly submitted: {error}");
                for tracked in started {
                    reports.push(orchestrator.complete(tracked).await);
                }
            }
            Err(e) => eprintln!("Undo failed: {e}"),
        }
    }

    let metrics = orchestrator.cache().metrics();
    match format {
        OutputFormat::Text => print_text(&reports, &metrics),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "reports": reports,
                "history": orchestrator.history().iter().collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    if reports.iter().any(|r| r.detached) {
        return Err(eyre!("Lost track of an operation before it finished"));
    }
    Ok(())
}

fn options_for(operation: OperationType, target: AssetId) -> OperationOptions {
    match operation {
        OperationType::Move => OperationOptions::Move(MoveOptions::to(target)),
        OperationType::Delete => OperationOptions::Delete(DeleteOptions::default()),
        OperationType::Export => OperationOptions::Export(ExportOptions::default()),
        OperationType::Classify => OperationOptions::Classify(ClassifyOptions {
            new_classification: Some("critical".to_string()),
            apply_to_children: false,
        }),
        OperationType::Rename => OperationOptions::Rename(RenameOptions {
            prefix: Some("renamed-".to_string()),
            ..Default::default()
        }),
    }
}

/// Print each progress snapshot until polling stops.
async fn print_progress(mut progress: watch::Receiver<Option<BulkOperationProgress>>) {
    while progress.changed().await.is_ok() {
        let line = progress.borrow_and_update().as_ref().map(|p| {
            format!(
                "  {:<10} {:>5.1}%  {}/{} processed, {} failed{}",
                p.status.to_string(),
                p.percentage(),
                p.processed_items,
                p.total_items,
                p.failed_items,
                p.current_item
                    .as_deref()
                    .map(|item| format!(", at {item}"))
                    .unwrap_or_default()
            )
        });
        if let Some(line) = line {
            eprintln!("{line}");
        }
    }
}

fn print_text(reports: &[OperationReport], metrics: &CacheMetrics) {
    println!();
    println!("{}", "─".repeat(60));
    for report in reports {
        println!(" {}: {}", report.operation_id, report.summary());
        for error in report.blocking_errors.iter().chain(&report.item_errors) {
            println!("   {error}");
        }
        if let Some(entry) = report.history_entry {
            println!("   recorded as history entry {entry}");
        }
    }
    println!("{}", "─".repeat(60));
    println!(
        " cache: {} entries, {:.0}% hit rate, {} evictions",
        metrics.cache_size,
        metrics.hit_rate * 100.0,
        metrics.eviction_count
    );
}
