//! imgscan: reconcile an image catalog against the filesystem.
//!
//! Every catalog record names a large and a small image file. A scan checks
//! which of those files exist under the image root and persists the result,
//! either as flag columns on the catalog table or as a separate table of
//! records with something missing. The `status` and `list` commands answer
//! "what is missing" from the last persisted scan without touching the disk.

#![warn(clippy::all)]

mod cli;
mod config;
mod probe;
mod scanner;
mod shutdown;
mod status;
mod store;
mod types;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::Config;
use probe::FsProbe;
use scanner::{ScanError, ScanReport, ScanScope, Scanner};
use status::StatusStrategy;
use store::{RecordStore, SqliteRecordStore};

/// What one pass of a scan command does.
#[derive(Debug, Clone, Copy)]
enum ScanMode {
    Full(ScanScope),
    MissingOnly,
}

/// Open the catalog and build the configured status strategy.
async fn open_strategy(config: &Config) -> anyhow::Result<Arc<dyn StatusStrategy>> {
    let store = SqliteRecordStore::open(&config.database).await?;
    tracing::debug!("Catalog database opened at {}", config.database.display());
    let store: Arc<dyn RecordStore> = Arc::new(store);
    Ok(status::strategy_for(config.layout, store))
}

fn print_report(report: &ScanReport) {
    println!(
        "{} scan: {} records ({} checks) in {:.1}s",
        report.kind.as_str(),
        report.records_scanned,
        report.probes,
        report.elapsed.as_secs_f64()
    );
    println!("  Missing large: {}", report.missing_large);
    println!("  Missing small: {}", report.missing_small);
    println!("  Rows written:  {}", report.rows_written);
}

/// Run the scan and scan-missing commands, optionally in a watch loop.
async fn run_scan(
    config: &Config,
    mode: ScanMode,
    watch_with_interval: Option<u64>,
) -> anyhow::Result<()> {
    let root = config.require_image_root()?;
    let strategy = open_strategy(config).await?;
    let probe = Arc::new(FsProbe::new(root));
    let scanner = Scanner::new(strategy, probe.clone())
        .with_concurrency(config.probe_concurrency)
        .with_progress_bar(!config.no_progress_bar);

    let shutdown_token = shutdown::install_signal_handler()?;
    tracing::info!(
        root = %probe.root().display(),
        layout = config.layout.as_str(),
        concurrency = config.probe_concurrency,
        "Starting imgscan"
    );

    loop {
        if shutdown_token.is_cancelled() {
            tracing::info!("Shutdown requested, exiting...");
            break;
        }

        match scan_once(&scanner, mode, &shutdown_token).await {
            Ok(report) => print_report(&report),
            Err(ScanError::Cancelled) => {
                tracing::info!("Scan interrupted, stored status left unchanged");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let Some(interval) = watch_with_interval else {
            break;
        };
        tracing::info!("Waiting {} seconds...", interval);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = shutdown_token.cancelled() => {
                tracing::info!("Shutdown during wait, exiting...");
                break;
            }
        }
    }

    Ok(())
}

async fn scan_once(
    scanner: &Scanner,
    mode: ScanMode,
    shutdown_token: &CancellationToken,
) -> Result<ScanReport, ScanError> {
    match mode {
        ScanMode::Full(scope) => scanner.scan(scope, shutdown_token).await,
        ScanMode::MissingOnly => scanner.scan_missing_only(shutdown_token).await,
    }
}

/// Run the status command.
async fn run_status(config: &Config, args: cli::StatusArgs) -> anyhow::Result<()> {
    if !config.database.exists() {
        println!("No catalog database found at {}", config.database.display());
        return Ok(());
    }

    let strategy = open_strategy(config).await?;
    let summary = status::summarize(strategy.as_ref()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Catalog: {}", config.database.display());
    println!("Status layout: {}", summary.layout.as_str());
    println!();
    println!("Images:");
    println!("  Total:         {}", summary.total_images);
    println!("  Missing large: {}", summary.missing_large);
    println!("  Missing small: {}", summary.missing_small);
    println!("  Missing any:   {}", summary.missing_any);
    println!();

    match &summary.last_scan {
        Some(run) => {
            println!(
                "Last scan: {} ({}) started {}",
                run.kind.as_str(),
                run.layout.as_str(),
                run.started_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            match (&run.completed_at, run.interrupted) {
                (Some(_), true) => println!("  Interrupted, nothing written"),
                (Some(completed), false) => println!(
                    "  Completed {}, {} records scanned",
                    completed.format("%Y-%m-%d %H:%M:%S UTC"),
                    run.records_scanned
                ),
                (None, _) => println!("  Did not finish"),
            }
            if run.layout != summary.layout {
                println!(
                    "  Note: last scan used the {} layout; counts above come from {}",
                    run.layout.as_str(),
                    summary.layout.as_str()
                );
            }
        }
        None => println!("No scans recorded yet."),
    }

    Ok(())
}

/// Run the list command.
async fn run_list(config: &Config, args: cli::ListArgs) -> anyhow::Result<()> {
    if !config.database.exists() {
        println!("No catalog database found at {}", config.database.display());
        return Ok(());
    }

    let strategy = open_strategy(config).await?;

    match args.dimension.dimension() {
        Some(dimension) => {
            let mut missing = strategy.list_missing(dimension).await?;
            missing.sort_by_key(|m| m.id);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&missing)?);
            } else {
                for image in &missing {
                    println!("{}\t{}", image.id, image.path);
                }
            }
        }
        None => {
            let mut missing = strategy.list_all_missing().await?;
            missing.sort_by_key(|m| m.id);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&missing)?);
            } else {
                for entry in &missing {
                    let large = if entry.large_loaded { "ok" } else { "missing" };
                    let small = if entry.small_loaded { "ok" } else { "missing" };
                    println!(
                        "{}\tlarge:{}\t{}\tsmall:{}\t{}",
                        entry.id, large, entry.large_path, small, entry.small_path
                    );
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = Config::from_cli(&cli)?;

    // Logs go to stderr so `--json` output stays parseable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter())),
        )
        .init();

    match cli.command {
        Command::Scan(args) => {
            let scope = args.only.map(ScanScope::from).unwrap_or(ScanScope::All);
            run_scan(&config, ScanMode::Full(scope), args.watch.watch_with_interval).await
        }
        Command::ScanMissing(args) => {
            run_scan(&config, ScanMode::MissingOnly, args.watch_with_interval).await
        }
        Command::Status(args) => run_status(&config, args).await,
        Command::List(args) => run_list(&config, args).await,
    }
}
