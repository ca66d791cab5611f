use clap::{Args, Parser, Subcommand};

use crate::types::*;

#[derive(Parser, Debug)]
#[command(
    name = "imgscan",
    version,
    about = "Check which catalog images are missing on disk"
)]
pub struct Cli {
    /// Path to the catalog database
    #[arg(
        long,
        global = true,
        env = "IMGSCAN_DATABASE",
        default_value = "~/.imgscan/catalog.db"
    )]
    pub database: String,

    /// Directory the catalog's image paths are relative to
    #[arg(long, global = true, env = "IMGSCAN_IMAGE_ROOT")]
    pub image_root: Option<String>,

    /// Where scan results are stored
    #[arg(long, global = true, value_enum, default_value = "embedded")]
    pub strategy: Strategy,

    /// Number of records probed concurrently
    #[arg(long, global = true, default_value_t = 8)]
    pub probe_concurrency: usize,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Disable progress bar
    #[arg(long, global = true)]
    pub no_progress_bar: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe every catalog record and record which files are missing
    Scan(ScanArgs),

    /// Re-probe only records currently recorded as missing a file
    ScanMissing(WatchArgs),

    /// Show a summary of the stored status
    Status(StatusArgs),

    /// List records recorded as missing a file
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Probe only one dimension, leaving the other's status as it is
    #[arg(long, value_enum)]
    pub only: Option<OnlyDimension>,

    #[command(flatten)]
    pub watch: WatchArgs,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Run continuously, waiting N seconds between scans
    #[arg(long)]
    pub watch_with_interval: Option<u64>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Which missing dimension to list
    #[arg(long, value_enum, default_value = "all")]
    pub dimension: ListDimension,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}
