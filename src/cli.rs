use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::source::TimestampSource;

#[derive(Parser)]
#[command(name = "rollwatch")]
#[command(about = "Shift-to-shift reconciliation of warehouse inventory snapshots")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile the latest shift, count open balances and show the trend
    Scan(ScanArgs),

    /// Compare two specific snapshot files
    Diff(DiffArgs),

    /// Balance rolls per paper code and width in the newest snapshot
    Count(CountArgs),

    /// Rolls per day and completion state over recent days
    Trend(TrendArgs),

    /// List previously saved scans
    History(HistoryArgs),

    /// Re-scan periodically, discarding results overtaken by a newer scan
    Watch(WatchArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimestampArg {
    /// File modification time
    Modified,
    /// YYYYMMDD-HHMMSS prefix of the file name
    Filename,
}

impl From<TimestampArg> for TimestampSource {
    fn from(arg: TimestampArg) -> Self {
        match arg {
            TimestampArg::Modified => TimestampSource::Modified,
            TimestampArg::Filename => TimestampSource::FileName,
        }
    }
}

/// Options shared by every command that reads exports.
#[derive(Args, Debug, Default, Clone)]
pub struct SourceArgs {
    /// Directory holding the CSV exports (remembered between runs)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Explicit export files instead of a directory
    #[arg(long, value_delimiter = ',', conflicts_with = "dir")]
    pub files: Option<Vec<PathBuf>>,

    /// Where each file's snapshot time comes from
    #[arg(long, value_enum)]
    pub timestamp: Option<TimestampArg>,

    /// Only consider this many of the most recent exports
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Number of days in the trend view
    #[arg(long)]
    pub days: Option<usize>,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output as JSON instead of tables
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Show diagnostics and timing
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

#[derive(Parser)]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Do not record this scan in the history database
    #[arg(long, default_value_t = false)]
    pub no_save: bool,
}

#[derive(Parser)]
pub struct DiffArgs {
    /// Snapshot of the current shift
    pub current: PathBuf,

    /// Snapshot of the previous shift
    pub previous: PathBuf,

    /// List every roll that changed
    #[arg(long, default_value_t = false)]
    pub items: bool,

    /// Where each file's snapshot time comes from
    #[arg(long, value_enum)]
    pub timestamp: Option<TimestampArg>,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl DiffArgs {
    /// The subset of source options that decide shift labels and stamps.
    pub fn source_args(&self) -> SourceArgs {
        SourceArgs {
            timestamp: self.timestamp,
            config: self.config.clone(),
            json: self.json,
            ..SourceArgs::default()
        }
    }
}

#[derive(Parser)]
pub struct CountArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Parser)]
pub struct TrendArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Parser)]
pub struct HistoryArgs {
    /// Number of scans to show
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct WatchArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Time between scans, e.g. "15m" (overrides the config file)
    #[arg(long)]
    pub interval: Option<String>,

    /// Stop after this many scans
    #[arg(long)]
    pub cycles: Option<usize>,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        match &self.command {
            Command::Scan(args) => args.source.verbose,
            Command::Count(args) => args.source.verbose,
            Command::Trend(args) => args.source.verbose,
            Command::Watch(args) => args.source.verbose,
            Command::Diff(_) | Command::History(_) => false,
        }
    }
}
