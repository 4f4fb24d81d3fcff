use std::env;
use std::path::Path;
use std::process;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use rollwatch::cli::{Cli, Command, DiffArgs, HistoryArgs, SourceArgs};
use rollwatch::config::{self, Config, FileConfig, Remembered};
use rollwatch::engine::{self, diff, normalize};
use rollwatch::report;
use rollwatch::source::{self, RawFile};
use rollwatch::store::Store;
use rollwatch::watch;

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("ROLLWATCH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "rollwatch=debug,info"
        } else {
            "rollwatch=info,warn"
        })
    });

    let format = env::var("ROLLWATCH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
        }
    }
}

fn fail(context: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("{context}: {error}");
    process::exit(1);
}

fn open_store() -> Option<Store> {
    match Store::open() {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(error = %e, "history database unavailable");
            None
        }
    }
}

fn remembered(store: Option<&Store>) -> Remembered {
    let Some(store) = store else {
        return Remembered::default();
    };

    Remembered {
        directory: store.saved_directory().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read remembered directory");
            None
        }),
        max_files: store.saved_max_files().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read remembered file limit");
            None
        }),
    }
}

/// Resolve the run config and remember the chosen directory once it is
/// known to be readable.
fn load_config(args: &SourceArgs, store: Option<&Store>) -> Config {
    let file = FileConfig::discover(args.config.as_deref()).unwrap_or_else(|e| fail("Error loading config", e));
    let config = Config::from_args(args, file, remembered(store)).unwrap_or_else(|e| fail("Invalid configuration", e));

    if let Some(dir) = config.directory() {
        if let Err(e) = source::verify_access(dir) {
            fail("Cannot read export directory", e);
        }
    }

    if let Some(store) = store {
        if let Some(dir) = config.directory() {
            if let Err(e) = store.save_directory(dir) {
                tracing::warn!(error = %e, "failed to remember directory");
            }
        }
        if let Some(max_files) = args.max_files {
            if let Err(e) = store.save_max_files(max_files) {
                tracing::warn!(error = %e, "failed to remember file limit");
            }
        }
    }

    config
}

fn source_for(config: &Config) -> Box<dyn source::FileSource + Send> {
    config.file_source().unwrap_or_else(|e| fail("No exports to read", e))
}

fn run_diff(args: &DiffArgs) {
    let file = FileConfig::discover(args.config.as_deref()).unwrap_or_else(|e| fail("Error loading config", e));
    let config = Config::from_args(&args.source_args(), file, Remembered::default())
        .unwrap_or_else(|e| fail("Invalid configuration", e));

    let load = |path: &Path| {
        let file = match RawFile::open(path, config.stamps) {
            Ok(Some(file)) => file,
            Ok(None) => fail("No timestamp for", path.display()),
            Err(e) => fail(&format!("Cannot open {}", path.display()), e),
        };
        normalize::load_snapshot(&file, &config.schedule).unwrap_or_else(|e| fail("Error loading snapshot", e))
    };

    let current = load(&args.current);
    let previous = load(&args.previous);
    let items = diff::classify(&current.records, &previous.records);
    let summary = diff::diff(&current.records, &previous.records);

    if args.json {
        let rendered = if args.items {
            report::json::render(&serde_json::json!({ "summary": summary, "items": items }))
        } else {
            report::json::render(&summary)
        };
        println!("{}", rendered.unwrap_or_else(|e| fail("Error serializing diff", e)));
        return;
    }

    println!("\nComparing snapshots:");
    println!("  Current:  {} ({} shift)", current.name, current.shift.as_str());
    println!("  Previous: {} ({} shift)", previous.name, previous.shift.as_str());
    println!();
    print!("{}", report::table::render_summary(&summary));
    if args.items {
        println!();
        print!("{}", report::table::render_items(&items));
    }
}

fn run_history(args: &HistoryArgs) {
    let store = Store::open().unwrap_or_else(|e| fail("Error opening history", e));
    let records = store.list_scans(args.limit).unwrap_or_else(|e| fail("Error listing scans", e));

    if args.json {
        let rendered = report::json::render(&records).unwrap_or_else(|e| fail("Error serializing history", e));
        println!("{rendered}");
    } else {
        print!("{}", report::table::render_history(&records));
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose());

    match cli.command {
        Command::Scan(args) => {
            let mut store = open_store();
            let config = load_config(&args.source, store.as_ref());
            let source = source_for(&config);

            let result = engine::run(&config, source.as_ref()).unwrap_or_else(|e| fail("Scan failed", e));

            if !args.no_save && !result.is_empty() {
                if let Some(store) = store.as_mut() {
                    if let Err(e) = store.save_scan(&result, &config.describe_source()) {
                        tracing::warn!(error = %e, "failed to save scan");
                    }
                }
            }

            report::print(&result, &config);
        }
        Command::Diff(args) => run_diff(&args),
        Command::Count(args) => {
            let store = open_store();
            let config = load_config(&args.source, store.as_ref());
            let source = source_for(&config);

            match engine::count_current(&config, source.as_ref()) {
                Ok(Some((info, table))) if config.json_output => {
                    let rendered = report::json::render(&serde_json::json!({ "snapshot": info, "counts": table }))
                        .unwrap_or_else(|e| fail("Error serializing counts", e));
                    println!("{rendered}");
                }
                Ok(Some((info, table))) => {
                    println!("\n{} ({} shift, {})", info.name, info.shift.as_str(), info.display_time());
                    print!("{}", report::table::render_table(&table));
                }
                Ok(None) => {
                    eprintln!("No snapshot exports found.");
                    process::exit(1);
                }
                Err(e) => fail("Count failed", e),
            }
        }
        Command::Trend(args) => {
            let store = open_store();
            let config = load_config(&args.source, store.as_ref());
            let source = source_for(&config);

            let table = engine::trend(&config, source.as_ref()).unwrap_or_else(|e| fail("Trend failed", e));
            if config.json_output {
                let rendered = report::json::render(&table).unwrap_or_else(|e| fail("Error serializing trend", e));
                println!("{rendered}");
            } else {
                println!("\nLast {} days", config.max_days);
                print!("{}", report::table::render_table(&table));
            }
        }
        Command::History(args) => run_history(&args),
        Command::Watch(args) => {
            let store = open_store();
            let mut config = load_config(&args.source, store.as_ref());
            if let Some(value) = &args.interval {
                config.watch_interval = config::parse_interval(value).unwrap_or_else(|e| fail("Invalid interval", e));
            }

            tracing::info!(
                source = %config.describe_source(),
                interval = %humantime::format_duration(config.watch_interval),
                "watching exports"
            );

            let printed = watch::run(&config, args.cycles, |result| report::print(&result, &config));
            if let Err(e) = printed {
                fail("Watch stopped", e);
            }
        }
    }
}
