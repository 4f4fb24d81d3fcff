use std::fs;
use std::path::Path;

use rollwatch::config::{Config, FileConfig, Remembered, Selection};
use rollwatch::cli::SourceArgs;
use rollwatch::engine::aggregate::Cell;
use rollwatch::engine::diff::TransitionSummary;
use rollwatch::engine::shift::ShiftLabel;
use rollwatch::engine::{self, normalize, rollup};
use rollwatch::source::{DirectorySource, FileSource, TimestampSource};

const HEADER: &str = "ROLL_ID;PAPER_CODE;WIDTH;ESTADO;COMPLETA;LOCATION;DEPO";

fn write_export(dir: &Path, stamp: &str, rows: &[&str]) {
    let mut text = format!("{HEADER}\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(dir.join(format!("{stamp}.csv")), text).unwrap();
}

fn config_for(dir: &Path) -> Config {
    Config {
        selection: Selection::Directory(dir.to_path_buf()),
        stamps: TimestampSource::FileName,
        ..Config::default()
    }
}

#[test]
fn directory_scan_reconciles_latest_shift() {
    let dir = tempfile::tempdir().unwrap();
    write_export(
        dir.path(),
        "20250810-070000",
        &[
            "R1;P100;1200;STOCK;Completa;A1;Planta SFM",
            "R3;P100;1200;STOCK;Saldo;A1;Planta SFM",
        ],
    );
    write_export(
        dir.path(),
        "20250810-140000",
        &[
            "R1;P100;1200;STOCK;Saldo;A1;Planta SFM",
            "R2;P100;1200;STOCK;Completa;A1;Planta SFM",
            // filtered out: excluded location, other depot, not in stock
            "R4;P100;1200;STOCK;Saldo;ULOG;Planta SFM",
            "R5;P100;1200;STOCK;Saldo;A1;Otra",
            "R6;P100;1200;VENDIDO;Saldo;A1;Planta SFM",
        ],
    );
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let config = config_for(dir.path());
    let source = config.file_source().unwrap();
    let report = engine::run(&config, source.as_ref()).unwrap();

    assert_eq!(report.files_seen, 2);
    let current = report.current.as_ref().unwrap();
    assert_eq!(current.shift, ShiftLabel::Afternoon);
    assert_eq!(current.display_time(), "10/08/2025 14:00");
    assert_eq!(report.previous.as_ref().unwrap().shift, ShiftLabel::Morning);
    assert_eq!(report.transitions, Some(TransitionSummary { generated: 1, consumed: -1 }));

    assert_eq!(
        report.balance_by_code_width.rows,
        vec![vec![Cell::Text("P100".into()), Cell::Text("1200".into()), Cell::Count(1)]]
    );
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
}

#[test]
fn daily_rollup_keeps_latest_file_per_day() {
    let dir = tempfile::tempdir().unwrap();
    write_export(dir.path(), "20250810-080000", &["A;P;1;STOCK;Saldo;L;Planta SFM"]);
    write_export(dir.path(), "20250810-200000", &["A;P;1;STOCK;Completa;L;Planta SFM"]);

    let files = DirectorySource::new(dir.path(), TimestampSource::FileName).list().unwrap();
    let daily = rollup::select_daily_snapshots(&files, 5);

    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].name, "20250810-200000.csv");
}

#[test]
fn quoted_headers_normalize_like_plain_ones() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("20250810-080000.csv"),
        "\"ROLL_ID\",\"PAPER_CODE\",\"WIDTH\",\"ESTADO\",\"COMPLETA\",\"LOCATION\",\"DEPO\"\nA,P,1,STOCK,Saldo,L,Planta SFM\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("20250810-090000.csv"),
        "ROLL_ID,PAPER_CODE,WIDTH,ESTADO,COMPLETA,LOCATION,DEPO\nA,P,1,STOCK,Saldo,L,Planta SFM\n",
    )
    .unwrap();

    let mut files = DirectorySource::new(dir.path(), TimestampSource::FileName).list().unwrap();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    assert_eq!(files.len(), 2);

    let quoted = normalize::normalize_file(&files[0]).unwrap();
    let plain = normalize::normalize_file(&files[1]).unwrap();
    assert_eq!(quoted.len(), 1);
    assert_eq!(quoted[0].roll_id, plain[0].roll_id);
    assert_eq!(quoted[0].completion, plain[0].completion);
}

#[test]
fn repeated_scans_give_the_same_answer() {
    let dir = tempfile::tempdir().unwrap();
    write_export(dir.path(), "20250809-230000", &["A;P;1;STOCK;Saldo;L;Planta SFM"]);
    write_export(dir.path(), "20250810-070000", &["B;P;1;STOCK;Saldo;L;Planta SFM"]);

    let config = config_for(dir.path());
    let first = engine::run(&config, config.file_source().unwrap().as_ref()).unwrap();
    let second = engine::run(&config, config.file_source().unwrap().as_ref()).unwrap();

    assert_eq!(first.transitions, second.transitions);
    assert_eq!(first.balance_by_code_width, second.balance_by_code_width);
    assert_eq!(first.trend, second.trend);
    assert_eq!(first.previous.as_ref().unwrap().shift, ShiftLabel::Night);
}

#[test]
fn config_file_and_flags_drive_a_scan() {
    let dir = tempfile::tempdir().unwrap();
    write_export(dir.path(), "20250810-080000", &["A;P;1;STOCK;Saldo;L;Planta SFM"]);

    let file = FileConfig::parse(&format!(
        "[source]\ndir = {:?}\ntimestamp = \"filename\"\n",
        dir.path().display().to_string()
    ))
    .unwrap();
    let args = SourceArgs {
        max_files: Some(24),
        ..SourceArgs::default()
    };

    let config = Config::from_args(&args, file, Remembered::default()).unwrap();
    assert_eq!(config.max_days, 1);

    let (info, table) = engine::count_current(&config, config.file_source().unwrap().as_ref())
        .unwrap()
        .unwrap();
    assert_eq!(info.name, "20250810-080000.csv");
    assert_eq!(table.len(), 1);
}

#[test]
fn missing_directory_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir.path().join("gone"));

    let err = engine::run(&config, config.file_source().unwrap().as_ref()).unwrap_err();
    assert!(err.to_string().contains("gone"));
}
