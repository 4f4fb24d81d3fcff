pub mod aggregate;
pub mod diff;
pub mod normalize;
pub mod rollup;
pub mod shift;

use std::io;
use std::slice;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::config::Config;
use crate::source::{newest_first, FileSource, RawFile, SourceError};
use aggregate::{aggregate_by_code_width, aggregate_by_day_status, Table};
use diff::{diff, TransitionSummary};
use normalize::normalize_collecting;
use shift::{files_in_latest_instance, resolve_shift_pair, ShiftInfo, ShiftLabel, ShiftSchedule};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("{file} is not a readable table: {source}")]
    Parse {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{file} is missing required column {column}")]
    MissingColumn { file: String, column: &'static str },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Generated/consumed summary for the latest occurrence of one shift,
/// comparing its newest snapshot with its oldest.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftResume {
    pub shift: ShiftLabel,
    pub shift_date: NaiveDate,
    pub first: String,
    pub last: String,
    pub generated: i64,
    pub consumed: i64,
    pub total: i64,
}

/// Everything one scan cycle produces.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub generated_at: NaiveDateTime,
    pub source: String,
    pub files_seen: usize,
    pub files_considered: usize,
    pub current: Option<ShiftInfo>,
    pub previous: Option<ShiftInfo>,
    pub transitions: Option<TransitionSummary>,
    pub balance_by_code_width: Table,
    pub trend: Table,
    pub resumes: Vec<ShiftResume>,
    pub diagnostics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_memory_bytes: Option<usize>,
}

impl ScanReport {
    fn empty(source: &dyn FileSource) -> Self {
        ScanReport {
            generated_at: Local::now().naive_local(),
            source: source.name().to_string(),
            files_seen: 0,
            files_considered: 0,
            current: None,
            previous: None,
            transitions: None,
            balance_by_code_width: Table::empty(&aggregate::CODE_WIDTH_COLUMNS),
            trend: Table::empty(&aggregate::DAY_STATUS_COLUMNS),
            resumes: Vec::new(),
            diagnostics: Vec::new(),
            duration_ms: None,
            peak_memory_bytes: None,
        }
    }

    /// True when no file produced anything to show.
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

/// List the source and keep the `max_files` most recent exports.
pub fn candidates(config: &Config, source: &dyn FileSource) -> Result<(usize, Vec<RawFile>), EngineError> {
    let listed = source.list()?;
    let seen = listed.len();

    let recent: Vec<RawFile> = newest_first(&listed)
        .into_iter()
        .take(config.max_files)
        .cloned()
        .collect();

    Ok((seen, recent))
}

/// Run one full reconciliation cycle against `source`.
pub fn run(config: &Config, source: &dyn FileSource) -> Result<ScanReport, EngineError> {
    let start = std::time::Instant::now();
    let mut report = ScanReport::empty(source);

    let (seen, files) = candidates(config, source)?;
    report.files_seen = seen;
    report.files_considered = files.len();

    if files.is_empty() {
        report.diagnostics.push(format!("{}: no snapshot exports found", source.name()));
    }

    let pair = resolve_shift_pair(&files, &config.schedule);

    if let Some(current) = pair.current {
        report.current = Some(ShiftInfo::describe(current, &config.schedule));
        let current_records = normalize_collecting(slice::from_ref(current), &mut report.diagnostics);
        report.balance_by_code_width = aggregate_by_code_width(&current_records);

        if let Some(previous) = pair.previous {
            report.previous = Some(ShiftInfo::describe(previous, &config.schedule));
            let previous_records = normalize_collecting(slice::from_ref(previous), &mut report.diagnostics);
            let summary = diff(&current_records, &previous_records);

            tracing::info!(
                current = %current.name,
                previous = %previous.name,
                generated = summary.generated,
                consumed = summary.consumed,
                "shift reconciled"
            );
            report.transitions = Some(summary);
        } else {
            report.diagnostics.push("only one snapshot available, nothing to compare".to_string());
        }
    }

    let daily = rollup::select_daily_snapshots(&files, config.max_days);
    let daily_records = normalize_collecting(daily, &mut report.diagnostics);
    report.trend = aggregate_by_day_status(&daily_records);

    for label in ShiftLabel::ALL {
        if let Some(resume) = resume_collecting(&files, &config.schedule, label, &mut report.diagnostics) {
            report.resumes.push(resume);
        }
    }

    report.duration_ms = Some(start.elapsed().as_millis());
    report.peak_memory_bytes = memory_stats::memory_stats().map(|usage| usage.physical_mem);

    Ok(report)
}

/// Compare the newest and oldest snapshot of the latest occurrence of
/// `label`. Needs at least two snapshots in that occurrence.
pub fn resume_shift(files: &[RawFile], schedule: &ShiftSchedule, label: ShiftLabel) -> Option<ShiftResume> {
    resume_collecting(files, schedule, label, &mut Vec::new())
}

/// Same as [`resume_shift`], recording unreadable files in `diagnostics`.
fn resume_collecting(
    files: &[RawFile],
    schedule: &ShiftSchedule,
    label: ShiftLabel,
    diagnostics: &mut Vec<String>,
) -> Option<ShiftResume> {
    let in_shift = files_in_latest_instance(files, schedule, label);
    let (&last, &first) = (in_shift.first()?, in_shift.last()?);
    if in_shift.len() < 2 {
        return None;
    }

    let summary = diff(
        &normalize_collecting(slice::from_ref(last), diagnostics),
        &normalize_collecting(slice::from_ref(first), diagnostics),
    );

    Some(ShiftResume {
        shift: label,
        shift_date: schedule.instance(last.timestamp).date,
        first: first.name.clone(),
        last: last.name.clone(),
        generated: summary.generated,
        consumed: summary.consumed,
        total: summary.net(),
    })
}

/// Balance counts of the newest snapshot only.
pub fn count_current(config: &Config, source: &dyn FileSource) -> Result<Option<(ShiftInfo, Table)>, EngineError> {
    let (_, files) = candidates(config, source)?;
    let Some(current) = resolve_shift_pair(&files, &config.schedule).current else {
        return Ok(None);
    };

    let records = normalize::normalize(slice::from_ref(current));
    Ok(Some((
        ShiftInfo::describe(current, &config.schedule),
        aggregate_by_code_width(&records),
    )))
}

/// Per-day completion counts over the last `max_days` days.
pub fn trend(config: &Config, source: &dyn FileSource) -> Result<Table, EngineError> {
    let (_, files) = candidates(config, source)?;
    let daily = rollup::select_daily_snapshots(&files, config.max_days);
    Ok(aggregate_by_day_status(&normalize::normalize(daily)))
}
