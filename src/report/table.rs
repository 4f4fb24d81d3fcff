//! Terminal rendering for scan results.
//!
//! Lays a report out as plain text sections:
//! - which snapshots were compared and the generated/consumed counts
//! - open balances per paper code and width
//! - the per-day completion trend
//! - per-shift resumes

use crate::engine::aggregate::{Cell, Table};
use crate::engine::diff::{ItemTransition, Transition, TransitionSummary};
use crate::engine::shift::ShiftInfo;
use crate::engine::{ScanReport, ShiftResume};
use crate::store::ScanRecord;

const CELL_WIDTH: usize = 24;

pub fn render(report: &ScanReport) -> String {
    let Some(current) = &report.current else {
        return String::from("No snapshot exports found.\n");
    };

    let mut output = String::new();

    output.push_str("\nShift comparison\n");
    output.push_str(&"-".repeat(40));
    output.push('\n');
    output.push_str(&format!("  current:  {}\n", describe(current)));
    match &report.previous {
        Some(previous) => output.push_str(&format!("  previous: {}\n", describe(previous))),
        None => output.push_str("  previous: none\n"),
    }
    if let Some(summary) = &report.transitions {
        output.push_str(&render_summary(summary));
    }

    output.push_str("\nOpen balances\n");
    output.push_str(&"-".repeat(40));
    output.push('\n');
    output.push_str(&render_table(&report.balance_by_code_width));

    output.push_str("\nDaily trend\n");
    output.push_str(&"-".repeat(40));
    output.push('\n');
    output.push_str(&render_table(&report.trend));

    if !report.resumes.is_empty() {
        output.push_str("\nShift resumes\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');
        for resume in &report.resumes {
            output.push_str(&render_resume(resume));
        }
    }

    output
}

fn describe(info: &ShiftInfo) -> String {
    format!(
        "{} ({} shift of {}, {})",
        info.name,
        info.shift.as_str(),
        info.shift_date.format("%d/%m/%Y"),
        info.display_time()
    )
}

pub fn render_summary(summary: &TransitionSummary) -> String {
    format!(
        "  generated: {:+}\n  consumed:  {:+}\n  net:       {:+}\n",
        summary.generated,
        summary.consumed,
        summary.net()
    )
}

fn render_resume(resume: &ShiftResume) -> String {
    format!(
        "  {:10} {}  {:+} / {:+}  total {:+}  ({} -> {})\n",
        resume.shift.as_str(),
        resume.shift_date.format("%d/%m/%Y"),
        resume.generated,
        resume.consumed,
        resume.total,
        resume.first,
        resume.last
    )
}

/// Columns padded to a fixed width, counts right-aligned.
pub fn render_table(table: &Table) -> String {
    if table.is_empty() {
        return String::from("  (no rows)\n");
    }

    let mut output = String::from(" ");
    for column in &table.columns {
        output.push_str(&format!(" {:width$}", truncate(column, CELL_WIDTH), width = CELL_WIDTH));
    }
    output.truncate(output.trim_end().len());
    output.push('\n');

    for row in &table.rows {
        let mut line = String::from(" ");
        for cell in row {
            let text = truncate(&cell.to_string(), CELL_WIDTH);
            match cell {
                Cell::Count(_) => {
                    line.push_str(&format!(" {text:>width$}", width = CELL_WIDTH))
                }
                Cell::Text(_) => {
                    line.push_str(&format!(" {text:width$}", width = CELL_WIDTH))
                }
            }
        }
        output.push_str(line.trim_end());
        output.push('\n');
    }

    output
}

/// One line per roll that changed.
pub fn render_items(items: &[ItemTransition]) -> String {
    let mut output = String::new();

    for item in items {
        let marker = match item.transition {
            Transition::Generated => "[+]",
            Transition::Consumed => "[-]",
            Transition::Unchanged => continue,
        };
        output.push_str(&format!("  {marker} {}\n", item.roll_id));
    }

    if output.is_empty() {
        output.push_str("  no rolls changed\n");
    }

    output
}

pub fn render_history(records: &[ScanRecord]) -> String {
    if records.is_empty() {
        return String::from("No scans recorded. Run 'rollwatch scan' to create one.\n");
    }

    let mut output = format!(
        "{:<6} {:<20} {:<26} {:>10} {:>10} {:>8}\n",
        "ID", "Date", "Current", "Generated", "Consumed", "Open"
    );
    output.push_str(&"-".repeat(84));
    output.push('\n');

    for record in records {
        let datetime = chrono::DateTime::from_timestamp(record.timestamp, 0)
            .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let signed = |value: Option<i64>| value.map(|v| format!("{v:+}")).unwrap_or_else(|| "-".to_string());

        output.push_str(&format!(
            "{:<6} {:<20} {:<26} {:>10} {:>10} {:>8}\n",
            record.id,
            datetime,
            truncate(record.current_name.as_deref().unwrap_or("-"), 26),
            signed(record.generated),
            signed(record.consumed),
            record.open_balance
        ));
    }

    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}
