//! Record normalizer.
//!
//! Turns raw export bytes into typed `ItemRecord`s:
//! - detects the delimiter from the header line
//! - strips incidental quoting from header names
//! - keeps only stock rows of the plant depot outside the logistics locations
//! - narrows each row to the columns the reports need
//!
//! Batch normalization never fails: a file that cannot be read or parsed is
//! logged and contributes no rows.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};

use super::shift::{ShiftLabel, ShiftSchedule};
use super::EngineError;
use crate::source::RawFile;

pub const ROLL_ID: &str = "ROLL_ID";
pub const PAPER_CODE: &str = "PAPER_CODE";
pub const WIDTH: &str = "WIDTH";
pub const STATUS: &str = "ESTADO";
pub const COMPLETION: &str = "COMPLETA";
pub const LOCATION: &str = "LOCATION";
pub const DEPOT: &str = "DEPO";

pub const REQUIRED_COLUMNS: [&str; 7] = [ROLL_ID, PAPER_CODE, WIDTH, STATUS, COMPLETION, LOCATION, DEPOT];

const EXCLUDED_LOCATIONS: [&str; 2] = ["ULOG", "DPBQ"];
const STOCK_STATUS: &str = "STOCK";
const PLANT_DEPOT: &str = "Planta SFM";

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Completion {
    Complete,
    Balance,
}

impl Completion {
    /// Anything that is not a balance counts as complete.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().to_lowercase() == "saldo" {
            Completion::Balance
        } else {
            Completion::Complete
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Completion::Complete => "Completa",
            Completion::Balance => "Saldo",
        }
    }
}

/// One normalized inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRecord {
    pub roll_id: String,
    pub paper_code: String,
    pub width: String,
    pub status: String,
    pub completion: Completion,
    /// Snapshot time of the file the row came from.
    pub taken_at: NaiveDateTime,
}

/// A fully loaded export.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub name: String,
    pub timestamp: NaiveDateTime,
    pub shift: ShiftLabel,
    pub records: Vec<ItemRecord>,
}

/// Normalize `files` in order, concatenating their rows.
pub fn normalize<'a>(files: impl IntoIterator<Item = &'a RawFile>) -> Vec<ItemRecord> {
    normalize_collecting(files, &mut Vec::new())
}

/// Same as [`normalize`], recording one diagnostic per skipped file.
pub(crate) fn normalize_collecting<'a>(
    files: impl IntoIterator<Item = &'a RawFile>,
    diagnostics: &mut Vec<String>,
) -> Vec<ItemRecord> {
    let mut records = Vec::new();

    for file in files {
        match normalize_file(file) {
            Ok(rows) => {
                if rows.is_empty() {
                    tracing::debug!(file = %file.name, "no rows left after filtering");
                }
                records.extend(rows);
            }
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "skipping snapshot file");
                diagnostics.push(format!("skipped {}: {e}", file.name));
            }
        }
    }

    records
}

/// Read and normalize a single file, surfacing any failure.
pub fn normalize_file(file: &RawFile) -> Result<Vec<ItemRecord>, EngineError> {
    let bytes = file.read().map_err(|source| EngineError::Read {
        file: file.name.clone(),
        source,
    })?;

    parse_records(&file.name, &bytes, file.timestamp)
}

/// Strict load used when the caller picked the files and wants to know why
/// one of them is unusable.
pub fn load_snapshot(file: &RawFile, schedule: &ShiftSchedule) -> Result<Snapshot, EngineError> {
    let records = normalize_file(file)?;

    Ok(Snapshot {
        name: file.name.clone(),
        timestamp: file.timestamp,
        shift: schedule.label_for(file.timestamp),
        records,
    })
}

fn parse_records(name: &str, bytes: &[u8], taken_at: NaiveDateTime) -> Result<Vec<ItemRecord>, EngineError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(detect_delimiter(bytes))
        .trim(Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|source| EngineError::Parse {
            file: name.to_string(),
            source,
        })?
        .clone();
    let columns = Columns::locate(name, &headers)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|source| EngineError::Parse {
            file: name.to_string(),
            source,
        })?;

        if !columns.passes_filter(&row) {
            continue;
        }

        records.push(ItemRecord {
            roll_id: columns.cell(&row, columns.roll_id).to_string(),
            paper_code: columns.cell(&row, columns.paper_code).to_string(),
            width: columns.cell(&row, columns.width).to_string(),
            status: columns.cell(&row, columns.status).to_string(),
            completion: Completion::parse(columns.cell(&row, columns.completion)),
            taken_at,
        });
    }

    Ok(records)
}

/// Positions of the required columns within one file's header.
struct Columns {
    roll_id: usize,
    paper_code: usize,
    width: usize,
    status: usize,
    completion: usize,
    location: usize,
    depot: usize,
}

impl Columns {
    fn locate(file: &str, headers: &StringRecord) -> Result<Self, EngineError> {
        // later duplicates win, matching last-seen-wins elsewhere
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (clean_header(h), i))
            .collect();

        let find = |column: &'static str| {
            positions
                .get(column)
                .copied()
                .ok_or_else(|| EngineError::MissingColumn {
                    file: file.to_string(),
                    column,
                })
        };

        Ok(Columns {
            roll_id: find(ROLL_ID)?,
            paper_code: find(PAPER_CODE)?,
            width: find(WIDTH)?,
            status: find(STATUS)?,
            completion: find(COMPLETION)?,
            location: find(LOCATION)?,
            depot: find(DEPOT)?,
        })
    }

    fn cell<'r>(&self, row: &'r StringRecord, index: usize) -> &'r str {
        row.get(index).unwrap_or("")
    }

    fn passes_filter(&self, row: &StringRecord) -> bool {
        let location = self.cell(row, self.location);

        !EXCLUDED_LOCATIONS.contains(&location)
            && self.cell(row, self.status) == STOCK_STATUS
            && self.cell(row, self.depot) == PLANT_DEPOT
    }
}

/// Trim a header name and drop one leading and one trailing quote character.
pub fn clean_header(raw: &str) -> &str {
    let trimmed = raw.trim().trim_start_matches('\u{feff}').trim();
    let unquoted = trimmed
        .strip_prefix(['"', '\''])
        .unwrap_or(trimmed);
    unquoted.strip_suffix(['"', '\'']).unwrap_or(unquoted)
}

/// Pick the most frequent candidate delimiter on the header line. Comma wins
/// ties and is the fallback for single-column files.
fn detect_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes
        .split(|&b| b == b'\n')
        .find(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
        .unwrap_or(&[]);

    let mut best = (b',', 0usize);
    for delimiter in DELIMITERS {
        let count = header.iter().filter(|&&b| b == delimiter).count();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    best.0
}
