//! Scan history: one summary row per saved scan.

use rusqlite::params;
use serde::Serialize;

use super::{Store, StoreError};
use crate::engine::aggregate::Cell;
use crate::engine::ScanReport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRecord {
    pub id: i64,
    pub timestamp: i64,
    pub source: String,
    pub current_name: Option<String>,
    pub previous_name: Option<String>,
    pub current_shift: Option<String>,
    pub generated: Option<i64>,
    pub consumed: Option<i64>,
    /// Balance rolls in the current snapshot.
    pub open_balance: u64,
    pub files_seen: usize,
    pub duration_ms: u64,
}

fn open_balance(report: &ScanReport) -> u64 {
    report
        .balance_by_code_width
        .rows
        .iter()
        .filter_map(|row| match row.last() {
            Some(Cell::Count(n)) => Some(*n),
            _ => None,
        })
        .fold(0u64, |total, n| total.saturating_add(n))
}

impl Store {
    /// Save a scan summary, returning its id.
    pub fn save_scan(&mut self, report: &ScanReport, source: &str) -> Result<i64, StoreError> {
        let timestamp = chrono::Local::now().timestamp();
        let transitions = report.transitions;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO scans (timestamp, source, current_name, previous_name, current_shift,
                                generated, consumed, open_balance, files_seen, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                timestamp,
                source,
                report.current.as_ref().map(|c| c.name.as_str()),
                report.previous.as_ref().map(|p| p.name.as_str()),
                report.current.as_ref().map(|c| c.shift.as_str()),
                transitions.map(|t| t.generated),
                transitions.map(|t| t.consumed),
                i64::try_from(open_balance(report)).unwrap_or(i64::MAX),
                i64::try_from(report.files_seen).unwrap_or(i64::MAX),
                i64::try_from(report.duration_ms.unwrap_or(0)).unwrap_or(i64::MAX),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(id)
    }

    /// Most recent scans first.
    pub fn list_scans(&self, limit: usize) -> Result<Vec<ScanRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, source, current_name, previous_name, current_shift,
                    generated, consumed, open_balance, files_seen, duration_ms
             FROM scans
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;

        let records = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], scan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

fn scan_from_row(row: &rusqlite::Row) -> rusqlite::Result<ScanRecord> {
    Ok(ScanRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        source: row.get(2)?,
        current_name: row.get(3)?,
        previous_name: row.get(4)?,
        current_shift: row.get(5)?,
        generated: row.get(6)?,
        consumed: row.get(7)?,
        open_balance: row.get::<_, i64>(8)?.max(0) as u64,
        files_seen: row.get::<_, i64>(9)?.max(0) as usize,
        duration_ms: row.get::<_, i64>(10)?.max(0) as u64,
    })
}
