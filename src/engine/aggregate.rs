//! Grouped counts over normalized rows.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use serde::Serialize;

use super::normalize::{Completion, ItemRecord};

pub const COUNT_COLUMN: &str = "Cantidad";
pub const CODE_WIDTH_COLUMNS: [&str; 3] = ["PAPER_CODE", "WIDTH", COUNT_COLUMN];
pub const DAY_STATUS_COLUMNS: [&str; 3] = ["Fecha", "COMPLETA", COUNT_COLUMN];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Count(u64),
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Count(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn empty(columns: &[&str]) -> Self {
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Count occurrences of each key, in first-seen key order.
fn count_groups<K, I>(keys: I) -> Vec<(K, u64)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = K>,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, u64)> = Vec::new();

    for key in keys {
        match slots.get(&key) {
            Some(&slot) => groups[slot].1 += 1,
            None => {
                slots.insert(key.clone(), groups.len());
                groups.push((key, 1));
            }
        }
    }

    groups
}

/// Balance rolls per paper code and width.
pub fn aggregate_by_code_width(records: &[ItemRecord]) -> Table {
    let mut table = Table::empty(&CODE_WIDTH_COLUMNS);

    let keys = records
        .iter()
        .filter(|r| r.completion == Completion::Balance)
        .map(|r| (r.paper_code.as_str(), r.width.as_str()));

    for ((code, width), count) in count_groups(keys) {
        table.rows.push(vec![
            Cell::Text(code.to_string()),
            Cell::Text(width.to_string()),
            Cell::Count(count),
        ]);
    }

    table
}

/// Rolls per snapshot day and completion state.
pub fn aggregate_by_day_status(records: &[ItemRecord]) -> Table {
    let mut table = Table::empty(&DAY_STATUS_COLUMNS);

    let keys = records
        .iter()
        .map(|r| (r.taken_at.date(), r.completion));

    for ((day, completion), count) in count_groups::<(NaiveDate, Completion), _>(keys) {
        table.rows.push(vec![
            Cell::Text(day.format("%Y-%m-%d").to_string()),
            Cell::Text(completion.as_str().to_string()),
            Cell::Count(count),
        ]);
    }

    table
}
