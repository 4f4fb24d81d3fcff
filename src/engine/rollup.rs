//! Daily rollup selection: one snapshot per calendar day for trend views.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::source::RawFile;

/// Keep the latest file of each calendar day, most recent day first, at most
/// `max_days` of them.
pub fn select_daily_snapshots(files: &[RawFile], max_days: usize) -> Vec<&RawFile> {
    let mut latest: HashMap<NaiveDate, &RawFile> = HashMap::new();

    for file in files {
        latest
            .entry(file.timestamp.date())
            .and_modify(|kept| {
                if is_newer(file, kept) {
                    *kept = file;
                }
            })
            .or_insert(file);
    }

    let mut days: Vec<&RawFile> = latest.into_values().collect();
    days.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.name.cmp(&a.name))
    });
    days.truncate(max_days);
    days
}

fn is_newer(candidate: &RawFile, kept: &RawFile) -> bool {
    (candidate.timestamp, &candidate.name) > (kept.timestamp, &kept.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn file(day: u32, hour: u32) -> RawFile {
        let ts: NaiveDateTime = NaiveDate::from_ymd_opt(2025, 8, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap();
        RawFile::from_bytes(ts.format("%Y%m%d-%H%M%S.csv").to_string(), ts, "")
    }

    fn names(files: &[&RawFile]) -> Vec<String> {
        files.iter().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn same_day_keeps_only_latest() {
        let files = vec![file(10, 8), file(10, 22)];
        let selected = select_daily_snapshots(&files, 5);
        assert_eq!(names(&selected), vec!["20250810-220000.csv"]);
    }

    #[test]
    fn one_per_day_newest_day_first() {
        let files = vec![file(8, 23), file(10, 1), file(9, 12), file(9, 6), file(10, 0)];
        let selected = select_daily_snapshots(&files, 10);
        assert_eq!(
            names(&selected),
            vec!["20250810-010000.csv", "20250809-120000.csv", "20250808-230000.csv"]
        );
    }

    #[test]
    fn limits_to_max_days() {
        let files: Vec<RawFile> = (1..=9).map(|d| file(d, 12)).collect();
        let selected = select_daily_snapshots(&files, 3);
        assert_eq!(
            names(&selected),
            vec!["20250809-120000.csv", "20250808-120000.csv", "20250807-120000.csv"]
        );
    }

    #[test]
    fn zero_days_or_no_files_is_empty() {
        assert!(select_daily_snapshots(&[file(1, 1)], 0).is_empty());
        assert!(select_daily_snapshots(&[], 5).is_empty());
    }
}
