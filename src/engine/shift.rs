//! Shift window resolution.
//!
//! A day is split into three operating shifts by their start hours. The shift
//! whose range crosses midnight belongs to the day it started on, so a 02:00
//! snapshot is part of the previous evening's night shift. Everything here is
//! a function of file timestamps; no file is ever read.

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::source::{newest_first, RawFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShiftLabel {
    Morning,
    Afternoon,
    Night,
}

impl ShiftLabel {
    pub const ALL: [ShiftLabel; 3] = [ShiftLabel::Morning, ShiftLabel::Afternoon, ShiftLabel::Night];

    pub fn as_str(self) -> &'static str {
        match self {
            ShiftLabel::Morning => "Morning",
            ShiftLabel::Afternoon => "Afternoon",
            ShiftLabel::Night => "Night",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("{label} shift starts at hour {hour}, expected 0-23")]
    HourOutOfRange { label: &'static str, hour: u32 },

    #[error("two shifts start at hour {0}")]
    DuplicateStart(u32),
}

/// Start hours of the three shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShiftSchedule {
    morning_start: u32,
    afternoon_start: u32,
    night_start: u32,
}

impl Default for ShiftSchedule {
    /// Night 21-06, Morning 06-13, Afternoon 13-21.
    fn default() -> Self {
        ShiftSchedule {
            morning_start: 6,
            afternoon_start: 13,
            night_start: 21,
        }
    }
}

/// One concrete occurrence of a shift: the label and the calendar day it
/// started on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ShiftInstance {
    pub label: ShiftLabel,
    pub date: NaiveDate,
}

impl ShiftSchedule {
    pub fn new(morning_start: u32, afternoon_start: u32, night_start: u32) -> Result<Self, ScheduleError> {
        let schedule = ShiftSchedule {
            morning_start,
            afternoon_start,
            night_start,
        };

        for (label, hour) in schedule.starts() {
            if hour > 23 {
                return Err(ScheduleError::HourOutOfRange {
                    label: label.as_str(),
                    hour,
                });
            }
        }

        let [a, b, c] = schedule.ordered();
        if a.1 == b.1 || b.1 == c.1 {
            let hour = if a.1 == b.1 { a.1 } else { b.1 };
            return Err(ScheduleError::DuplicateStart(hour));
        }

        Ok(schedule)
    }

    pub fn start_of(&self, label: ShiftLabel) -> u32 {
        match label {
            ShiftLabel::Morning => self.morning_start,
            ShiftLabel::Afternoon => self.afternoon_start,
            ShiftLabel::Night => self.night_start,
        }
    }

    fn starts(&self) -> [(ShiftLabel, u32); 3] {
        ShiftLabel::ALL.map(|label| (label, self.start_of(label)))
    }

    /// Shifts in the order they begin within a calendar day.
    fn ordered(&self) -> [(ShiftLabel, u32); 3] {
        let mut starts = self.starts();
        starts.sort_by_key(|&(_, hour)| hour);
        starts
    }

    pub fn label_for(&self, at: NaiveDateTime) -> ShiftLabel {
        self.instance(at).label
    }

    pub fn instance(&self, at: NaiveDateTime) -> ShiftInstance {
        let hour = at.hour();
        let ordered = self.ordered();

        match ordered.iter().rev().find(|&&(_, start)| start <= hour) {
            Some(&(label, _)) => ShiftInstance {
                label,
                date: at.date(),
            },
            // before the first start of the day: still in the shift that
            // began the evening before
            None => ShiftInstance {
                label: ordered[2].0,
                date: day_before(at.date()),
            },
        }
    }

    /// Where to look for the snapshot preceding one taken at `at`: the shift
    /// before it on the same calendar day, or on the day before when `at`
    /// falls after midnight inside the shift that wraps.
    pub fn preceding_window(&self, at: NaiveDateTime) -> (ShiftLabel, NaiveDate) {
        let ordered = self.ordered();
        let label = self.label_for(at);
        let position = ordered
            .iter()
            .position(|&(l, _)| l == label)
            .unwrap_or(0);

        let previous = if position == 0 {
            ordered[2].0
        } else {
            ordered[position - 1].0
        };
        let date = if position == 2 && at.hour() < ordered[0].1 {
            day_before(at.date())
        } else {
            at.date()
        };

        (previous, date)
    }

    /// The shift instance that ran immediately before `instance`.
    pub fn previous(&self, instance: ShiftInstance) -> ShiftInstance {
        let ordered = self.ordered();
        let position = ordered
            .iter()
            .position(|&(label, _)| label == instance.label)
            .unwrap_or(0);

        if position == 0 {
            ShiftInstance {
                label: ordered[2].0,
                date: day_before(instance.date),
            }
        } else {
            ShiftInstance {
                label: ordered[position - 1].0,
                date: instance.date,
            }
        }
    }
}

fn day_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftPair<'a> {
    pub current: Option<&'a RawFile>,
    pub previous: Option<&'a RawFile>,
}

/// Pick the newest file and the newest file of the window before it, as
/// given by [`ShiftSchedule::preceding_window`].
///
/// Falls back to the second newest file when that window has no snapshot.
pub fn resolve_shift_pair<'a>(files: &'a [RawFile], schedule: &ShiftSchedule) -> ShiftPair<'a> {
    let ordered = newest_first(files);
    let Some((&current, rest)) = ordered.split_first() else {
        return ShiftPair::default();
    };

    let (label, date) = schedule.preceding_window(current.timestamp);
    let previous = rest
        .iter()
        .copied()
        .find(|f| f.timestamp.date() == date && schedule.label_for(f.timestamp) == label)
        .or_else(|| rest.first().copied());

    ShiftPair {
        current: Some(current),
        previous,
    }
}

/// Files of the most recent occurrence of `label`, newest first.
pub fn files_in_latest_instance<'a>(
    files: &'a [RawFile],
    schedule: &ShiftSchedule,
    label: ShiftLabel,
) -> Vec<&'a RawFile> {
    let mut matching = newest_first(files)
        .into_iter()
        .map(|f| (schedule.instance(f.timestamp), f))
        .filter(|(instance, _)| instance.label == label)
        .peekable();

    let Some(&(latest, _)) = matching.peek() else {
        return Vec::new();
    };

    matching
        .take_while(|(instance, _)| *instance == latest)
        .map(|(_, f)| f)
        .collect()
}

/// Display details for the file backing one side of a comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftInfo {
    pub name: String,
    pub shift: ShiftLabel,
    pub shift_date: NaiveDate,
    pub taken_at: NaiveDateTime,
}

impl ShiftInfo {
    pub fn describe(file: &RawFile, schedule: &ShiftSchedule) -> Self {
        let instance = schedule.instance(file.timestamp);
        ShiftInfo {
            name: file.name.clone(),
            shift: instance.label,
            shift_date: instance.date,
            taken_at: file.timestamp,
        }
    }

    /// `dd/mm/yyyy HH:MM`
    pub fn display_time(&self) -> String {
        self.taken_at.format("%d/%m/%Y %H:%M").to_string()
    }
}
