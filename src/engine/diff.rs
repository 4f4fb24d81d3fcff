//! Snapshot comparison engine.
//!
//! Compares the current shift snapshot with the previous one by roll id:
//! - a roll that shows up as a balance, or turns from complete into a
//!   balance, was generated
//! - a balance roll that is gone from the current snapshot was consumed
//! - everything else is unchanged
//!
//! Duplicate roll ids within one snapshot resolve to the last row seen.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::normalize::{Completion, ItemRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transition {
    Generated,
    Consumed,
    Unchanged,
}

impl Transition {
    pub fn delta(self) -> i64 {
        match self {
            Transition::Generated => 1,
            Transition::Consumed => -1,
            Transition::Unchanged => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemTransition {
    pub roll_id: String,
    pub transition: Transition,
}

/// Counts of generated and consumed rolls. `consumed` is never positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransitionSummary {
    pub generated: i64,
    pub consumed: i64,
}

impl TransitionSummary {
    pub fn net(&self) -> i64 {
        self.generated + self.consumed
    }
}

/// Roll ids in first-seen order with their last-seen completion.
struct CompletionIndex<'a> {
    order: Vec<&'a str>,
    by_id: HashMap<&'a str, Completion>,
}

impl<'a> CompletionIndex<'a> {
    fn build(records: &'a [ItemRecord]) -> Self {
        let mut order = Vec::new();
        let mut by_id = HashMap::with_capacity(records.len());

        for record in records {
            if by_id.insert(record.roll_id.as_str(), record.completion).is_none() {
                order.push(record.roll_id.as_str());
            }
        }

        CompletionIndex { order, by_id }
    }

    fn get(&self, id: &str) -> Option<Completion> {
        self.by_id.get(id).copied()
    }
}

/// Classify every roll id seen in either snapshot.
///
/// Current ids come first in their original order, followed by ids only
/// present in `previous`. Either side being empty yields no transitions.
pub fn classify(current: &[ItemRecord], previous: &[ItemRecord]) -> Vec<ItemTransition> {
    if current.is_empty() || previous.is_empty() {
        return Vec::new();
    }

    let now = CompletionIndex::build(current);
    let before = CompletionIndex::build(previous);
    let mut transitions = Vec::with_capacity(now.order.len());

    for &id in &now.order {
        let transition = match (now.get(id), before.get(id)) {
            (Some(Completion::Balance), None) => Transition::Generated,
            (Some(Completion::Balance), Some(Completion::Complete)) => Transition::Generated,
            _ => Transition::Unchanged,
        };

        transitions.push(ItemTransition {
            roll_id: id.to_string(),
            transition,
        });
    }

    let seen: HashSet<&str> = now.order.iter().copied().collect();
    for &id in &before.order {
        if seen.contains(id) {
            continue;
        }

        let transition = match before.get(id) {
            Some(Completion::Balance) => Transition::Consumed,
            _ => Transition::Unchanged,
        };

        transitions.push(ItemTransition {
            roll_id: id.to_string(),
            transition,
        });
    }

    transitions
}

/// Summarize the transitions between two snapshots.
pub fn diff(current: &[ItemRecord], previous: &[ItemRecord]) -> TransitionSummary {
    classify(current, previous)
        .iter()
        .fold(TransitionSummary::default(), |mut summary, item| {
            match item.transition {
                Transition::Generated => summary.generated += 1,
                Transition::Consumed => summary.consumed -= 1,
                Transition::Unchanged => {}
            }
            summary
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 21)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap()
    }

    fn roll(id: &str, completion: Completion) -> ItemRecord {
        ItemRecord {
            roll_id: id.to_string(),
            paper_code: "X".to_string(),
            width: "100".to_string(),
            status: "STOCK".to_string(),
            completion,
            taken_at: at(),
        }
    }

    use Completion::{Balance, Complete};

    #[test]
    fn balance_reopened_and_balance_gone() {
        let current = vec![roll("A", Balance), roll("B", Complete)];
        let previous = vec![roll("A", Complete), roll("C", Balance)];

        let summary = diff(&current, &previous);
        assert_eq!(summary, TransitionSummary { generated: 1, consumed: -1 });
        assert_eq!(summary.net(), 0);

        let items = classify(&current, &previous);
        let by_id: Vec<(&str, Transition)> = items.iter().map(|t| (t.roll_id.as_str(), t.transition)).collect();
        assert_eq!(
            by_id,
            vec![
                ("A", Transition::Generated),
                ("B", Transition::Unchanged),
                ("C", Transition::Consumed),
            ]
        );
    }

    #[test]
    fn identical_snapshots_have_no_transitions() {
        let snapshot = vec![roll("A", Balance)];
        assert_eq!(diff(&snapshot, &snapshot), TransitionSummary::default());
    }

    #[test]
    fn balance_to_balance_is_unchanged() {
        let current = vec![roll("A", Balance)];
        let previous = vec![roll("A", Balance), roll("B", Complete)];
        assert_eq!(diff(&current, &previous), TransitionSummary::default());
    }

    #[test]
    fn balance_turning_complete_is_not_consumption() {
        let current = vec![roll("A", Complete)];
        let previous = vec![roll("A", Balance)];
        assert_eq!(diff(&current, &previous), TransitionSummary::default());
    }

    #[test]
    fn disjoint_snapshots_count_every_balance() {
        let current = vec![roll("A", Balance), roll("B", Balance), roll("C", Complete)];
        let previous = vec![roll("X", Balance), roll("Y", Complete)];
        assert_eq!(diff(&current, &previous), TransitionSummary { generated: 2, consumed: -1 });
    }

    #[test]
    fn empty_side_yields_zero() {
        let snapshot = vec![roll("A", Balance)];
        assert_eq!(diff(&snapshot, &[]), TransitionSummary::default());
        assert_eq!(diff(&[], &snapshot), TransitionSummary::default());
        assert!(classify(&[], &[]).is_empty());
    }

    #[test]
    fn duplicate_ids_use_last_row() {
        let current = vec![roll("A", Complete), roll("A", Balance)];
        let previous = vec![roll("A", Balance), roll("A", Complete)];

        let items = classify(&current, &previous);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].transition, Transition::Generated);
    }

    #[test]
    fn transition_deltas() {
        assert_eq!(Transition::Generated.delta(), 1);
        assert_eq!(Transition::Consumed.delta(), -1);
        assert_eq!(Transition::Unchanged.delta(), 0);
    }
}
