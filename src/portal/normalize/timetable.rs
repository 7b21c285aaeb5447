//! Reconciliation of timetable slots the portal reports merged.
//!
//! When a course meets twice on the same day in the same weeks, some
//! deployments return two rows that both carry the combined four-period code
//! (`"1-4节"` or `"1-2节,3-4节"`). The rows are paired up and each one is given
//! its own half.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::periods::{PeriodRange, ScheduleTable, numbers};
use crate::portal::models::schedule::ScheduleEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Pairs whose period codes were split.
    pub split_pairs: usize,
    /// Duplicate slots were found but could not be paired; entries are untouched.
    pub unresolved: bool,
}

/// The two halves of a four-period code, or `None` for any other shape.
fn halves(code: &str) -> Option<(PeriodRange, PeriodRange)> {
    match numbers(code).as_slice() {
        [a, b, c, d] => Some((
            PeriodRange { first: *a, last: *b },
            PeriodRange { first: *c, last: *d },
        )),
        _ => {
            let range = PeriodRange::parse(code)?;
            (range.len() == 4).then_some((
                PeriodRange {
                    first: range.first,
                    last: range.first + 1,
                },
                PeriodRange {
                    first: range.first + 2,
                    last: range.last,
                },
            ))
        }
    }
}

/// Split merged four-period slots in place.
///
/// Entries are grouped by course id, weekday and raw week code. If the number
/// of entries sharing a group is odd, nothing is changed and the report is
/// flagged; otherwise members of each group are paired in order and every
/// pair whose codes both span four periods is split first-half/second-half.
pub fn reconcile(entries: &mut [ScheduleEntry], table: &ScheduleTable) -> ReconcileReport {
    let mut groups: HashMap<(Option<&str>, Option<u8>, Option<&str>), Vec<usize>> = HashMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        groups
            .entry((
                entry.course_id.as_deref(),
                entry.weekday,
                entry.weeks.as_deref(),
            ))
            .or_default()
            .push(idx);
    }

    let mut duplicated: Vec<Vec<usize>> = groups
        .into_values()
        .filter(|members| members.len() > 1)
        .collect();
    let participants: usize = duplicated.iter().map(Vec::len).sum();

    if participants % 2 != 0 || duplicated.iter().any(|m| m.len() % 2 != 0) {
        warn!(participants, "odd number of duplicated timetable slots, leaving them as-is");
        return ReconcileReport {
            split_pairs: 0,
            unresolved: true,
        };
    }

    duplicated.sort_by_key(|members| members[0]);

    let mut split_pairs = 0;
    for members in duplicated {
        for pair in members.chunks_exact(2) {
            let (first, second) = (pair[0], pair[1]);
            let first_halves = entries[first].sessions.as_deref().and_then(halves);
            let second_halves = entries[second].sessions.as_deref().and_then(halves);
            let (Some((head, _)), Some((_, tail))) = (first_halves, second_halves) else {
                continue;
            };

            debug!(
                course = entries[first].course_id.as_deref().unwrap_or_default(),
                first = head.code(),
                second = tail.code(),
                "splitting merged timetable slot"
            );
            entries[first].assign_periods(head, table);
            entries[second].assign_periods(tail, table);
            split_pairs += 1;
        }
    }

    ReconcileReport {
        split_pairs,
        unresolved: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::models::schedule::RawScheduleRow;

    fn entry(course: &str, weekday: u8, sessions: &str, weeks: &str) -> ScheduleEntry {
        let row: RawScheduleRow = serde_json::from_value(serde_json::json!({
            "kch_id": course, "kcmc": "课程", "xqj": weekday.to_string(),
            "jc": sessions, "zcd": weeks,
        }))
        .unwrap();
        ScheduleEntry::from_raw(&row, &ScheduleTable::default())
    }

    #[test]
    fn test_halves() {
        assert_eq!(
            halves("1-4节"),
            Some((PeriodRange { first: 1, last: 2 }, PeriodRange { first: 3, last: 4 }))
        );
        assert_eq!(
            halves("6-7节,8-9节"),
            Some((PeriodRange { first: 6, last: 7 }, PeriodRange { first: 8, last: 9 }))
        );
        assert_eq!(halves("1-2节"), None);
        assert_eq!(halves("1-3节"), None);
    }

    #[test]
    fn test_matching_pair_is_split() {
        let table = ScheduleTable::default();
        let mut entries = vec![
            entry("C1", 2, "1-4节", "1-16周"),
            entry("C2", 2, "6-7节", "1-16周"),
            entry("C1", 2, "1-4节", "1-16周"),
        ];

        let report = reconcile(&mut entries, &table);
        assert_eq!(report, ReconcileReport { split_pairs: 1, unresolved: false });

        assert_eq!(entries[0].sessions.as_deref(), Some("1-2节"));
        assert_eq!(entries[0].list_sessions, vec![1, 2]);
        assert_eq!(entries[0].time.as_deref(), Some("8:00~9:25"));
        assert_eq!(entries[2].sessions.as_deref(), Some("3-4节"));
        assert_eq!(entries[2].list_sessions, vec![3, 4]);
        assert_eq!(entries[2].time.as_deref(), Some("9:30~11:10"));

        // untouched
        assert_eq!(entries[1].sessions.as_deref(), Some("6-7节"));
    }

    #[test]
    fn test_odd_count_leaves_data_unchanged() {
        let table = ScheduleTable::default();
        let mut entries = vec![
            entry("C1", 2, "1-4节", "1-16周"),
            entry("C1", 2, "1-4节", "1-16周"),
            entry("C1", 2, "1-4节", "1-16周"),
        ];
        let before = entries.clone();

        let report = reconcile(&mut entries, &table);
        assert!(report.unresolved);
        assert_eq!(report.split_pairs, 0);
        assert_eq!(entries, before);
    }

    #[test]
    fn test_different_weeks_are_not_paired() {
        let table = ScheduleTable::default();
        let mut entries = vec![
            entry("C1", 2, "1-4节", "1-8周"),
            entry("C1", 2, "1-4节", "9-16周"),
        ];
        let report = reconcile(&mut entries, &table);
        assert_eq!(report, ReconcileReport::default());
        assert_eq!(entries[0].sessions.as_deref(), Some("1-4节"));
    }

    #[test]
    fn test_pair_without_four_periods_is_skipped() {
        let table = ScheduleTable::default();
        let mut entries = vec![
            entry("C1", 4, "1-2节", "1-16周"),
            entry("C1", 4, "3-4节", "1-16周"),
        ];
        let report = reconcile(&mut entries, &table);
        assert_eq!(report.split_pairs, 0);
        assert!(!report.unresolved);
        assert_eq!(entries[1].sessions.as_deref(), Some("3-4节"));
    }
}
