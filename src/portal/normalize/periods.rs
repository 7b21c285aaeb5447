//! Class-period codes (`"1-2节"`) and the daily schedule table.

use std::sync::LazyLock;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

static DIGITS: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\d+").expect("static regex"));

/// All digit runs in `code`, in order.
pub(crate) fn numbers(code: &str) -> Vec<u32> {
    DIGITS
        .find_iter(code)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Start and end of one numbered class period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Daily period table, 1-based by period number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTable {
    slots: Vec<ClassSlot>,
}

const DEFAULT_SLOTS: [(u32, u32, u32, u32); 13] = [
    (8, 0, 8, 40),
    (8, 45, 9, 25),
    (9, 30, 10, 10),
    (10, 30, 11, 10),
    (11, 15, 11, 55),
    (14, 30, 15, 10),
    (15, 15, 15, 55),
    (16, 5, 16, 45),
    (16, 50, 17, 30),
    (18, 40, 19, 20),
    (19, 25, 20, 5),
    (20, 10, 20, 50),
    (20, 55, 21, 35),
];

impl Default for ScheduleTable {
    fn default() -> Self {
        let slots = DEFAULT_SLOTS
            .iter()
            .filter_map(|&(sh, sm, eh, em)| {
                Some(ClassSlot {
                    start: NaiveTime::from_hms_opt(sh, sm, 0)?,
                    end: NaiveTime::from_hms_opt(eh, em, 0)?,
                })
            })
            .collect();
        Self { slots }
    }
}

impl ScheduleTable {
    pub fn new(slots: Vec<ClassSlot>) -> Self {
        Self { slots }
    }

    /// Build from `"H:MM"` pairs.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, S)]) -> Result<Self, chrono::ParseError> {
        let slots = pairs
            .iter()
            .map(|(start, end)| {
                Ok(ClassSlot {
                    start: NaiveTime::parse_from_str(start.as_ref(), "%H:%M")?,
                    end: NaiveTime::parse_from_str(end.as_ref(), "%H:%M")?,
                })
            })
            .collect::<Result<Vec<_>, chrono::ParseError>>()?;
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, period: u32) -> Option<ClassSlot> {
        let idx = usize::try_from(period).ok()?.checked_sub(1)?;
        self.slots.get(idx).copied()
    }

    /// `"start~end"` for periods `first..=last`, or `None` when either is off the table.
    pub fn window(&self, range: PeriodRange) -> Option<String> {
        let start = self.slot(range.first)?.start;
        let end = self.slot(range.last)?.end;
        Some(format!("{}~{}", start.format("%-H:%M"), end.format("%-H:%M")))
    }
}

/// Inclusive range of class periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodRange {
    pub first: u32,
    pub last: u32,
}

impl PeriodRange {
    /// Parse `"a-b节"`; a single number is a one-period range.
    ///
    /// Only the first range in the code is considered.
    pub fn parse(code: &str) -> Option<Self> {
        let nums = numbers(code);
        let (first, last) = match nums.as_slice() {
            [] => return None,
            [only] => (*only, *only),
            [a, b, ..] => (*a, *b),
        };
        (first <= last).then_some(Self { first, last })
    }

    pub fn periods(self) -> Vec<u32> {
        (self.first..=self.last).collect()
    }

    pub fn len(self) -> u32 {
        self.last - self.first + 1
    }

    pub fn code(self) -> String {
        format!("{}-{}节", self.first, self.last)
    }
}
