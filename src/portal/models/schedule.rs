//! Timetable records.

use serde::{Deserialize, Serialize};

use crate::portal::normalize::periods::{PeriodRange, ScheduleTable};
use crate::portal::normalize::timetable::ReconcileReport;
use crate::portal::normalize::values::{self, Loose, NumberOrText};
use crate::portal::normalize::weeks::decode_weeks;

/// `kbList` row as served by the timetable endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawScheduleRow {
    pub kch_id: Option<Loose>,
    pub kcmc: Option<Loose>,
    pub xm: Option<Loose>,
    pub jxbmc: Option<Loose>,
    pub xf: Option<Loose>,
    pub xqj: Option<Loose>,
    pub jc: Option<Loose>,
    pub zcd: Option<Loose>,
    pub khfsmc: Option<Loose>,
    pub xqmc: Option<Loose>,
    pub cdmc: Option<Loose>,
    pub kcxszc: Option<Loose>,
    pub zhxs: Option<Loose>,
    pub zxs: Option<Loose>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStudentHeader {
    #[serde(rename = "XH")]
    pub xh: Option<Loose>,
    #[serde(rename = "XM")]
    pub xm: Option<Loose>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawExtraCourse {
    pub qtkcgs: Option<Loose>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSchedulePayload {
    #[serde(rename = "kbList")]
    pub kb_list: Vec<RawScheduleRow>,
    pub xsxx: RawStudentHeader,
    #[serde(rename = "sjkList")]
    pub sjk_list: Vec<RawExtraCourse>,
}

/// One weekly meeting of a course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub course_id: Option<String>,
    pub title: Option<String>,
    pub teacher: Option<String>,
    pub class_name: Option<String>,
    pub credit: Option<String>,
    /// 1 = Monday.
    pub weekday: Option<u8>,
    /// Display window such as `"8:00~9:25"`.
    pub time: Option<String>,
    /// Raw period code, e.g. `"1-2节"`.
    pub sessions: Option<String>,
    pub list_sessions: Vec<u32>,
    /// Raw week code, e.g. `"1-16周(单)"`.
    pub weeks: Option<String>,
    pub list_weeks: Vec<u32>,
    pub evaluation_mode: Option<String>,
    pub campus: Option<String>,
    pub place: Option<String>,
    pub hours_composition: Option<String>,
    pub weekly_hours: Option<NumberOrText>,
    pub total_hours: Option<NumberOrText>,
}

impl ScheduleEntry {
    pub fn from_raw(row: &RawScheduleRow, table: &ScheduleTable) -> Self {
        let sessions = values::text(&row.jc);
        let weeks = values::text(&row.zcd);
        let mut entry = Self {
            course_id: values::text(&row.kch_id),
            title: values::text(&row.kcmc),
            teacher: values::text(&row.xm),
            class_name: values::text(&row.jxbmc),
            credit: values::one_decimal(&row.xf),
            weekday: row
                .xqj
                .as_ref()
                .and_then(Loose::as_i64)
                .and_then(|d| u8::try_from(d).ok()),
            time: None,
            sessions: None,
            list_sessions: Vec::new(),
            list_weeks: weeks.as_deref().map(decode_weeks).unwrap_or_default(),
            weeks,
            evaluation_mode: values::text(&row.khfsmc),
            campus: values::text(&row.xqmc),
            place: values::text(&row.cdmc),
            hours_composition: values::text(&row.kcxszc),
            weekly_hours: values::number_or_text(&row.zhxs),
            total_hours: values::number_or_text(&row.zxs),
        };
        match sessions.as_deref().and_then(PeriodRange::parse) {
            Some(range) => {
                entry.sessions = sessions;
                entry.list_sessions = range.periods();
                entry.time = table.window(range);
            }
            None => entry.sessions = sessions,
        }
        entry
    }

    /// Replace the period code and re-derive everything computed from it.
    pub fn assign_periods(&mut self, range: PeriodRange, table: &ScheduleTable) {
        self.sessions = Some(range.code());
        self.list_sessions = range.periods();
        self.time = table.window(range);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub sid: Option<String>,
    pub name: Option<String>,
    pub year: i32,
    pub term: u8,
    pub count: usize,
    pub courses: Vec<ScheduleEntry>,
    /// Free-text practical courses listed outside the grid.
    pub extra_courses: Vec<String>,
    pub reconciliation: ReconcileReport,
}
