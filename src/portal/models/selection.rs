//! Course-selection records.

use serde::{Deserialize, Serialize};

use crate::portal::normalize::values::{self, Loose};

/// Row of the selected-courses list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSelectedRow {
    pub kch: Option<Loose>,
    pub jxb_id: Option<Loose>,
    pub do_jxb_id: Option<Loose>,
    pub kcmc: Option<Loose>,
    pub jsxx: Option<Loose>,
    pub xf: Option<Loose>,
    pub kklxmc: Option<Loose>,
    pub jxbrs: Option<Loose>,
    pub yxzrs: Option<Loose>,
    pub jxdd: Option<Loose>,
    pub sksj: Option<Loose>,
    pub zixf: Option<Loose>,
    pub sxbj: Option<Loose>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedCourseEntry {
    pub course_id: Option<String>,
    pub class_id: Option<String>,
    pub do_id: Option<String>,
    pub title: Option<String>,
    pub teacher_id: Option<String>,
    pub teacher: Option<String>,
    pub credit: f64,
    pub category: Option<String>,
    pub capacity: i64,
    pub selected_number: i64,
    pub place: Option<String>,
    pub time: Option<String>,
    pub optional: i64,
    pub waiting: Option<String>,
}

impl From<&RawSelectedRow> for SelectedCourseEntry {
    fn from(row: &RawSelectedRow) -> Self {
        let (teacher_id, teacher) = values::split_teacher(&row.jsxx);
        Self {
            course_id: values::text(&row.kch),
            class_id: values::text(&row.jxb_id),
            do_id: values::text(&row.do_jxb_id),
            title: values::text(&row.kcmc),
            teacher_id,
            teacher,
            credit: credit(&row.xf),
            category: values::text(&row.kklxmc),
            capacity: values::count(&row.jxbrs),
            selected_number: values::count(&row.yxzrs),
            place: values::first_place(&row.jxdd),
            time: values::joined_times(&row.sksj),
            optional: values::count(&row.zixf),
            waiting: values::text(&row.sxbj),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedCourses {
    pub year: i32,
    pub term: u8,
    pub count: usize,
    pub courses: Vec<SelectedCourseEntry>,
}

/// Row of the block catalog (`tmpList`) or a course's class list (`jxbList`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCatalogRow {
    pub kch_id: Option<Loose>,
    pub jxb_id: Option<Loose>,
    pub do_jxb_id: Option<Loose>,
    pub kcmc: Option<Loose>,
    pub jxbmc: Option<Loose>,
    pub jsxx: Option<Loose>,
    pub xf: Option<Loose>,
    pub kklxmc: Option<Loose>,
    pub jxbrl: Option<Loose>,
    pub yxzrs: Option<Loose>,
    pub jxdd: Option<Loose>,
    pub sksj: Option<Loose>,
    pub zcsm: Option<Loose>,
    pub xqmc: Option<Loose>,
    pub sfkx: Option<Loose>,
    pub xkbz: Option<Loose>,
}

/// A class that can be selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectableCourseEntry {
    pub course_id: Option<String>,
    pub class_id: Option<String>,
    pub do_id: Option<String>,
    pub title: Option<String>,
    pub class_name: Option<String>,
    pub teacher_id: Option<String>,
    pub teacher: Option<String>,
    pub credit: f64,
    pub category: Option<String>,
    pub capacity: i64,
    pub selected_number: i64,
    /// `capacity - selected_number`; negative when the class is oversubscribed.
    pub available: i64,
    pub place: Option<String>,
    pub time: Option<String>,
    pub weeks: Option<String>,
    pub campus: Option<String>,
    pub optional: bool,
    pub note: Option<String>,
}

impl From<&RawCatalogRow> for SelectableCourseEntry {
    fn from(row: &RawCatalogRow) -> Self {
        let (teacher_id, teacher) = values::split_teacher(&row.jsxx);
        let capacity = values::count(&row.jxbrl);
        let selected_number = values::count(&row.yxzrs);
        Self {
            course_id: values::text(&row.kch_id),
            class_id: values::text(&row.jxb_id),
            do_id: values::text(&row.do_jxb_id),
            title: values::text(&row.kcmc),
            class_name: values::text(&row.jxbmc),
            teacher_id,
            teacher,
            credit: credit(&row.xf),
            category: values::text(&row.kklxmc),
            capacity,
            selected_number,
            available: capacity.saturating_sub(selected_number),
            place: values::text(&row.jxdd),
            time: values::text(&row.sksj),
            weeks: values::text(&row.zcsm),
            campus: values::text(&row.xqmc),
            optional: values::text(&row.sfkx).as_deref() == Some("1"),
            note: values::text(&row.xkbz),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockCatalog {
    pub year: i32,
    pub term: u8,
    pub block: u32,
    pub count: usize,
    pub pages: u32,
    pub courses: Vec<SelectableCourseEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseClasses {
    pub year: i32,
    pub term: u8,
    pub course_id: String,
    pub count: usize,
    pub classes: Vec<SelectableCourseEntry>,
}

/// Outcome of a drop request; the portal answers with a bare status number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropResult {
    pub status: String,
}

fn credit(field: &Option<Loose>) -> f64 {
    values::text(field)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}
