//! Grade and exam records.

use serde::{Deserialize, Serialize};

use crate::portal::normalize::values::{self, Loose, NumberOrText};

/// `items` row of the grade query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawGradeRow {
    pub xh: Option<Loose>,
    pub xm: Option<Loose>,
    pub kch_id: Option<Loose>,
    pub kcmc: Option<Loose>,
    pub jsxm: Option<Loose>,
    pub jxbmc: Option<Loose>,
    pub xf: Option<Loose>,
    pub kclbmc: Option<Loose>,
    pub kcxzmc: Option<Loose>,
    pub cj: Option<Loose>,
    pub jd: Option<Loose>,
    pub ksxz: Option<Loose>,
    pub kkbmmc: Option<Loose>,
    pub kcbj: Option<Loose>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeEntry {
    pub course_id: Option<String>,
    pub title: Option<String>,
    pub teacher: Option<String>,
    pub class_name: Option<String>,
    pub credit: Option<String>,
    pub category: Option<String>,
    pub nature: Option<String>,
    /// Numeric score, or a grade band such as `"优秀"`.
    pub grade: Option<NumberOrText>,
    pub grade_point: Option<String>,
    pub grade_nature: Option<String>,
    pub start_college: Option<String>,
    pub mark: Option<String>,
}

impl From<&RawGradeRow> for GradeEntry {
    fn from(row: &RawGradeRow) -> Self {
        Self {
            course_id: values::text(&row.kch_id),
            title: values::text(&row.kcmc),
            teacher: values::text(&row.jsxm),
            class_name: values::text(&row.jxbmc),
            credit: values::one_decimal(&row.xf),
            category: values::text(&row.kclbmc),
            nature: values::text(&row.kcxzmc),
            grade: values::number_or_text(&row.cj),
            grade_point: values::one_decimal(&row.jd),
            grade_nature: values::text(&row.ksxz),
            start_college: values::text(&row.kkbmmc),
            mark: values::text(&row.kcbj),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeReport {
    pub sid: Option<String>,
    pub name: Option<String>,
    /// `None` when every academic year was queried.
    pub year: Option<i32>,
    pub term: u8,
    pub count: usize,
    pub courses: Vec<GradeEntry>,
}

/// `items` row of the exam query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawExamRow {
    pub xh: Option<Loose>,
    pub xm: Option<Loose>,
    pub kch: Option<Loose>,
    pub kcmc: Option<Loose>,
    pub kssj: Option<Loose>,
    pub cdmc: Option<Loose>,
    pub cdxqmc: Option<Loose>,
    pub zwh: Option<Loose>,
    pub cxbj: Option<Loose>,
    pub ksmc: Option<Loose>,
    pub jsxx: Option<Loose>,
    pub jxbmc: Option<Loose>,
    pub kkxy: Option<Loose>,
    pub xf: Option<Loose>,
    pub ksfs: Option<Loose>,
    pub sjbh: Option<Loose>,
    pub bz1: Option<Loose>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamEntry {
    pub course_id: Option<String>,
    pub title: Option<String>,
    /// Date and time window as the portal prints it.
    pub time: Option<String>,
    pub location: Option<String>,
    pub campus: Option<String>,
    pub seat: Option<String>,
    /// Resit marker; empty when not a resit.
    pub resit_mark: String,
    pub exam_name: Option<String>,
    pub teacher: Option<String>,
    pub class_name: Option<String>,
    pub college: Option<String>,
    pub credit: Option<String>,
    pub method: Option<String>,
    pub paper_number: Option<String>,
    pub remark: String,
}

impl From<&RawExamRow> for ExamEntry {
    fn from(row: &RawExamRow) -> Self {
        Self {
            course_id: values::text(&row.kch),
            title: values::text(&row.kcmc),
            time: values::text(&row.kssj),
            location: values::text(&row.cdmc),
            campus: values::text(&row.cdxqmc),
            seat: values::text(&row.zwh),
            resit_mark: values::text(&row.cxbj).unwrap_or_default(),
            exam_name: values::text(&row.ksmc),
            teacher: values::text(&row.jsxx),
            class_name: values::text(&row.jxbmc),
            college: values::text(&row.kkxy),
            credit: values::one_decimal(&row.xf),
            method: values::text(&row.ksfs),
            paper_number: values::text(&row.sjbh),
            remark: values::text(&row.bz1).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamReport {
    pub sid: Option<String>,
    pub name: Option<String>,
    pub year: i32,
    pub term: u8,
    pub count: usize,
    pub courses: Vec<ExamEntry>,
}
