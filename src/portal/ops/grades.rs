use serde_json::Value;
use tracing::debug;

use crate::portal::PortalClient;
use crate::portal::endpoints::Endpoint;
use crate::portal::envelope::Envelope;
use crate::portal::errors::PortalError;
use crate::portal::models::grades::{ExamEntry, ExamReport, GradeEntry, GradeReport, RawExamRow, RawGradeRow};
use crate::portal::normalize::values;
use crate::portal::session::HeaderProfile;

use super::{Form, QueryPage};

/// Position of the GPA among the `font[size='2px']` figures of the academic-progress page.
const GPA_FONT_INDEX: usize = 2;

impl PortalClient {
    /// Final grades for `year` (every year when `None`) and `term` (0 for the whole year).
    pub async fn grades(&mut self, year: Option<i32>, term: u8) -> Envelope<GradeReport> {
        Envelope::from_result(self.fetch_grades(year, term).await, "获取成绩成功")
    }

    /// Per-component grade rows, passed through as the portal serves them.
    pub async fn grade_details(&mut self, year: i32, term: u8) -> Envelope<Vec<Value>> {
        Envelope::from_result(self.fetch_grade_details(year, term).await, "获取详细成绩成功")
    }

    pub async fn exams(&mut self, year: i32, term: u8) -> Envelope<ExamReport> {
        Envelope::from_result(self.fetch_exams(year, term).await, "获取考试信息成功")
    }

    pub async fn gpa(&mut self) -> Envelope<f64> {
        Envelope::from_result(self.fetch_gpa().await, "获取GPA成功")
    }

    async fn fetch_grades(&mut self, year: Option<i32>, term: u8) -> Result<GradeReport, PortalError> {
        let (url, referer) = self.resolver.resolve_query(Endpoint::Grades)?;
        let form = Form::new()
            .field("xnm", year.map(|y| y.to_string()).unwrap_or_default())
            .field("xqm", self.term_parameter(term))
            .field("sfzgcj", "")
            .field("kcbj", "")
            .query_model(15, " ", "asc");

        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Ajax { referer: &referer })
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        let rows = response.json::<QueryPage<RawGradeRow>>()?.non_empty()?;
        debug!(count = rows.len(), year = ?year, term, "grades fetched");
        let first = &rows[0];
        Ok(GradeReport {
            sid: values::text(&first.xh),
            name: values::text(&first.xm),
            year,
            term,
            count: rows.len(),
            courses: rows.iter().map(GradeEntry::from).collect(),
        })
    }

    async fn fetch_grade_details(&mut self, year: i32, term: u8) -> Result<Vec<Value>, PortalError> {
        let (url, referer) = self.resolver.resolve_query(Endpoint::GradeDetails)?;
        let form = Form::new()
            .field("xnm", year.to_string())
            .field("xqm", self.term_parameter(term))
            .query_model(100, "", "asc");

        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Ajax { referer: &referer })
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        let rows = response.json::<QueryPage<Value>>()?.non_empty()?;
        debug!(count = rows.len(), year, term, "grade details fetched");
        Ok(rows)
    }

    async fn fetch_exams(&mut self, year: i32, term: u8) -> Result<ExamReport, PortalError> {
        let (url, _) = self.resolver.resolve_query(Endpoint::Exams)?;
        let form = Form::new()
            .field("xnm", year.to_string())
            .field("xqm", self.term_parameter(term))
            .query_model(100, "", "asc");

        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Page)
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        let rows = response.json::<QueryPage<RawExamRow>>()?.non_empty()?;
        debug!(count = rows.len(), year, term, "exams fetched");
        let first = &rows[0];
        Ok(ExamReport {
            sid: values::text(&first.xh),
            name: values::text(&first.xm),
            year,
            term,
            count: rows.len(),
            courses: rows.iter().map(ExamEntry::from).collect(),
        })
    }

    async fn fetch_gpa(&mut self) -> Result<f64, PortalError> {
        let url = self.resolver.resolve(Endpoint::Gpa)?;
        let response = self
            .session
            .get(&url, HeaderProfile::Page)
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        let doc = response.document();
        let figures = doc.select("font[size='2px']");
        let Some(text) = figures.get(GPA_FONT_INDEX).map(|n| n.text()) else {
            debug!(found = figures.len(), "academic-progress page shows no GPA");
            return Err(PortalError::Empty);
        };
        text.trim()
            .parse()
            .map_err(|_| PortalError::protocol(format!("GPA figure '{}' is not a number", text.trim())))
    }
}
