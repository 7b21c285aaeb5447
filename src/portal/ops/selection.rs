//! Course selection: enrolled classes, block catalogs, the classes of one
//! course, and the select/drop mutations.
//!
//! Select and drop are not idempotent and are never retried.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::portal::PortalClient;
use crate::portal::endpoints::Endpoint;
use crate::portal::envelope::Envelope;
use crate::portal::errors::PortalError;
use crate::portal::models::selection::{
    BlockCatalog, CourseClasses, DropResult, RawCatalogRow, RawSelectedRow, SelectableCourseEntry,
    SelectedCourseEntry, SelectedCourses,
};
use crate::portal::pagination::{BoundsStyle, DEFAULT_MAX_PAGES, FormPageSource, PageBody, fetch_all};
use crate::portal::session::HeaderProfile;

use super::{Form, decode_rows};

const CATALOG_PAGE_SIZE: u32 = 10;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid digits regex"));

/// Fields every selection listing sends; institutions override them through `default_params`.
fn selection_defaults() -> Vec<(String, String)> {
    [
        ("rwlx", "2"),
        ("xklc", "2"),
        ("xkly", "0"),
        ("bklx_id", "0"),
        ("kklxdm", "10"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl PortalClient {
    pub async fn selected_courses(&mut self, year: i32, term: u8) -> Envelope<SelectedCourses> {
        Envelope::from_result(self.fetch_selected_courses(year, term).await, "获取已选课程成功")
    }

    /// Every selectable class of one selection block, walked page by page.
    pub async fn block_courses(&mut self, year: i32, term: u8, block: u32) -> Envelope<BlockCatalog> {
        Envelope::from_result(self.fetch_block_courses(year, term, block).await, "获取板块课程成功")
    }

    pub async fn course_classes(&mut self, year: i32, term: u8, course_id: &str) -> Envelope<CourseClasses> {
        Envelope::from_result(
            self.fetch_course_classes(year, term, course_id).await,
            "获取教学班成功",
        )
    }

    /// Enroll in the class `do_id` of `course_id`. The portal's answer is passed through.
    pub async fn select_course(
        &mut self,
        sid: &str,
        course_id: &str,
        do_id: &str,
        kklxdm: &str,
        year: i32,
        term: u8,
    ) -> Envelope<Value> {
        Envelope::from_result(
            self.post_select_course(sid, course_id, do_id, kklxdm, year, term).await,
            "选课成功",
        )
    }

    pub async fn drop_course(&mut self, do_id: &str, course_id: &str, year: i32, term: u8) -> Envelope<DropResult> {
        Envelope::from_result(
            self.post_drop_course(do_id, course_id, year, term).await,
            "退课成功",
        )
    }

    async fn fetch_selected_courses(&mut self, year: i32, term: u8) -> Result<SelectedCourses, PortalError> {
        let url = self.resolver.resolve(Endpoint::SelectedCourses)?;
        let form = Form::new()
            .field("xkxnm", year.to_string())
            .field("xkxqm", self.term_parameter(term))
            .with_defaults(self.default_form_params())
            .field_default("njdm_id", year.to_string())
            .field_default("xkly", "0");

        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Page)
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        let rows: Vec<RawSelectedRow> = response.json()?;
        debug!(count = rows.len(), year, term, "selected courses fetched");
        Ok(SelectedCourses {
            year,
            term,
            count: rows.len(),
            courses: rows.iter().map(SelectedCourseEntry::from).collect(),
        })
    }

    /// Form shared by the catalog and class listings.
    fn listing_form(&self, year: i32, term: u8) -> Form {
        let grade = self.grade_year(year).to_string();
        Form::new()
            .field("xkxnm", year.to_string())
            .field("xkxqm", self.term_parameter(term))
            .field("njdm_id", grade.clone())
            .field("njdm_id_xs", grade)
            .with_defaults(self.default_form_params())
            .with_defaults(selection_defaults())
    }

    async fn fetch_block_courses(&mut self, year: i32, term: u8, block: u32) -> Result<BlockCatalog, PortalError> {
        // The listing endpoint relies on state set up by the selection index page.
        let index_url = self.resolver.resolve(Endpoint::BlockCoursesIndex)?;
        self.session
            .get(&index_url, HeaderProfile::Page)
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        let url = self.resolver.resolve(Endpoint::BlockCourses)?;
        let template = self.listing_form(year, term).into_pairs();
        let mut source = FormPageSource::new(&mut self.session, url, template, BoundsStyle::RowRange);
        let listing = fetch_all(&mut source, CATALOG_PAGE_SIZE, DEFAULT_MAX_PAGES, Some("tmpList")).await?;

        if listing.records.is_empty() {
            info!(year, term, block, termination = ?listing.termination, "block catalog is empty");
            return Err(PortalError::Empty);
        }

        let rows: Vec<RawCatalogRow> = decode_rows(listing.records)?;
        Ok(BlockCatalog {
            year,
            term,
            block,
            count: rows.len(),
            pages: listing.pages,
            courses: rows.iter().map(SelectableCourseEntry::from).collect(),
        })
    }

    async fn fetch_course_classes(&mut self, year: i32, term: u8, course_id: &str) -> Result<CourseClasses, PortalError> {
        let url = self.resolver.resolve(Endpoint::CourseClasses)?;
        let form = self.listing_form(year, term).field("kch_id", course_id);

        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Page)
            .await?
            .ensure_ok()?;
        if response.body.contains("用户登录") {
            return Err(PortalError::SessionExpired);
        }
        if PageBody::is_sentinel_text(&response.body) {
            return Err(PortalError::Empty);
        }
        if !response.is_json() {
            return Err(PortalError::protocol(format!(
                "class listing answered with {}",
                response.content_type.as_deref().unwrap_or("no content type")
            )));
        }

        let value: Value = response.json()?;
        let records = match PageBody::classify(value, Some("jxbList")) {
            PageBody::Records(records) if !records.is_empty() => records,
            PageBody::Records(_) | PageBody::Unlisted | PageBody::Sentinel => return Err(PortalError::Empty),
            PageBody::Scalar(text) => {
                return Err(PortalError::protocol(format!("unexpected class listing: {text}")));
            }
        };

        let rows: Vec<RawCatalogRow> = decode_rows(records)?;
        debug!(course_id, count = rows.len(), "course classes fetched");
        Ok(CourseClasses {
            year,
            term,
            course_id: course_id.to_string(),
            count: rows.len(),
            classes: rows.iter().map(SelectableCourseEntry::from).collect(),
        })
    }

    async fn post_select_course(
        &mut self,
        sid: &str,
        course_id: &str,
        do_id: &str,
        kklxdm: &str,
        year: i32,
        term: u8,
    ) -> Result<Value, PortalError> {
        // Student ids encode the grade in the first two digits and the major in the next four.
        let (Some(grade), Some(major)) = (sid.get(0..2), sid.get(2..6)) else {
            return Err(PortalError::invalid_input(format!("student id '{sid}' is too short")));
        };

        let url = self.resolver.resolve(Endpoint::SelectCourse)?;
        let form = Form::new()
            .field("jxb_ids", do_id)
            .field("kch_id", course_id)
            .field("qz", "0")
            .field("xkxnm", year.to_string())
            .field("xkxqm", self.term_parameter(term))
            .field("njdm_id", grade)
            .field("zyh_id", major)
            .field("kklxdm", kklxdm);

        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Page)
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;
        info!(course_id, do_id, "select request sent");
        response.json()
    }

    async fn post_drop_course(&mut self, do_id: &str, course_id: &str, year: i32, term: u8) -> Result<DropResult, PortalError> {
        let url = self.resolver.resolve(Endpoint::DropCourse)?;
        let form = Form::new()
            .field("jxb_ids", do_id)
            .field("kch_id", course_id)
            .field("xkxnm", year.to_string())
            .field("xkxqm", self.term_parameter(term));

        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Page)
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;
        info!(course_id, do_id, "drop request sent");

        let status = DIGITS
            .find(&response.body)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| PortalError::protocol("drop response carries no status"))?;
        Ok(DropResult { status })
    }
}
