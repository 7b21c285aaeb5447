//! Teaching-quality evaluation: list ratable classes, load one rating form,
//! save or submit it.

use tracing::{debug, info};
use url::Url;

use crate::portal::PortalClient;
use crate::portal::endpoints::{ConfigurationError, Endpoint, join_root, query_referer};
use crate::portal::envelope::Envelope;
use crate::portal::errors::PortalError;
use crate::portal::models::evaluation::{
    EvaluationCourse, EvaluationForm, EvaluationMenu, EvaluationSubmission, RawEvaluationRow, SubmitMode,
    classify_save_response, parse_evaluation_form,
};
use crate::portal::pagination::{BoundsStyle, DEFAULT_MAX_PAGES, FormPageSource, TerminationReason, fetch_all};
use crate::portal::session::HeaderProfile;

use super::{Form, decode_rows};

const MENU_PAGE_SIZE: u32 = 15;
const PARAMETER_ERROR: &str = "课程号ID,教学班ID,教职工ID参数异常";
const NOT_OPEN: &str = "目前未对你放开教学质量评价";

/// The rating page a browser would be on when it posts the form for `jxb_id`.
fn evaluation_referer(root: &str, jxb_id: &str) -> Result<Url, ConfigurationError> {
    join_root(
        root,
        &format!("xspjgl/xspj_cxXspjIndex.html?doType=details&gnmkdm=N401605&layout=default&jxb_id={jxb_id}"),
    )
}

impl PortalClient {
    pub async fn evaluation_menu(&mut self) -> Envelope<EvaluationMenu> {
        Envelope::from_result(self.fetch_evaluation_menu().await, "获取评价菜单成功")
    }

    /// Rating form of the class `jxb_id`, with its items and bounds.
    pub async fn evaluation_detail(&mut self, jxb_id: &str) -> Envelope<EvaluationForm> {
        Envelope::from_result(self.fetch_evaluation_detail(jxb_id).await, "获取评价详情成功")
    }

    /// Save the ratings as a draft that can still be changed.
    pub async fn save_evaluation(&mut self, jxb_id: &str, submission: &EvaluationSubmission) -> Envelope<()> {
        Envelope::from_result(
            self.post_evaluation(jxb_id, submission, SubmitMode::Save).await,
            SubmitMode::Save.success_message(),
        )
    }

    /// Submit the ratings for good.
    pub async fn submit_evaluation(&mut self, jxb_id: &str, submission: &EvaluationSubmission) -> Envelope<()> {
        Envelope::from_result(
            self.post_evaluation(jxb_id, submission, SubmitMode::Submit).await,
            SubmitMode::Submit.success_message(),
        )
    }

    async fn fetch_evaluation_menu(&mut self) -> Result<EvaluationMenu, PortalError> {
        let url = self.resolver.resolve(Endpoint::EvaluationMenu)?;
        let referer = query_referer(url.as_str());
        let template = Form::new()
            .query_model(MENU_PAGE_SIZE, "kcmc,jzgmc ", "asc")
            .into_pairs();

        let mut source =
            FormPageSource::new(&mut self.session, url, template, BoundsStyle::QueryModel).with_referer(referer);
        let listing = fetch_all(&mut source, MENU_PAGE_SIZE, DEFAULT_MAX_PAGES, Some("items")).await?;

        if listing.records.is_empty() {
            return Err(match listing.termination {
                // The login page is served as HTML in place of the grid data.
                TerminationReason::NotJson(_) => PortalError::SessionExpired,
                TerminationReason::HttpStatus(status) => {
                    PortalError::protocol(format!("evaluation menu answered with status {status}"))
                }
                _ => PortalError::Empty,
            });
        }

        let rows: Vec<RawEvaluationRow> = decode_rows(listing.records)?;
        let courses: Vec<EvaluationCourse> = rows.iter().map(EvaluationCourse::from).collect();
        debug!(count = courses.len(), pages = listing.pages, "evaluation menu fetched");

        Ok(EvaluationMenu {
            count: courses.len(),
            pages: listing.pages,
            courses,
        })
    }

    async fn fetch_evaluation_detail(&mut self, jxb_id: &str) -> Result<EvaluationForm, PortalError> {
        // Hidden ids the form request needs are only listed in the menu.
        let menu = self.fetch_evaluation_menu().await?;
        let course = menu
            .courses
            .into_iter()
            .find(|c| c.jxb_id.as_deref() == Some(jxb_id))
            .ok_or_else(|| PortalError::invalid_input(format!("no ratable class with jxb_id '{jxb_id}'")))?;

        let url = self.resolver.resolve(Endpoint::EvaluationDetail)?;
        let response = self
            .session
            .post_form(&url, &course.detail_form(), HeaderProfile::Page)
            .await?
            .ensure_ok()?;

        if response.body.contains("用户登录") {
            return Err(PortalError::SessionExpired);
        }
        if response.body.contains(PARAMETER_ERROR) {
            return Err(PortalError::protocol(format!("rating form rejected the class ids: {PARAMETER_ERROR}")));
        }
        if response.body.contains(NOT_OPEN) {
            debug!(jxb_id, "evaluation is not open");
            return Err(PortalError::Empty);
        }

        let root = self.resolver.root()?;
        let form = parse_evaluation_form(&response.document(), &root, &course);
        debug!(
            jxb_id,
            items = form.items.len(),
            evaluated = form.is_evaluated,
            "rating form parsed"
        );
        Ok(form)
    }

    async fn post_evaluation(
        &mut self,
        jxb_id: &str,
        submission: &EvaluationSubmission,
        mode: SubmitMode,
    ) -> Result<(), PortalError> {
        // Every hidden id and the action are taken from a fresh copy of the form.
        let form = self.fetch_evaluation_detail(jxb_id).await?;
        let fields = form.form_fields(submission, mode)?;
        let action = form
            .action
            .as_deref()
            .ok_or_else(|| PortalError::protocol("rating form declares no action"))?;
        let action = Url::parse(action).map_err(|source| ConfigurationError::InvalidUrl {
            url: action.to_string(),
            source,
        })?;

        let referer = evaluation_referer(&self.resolver.root()?, jxb_id)?.to_string();
        let response = self
            .session
            .post_form(&action, &fields, HeaderProfile::Ajax { referer: &referer })
            .await?
            .ensure_ok()?;

        classify_save_response(&response.body, mode)?;
        info!(jxb_id, mode = ?mode, scored = submission.scores.len(), "evaluation posted");
        Ok(())
    }
}
