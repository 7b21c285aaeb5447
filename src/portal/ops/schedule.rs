use tracing::debug;

use crate::portal::PortalClient;
use crate::portal::endpoints::Endpoint;
use crate::portal::envelope::Envelope;
use crate::portal::errors::PortalError;
use crate::portal::models::schedule::{RawSchedulePayload, Schedule, ScheduleEntry};
use crate::portal::normalize::timetable::reconcile;
use crate::portal::normalize::values;
use crate::portal::session::HeaderProfile;

use super::Form;

impl PortalClient {
    /// Personal timetable, with doubled four-period blocks split into two-period halves.
    pub async fn schedule(&mut self, year: i32, term: u8) -> Envelope<Schedule> {
        Envelope::from_result(self.fetch_schedule(year, term).await, "获取课表成功")
    }

    async fn fetch_schedule(&mut self, year: i32, term: u8) -> Result<Schedule, PortalError> {
        // The data endpoint only answers once the index page has been visited.
        let index_url = self.resolver.resolve(Endpoint::ScheduleIndex)?;
        self.session
            .get(&index_url, HeaderProfile::Page)
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        let url = self.resolver.resolve(Endpoint::Schedule)?;
        let form = Form::new()
            .field("xnm", year.to_string())
            .field("xqm", self.term_parameter(term));
        let referer = index_url.to_string();
        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Xhr { referer: &referer })
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        let payload: RawSchedulePayload = response.json()?;
        if payload.kb_list.is_empty() {
            return Err(PortalError::Empty);
        }

        let table = &self.normalizer.schedule;
        let mut courses: Vec<ScheduleEntry> = payload
            .kb_list
            .iter()
            .map(|row| ScheduleEntry::from_raw(row, table))
            .collect();
        let reconciliation = reconcile(&mut courses, table);
        debug!(
            count = courses.len(),
            split = reconciliation.split_pairs,
            year,
            term,
            "schedule fetched"
        );

        Ok(Schedule {
            sid: values::text(&payload.xsxx.xh),
            name: values::text(&payload.xsxx.xm),
            year,
            term,
            count: courses.len(),
            courses,
            extra_courses: payload
                .sjk_list
                .iter()
                .filter_map(|c| values::text(&c.qtkcgs))
                .collect(),
            reconciliation,
        })
    }
}
