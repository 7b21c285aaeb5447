use tracing::{debug, warn};

use crate::portal::PortalClient;
use crate::portal::endpoints::Endpoint;
use crate::portal::envelope::Envelope;
use crate::portal::errors::PortalError;
use crate::portal::models::profile::{RawProfile, StudentProfile, parse_profile_page, parse_supplement_page};
use crate::portal::session::HeaderProfile;

use super::Form;

const SID_LABEL: &str = "学号：";

impl PortalClient {
    pub async fn profile(&mut self) -> Envelope<StudentProfile> {
        Envelope::from_result(self.fetch_profile().await, "获取个人信息成功")
    }

    async fn fetch_profile(&mut self) -> Result<StudentProfile, PortalError> {
        let url = self.resolver.resolve(Endpoint::Profile)?;
        let response = self
            .session
            .get(&url, HeaderProfile::Page)
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        if response.body.contains("无功能权限") || response.body.contains("错误提示") {
            warn!("profile endpoint denied access, falling back to the profile page");
            return self.profile_from_page().await;
        }

        match response.json::<Option<RawProfile>>() {
            Ok(Some(raw)) => Ok(StudentProfile::from(&raw).with_placeholders()),
            Ok(None) => {
                debug!("profile endpoint returned null, falling back to the profile page");
                self.profile_from_page().await
            }
            Err(err) => {
                debug!(error = %err, "profile endpoint is not JSON, falling back to the profile page");
                self.profile_from_page().await
            }
        }
    }

    async fn profile_from_page(&mut self) -> Result<StudentProfile, PortalError> {
        let url = self.resolver.resolve(Endpoint::ProfilePage)?;
        let response = self
            .session
            .get(&url, HeaderProfile::Page)
            .await?
            .ensure_ok()?
            .ensure_logged_in()?;

        let fields = parse_profile_page(&response.document());
        if !fields.contains(SID_LABEL) {
            return Err(PortalError::protocol("profile page has no student id field"));
        }
        if fields.get(SID_LABEL).is_none() {
            return Err(PortalError::Business(
                "当前学年学期无学生时盒数据，您可能已经毕业了".to_string(),
            ));
        }
        debug!(fields = fields.len(), "parsed profile page");

        let mut profile = StudentProfile::from_page(&fields);
        if profile.lacks_affiliation()
            && let Err(err) = self.fill_from_supplement(&mut profile).await
        {
            warn!(error = %err, "could not load supplementary profile page");
        }
        Ok(profile.with_placeholders())
    }

    /// The student-card reissue page also lists college, major and class.
    async fn fill_from_supplement(&mut self, profile: &mut StudentProfile) -> Result<(), PortalError> {
        let url = self.resolver.resolve(Endpoint::ProfileSupplement)?;
        let form = Form::new()
            .field("offDetails", "1")
            .field("gnmkdm", "N106005")
            .field("czdmKey", "00");
        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Page)
            .await?;

        let doc = response.document();
        if doc.text_of("p.error_title").as_deref() == Some("无功能权限，") {
            debug!("supplementary profile page is not available to this account");
            return Ok(());
        }
        profile.fill_affiliation(&parse_supplement_page(&doc));
        Ok(())
    }
}
