use tracing::debug;

use crate::portal::PortalClient;
use crate::portal::endpoints::{Endpoint, join_root};
use crate::portal::envelope::Envelope;
use crate::portal::errors::PortalError;
use crate::portal::models::notifications::{Notification, RawNotificationRow};
use crate::portal::session::HeaderProfile;

use super::{Form, QueryPage, is_error_page};

/// The to-do page the notification grid is embedded in.
const NOTIFICATION_PAGE: &str = "xtgl/index_cxDbsy.html?flag=1";

impl PortalClient {
    /// Latest notifications (schedule changes, exam notices), newest first.
    pub async fn notifications(&mut self) -> Envelope<Vec<Notification>> {
        Envelope::from_result(self.fetch_notifications().await, "获取消息成功")
    }

    async fn fetch_notifications(&mut self) -> Result<Vec<Notification>, PortalError> {
        let (url, _) = self.resolver.resolve_query(Endpoint::Notifications)?;
        let referer = join_root(&self.resolver.root()?, NOTIFICATION_PAGE)?.to_string();
        let form = Form::new()
            .field("flag", "1")
            .field("sfyy", "1")
            .query_model(15, "cjsj ", "desc");

        let response = self
            .session
            .post_form(&url, form.as_pairs(), HeaderProfile::Ajax { referer: &referer })
            .await?
            .ensure_ok()?;

        let doc = response.document();
        if doc.is_login_page() || is_error_page(&doc) {
            return Err(PortalError::SessionExpired);
        }

        let page: QueryPage<RawNotificationRow> = response.json()?;
        // An empty list is a valid answer here; only a missing one is "empty".
        let rows = page.items.ok_or(PortalError::Empty)?;
        debug!(count = rows.len(), "notifications fetched");
        Ok(rows.iter().map(Notification::from).collect())
    }
}
