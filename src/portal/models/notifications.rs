use serde::{Deserialize, Serialize};

use crate::portal::normalize::notifications::split_notification;
use crate::portal::normalize::values::{self, Loose};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawNotificationRow {
    pub xxnr: Option<Loose>,
    pub cjsj: Option<Loose>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
    pub create_time: Option<String>,
}

impl From<&RawNotificationRow> for Notification {
    fn from(row: &RawNotificationRow) -> Self {
        let text = values::text(&row.xxnr);
        let (kind, content) = split_notification(text.as_deref());
        Self {
            kind,
            content,
            create_time: values::text(&row.cjsj),
        }
    }
}
