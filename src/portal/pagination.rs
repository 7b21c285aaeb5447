//! Page-by-page fetching of catalog listings.
//!
//! Course-selection catalogs expose no total count, so a listing is walked
//! until it signals the end in one of several ways: a short page, a bare `0`,
//! an empty list, or a non-JSON answer. Query grids do report `totalPage`,
//! and the walk stops once that page has been read.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, trace};
use url::Url;

use crate::portal::errors::PortalError;
use crate::portal::json::is_json_content_type;
use crate::portal::session::{HeaderProfile, PortalResponse, Session};

pub const DEFAULT_MAX_PAGES: u32 = 50;

/// 1-based page index and the page size it was requested with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    pub page: u32,
    pub size: u32,
}

impl PageBounds {
    /// First row of the page, 1-based and inclusive.
    pub fn first_row(self) -> u32 {
        (self.page - 1) * self.size + 1
    }

    /// Last row of the page, inclusive.
    pub fn last_row(self) -> u32 {
        self.page * self.size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl From<PortalResponse> for RawPage {
    fn from(response: PortalResponse) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type,
            body: response.body,
        }
    }
}

/// Anything that can produce one page of a listing.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_page(&mut self, bounds: PageBounds) -> Result<RawPage, PortalError>;
}

/// Shape of a decoded listing response.
#[derive(Debug, Clone, PartialEq)]
pub enum PageBody {
    /// Bare `0` or `"0"`: the portal's "nothing (more) here".
    Sentinel,
    /// Any other scalar, kept as text for diagnostics.
    Scalar(String),
    Records(Vec<Value>),
    /// An object without the expected list field.
    Unlisted,
}

impl PageBody {
    /// Classify `value`; top-level arrays are records, objects are searched for `list_field`.
    pub fn classify(value: Value, list_field: Option<&str>) -> Self {
        match value {
            Value::String(s) if s.trim() == "0" => Self::Sentinel,
            Value::Number(n) if n.as_i64() == Some(0) => Self::Sentinel,
            Value::Array(items) => Self::Records(items),
            Value::Object(mut map) => match list_field.and_then(|f| map.remove(f)) {
                Some(Value::Array(items)) => Self::Records(items),
                Some(Value::Null) | None => Self::Unlisted,
                Some(other) => Self::Scalar(other.to_string()),
            },
            Value::String(s) => Self::Scalar(s),
            other => Self::Scalar(other.to_string()),
        }
    }

    pub fn is_sentinel_text(body: &str) -> bool {
        matches!(body.trim(), "0" | "\"0\"")
    }
}

/// `totalPage` of a query-grid response, as a number or numeric string.
fn total_pages(value: &Value) -> Option<u32> {
    match value.get("totalPage")? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum TerminationReason {
    ShortPage,
    /// The page the response itself reported as its last.
    LastPage,
    Sentinel,
    EmptyPage,
    MaxPages,
    HttpStatus(u16),
    NotJson(String),
    UnexpectedPayload(String),
}

#[derive(Debug, Clone)]
pub struct Paginated {
    pub records: Vec<Value>,
    pub termination: TerminationReason,
    /// Pages whose records were kept.
    pub pages: u32,
}

/// Walk `source` page by page until the listing ends or `max_pages` is reached.
///
/// The page that triggers termination is discarded, except for a short page
/// or the reported last page, which are kept and then end the walk. Transport failures are returned as
/// errors; everything else ends the walk with a [`TerminationReason`].
pub async fn fetch_all<S: PageSource>(
    source: &mut S,
    page_size: u32,
    max_pages: u32,
    list_field: Option<&str>,
) -> Result<Paginated, PortalError> {
    let mut records = Vec::new();
    let mut pages = 0;
    let mut page = 1;

    let termination = loop {
        if page > max_pages {
            break TerminationReason::MaxPages;
        }
        let bounds = PageBounds { page, size: page_size };
        trace!(page, first = bounds.first_row(), last = bounds.last_row(), "fetching page");

        let raw = source.fetch_page(bounds).await?;
        if raw.status != 200 {
            break TerminationReason::HttpStatus(raw.status);
        }
        if PageBody::is_sentinel_text(&raw.body) {
            break TerminationReason::Sentinel;
        }
        if !is_json_content_type(raw.content_type.as_deref()) {
            break TerminationReason::NotJson(raw.content_type.unwrap_or_default());
        }
        let value: Value = match serde_json::from_str(&raw.body) {
            Ok(value) => value,
            Err(err) => break TerminationReason::UnexpectedPayload(err.to_string()),
        };

        let last_page = total_pages(&value);
        let items = match PageBody::classify(value, list_field) {
            PageBody::Sentinel => break TerminationReason::Sentinel,
            PageBody::Scalar(text) => break TerminationReason::UnexpectedPayload(text),
            PageBody::Unlisted => break TerminationReason::EmptyPage,
            PageBody::Records(items) if items.is_empty() => break TerminationReason::EmptyPage,
            PageBody::Records(items) => items,
        };

        let short = (items.len() as u32) < page_size;
        debug!(page, count = items.len(), "page fetched");
        records.extend(items);
        pages += 1;

        if short {
            break TerminationReason::ShortPage;
        }
        if last_page.is_some_and(|last| page >= last) {
            break TerminationReason::LastPage;
        }
        page += 1;
    };

    info!(total = records.len(), pages, termination = ?termination, "listing fetched");
    Ok(Paginated {
        records,
        termination,
        pages,
    })
}

/// How page bounds are written into the request form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsStyle {
    /// `kspage`/`jspage` row range, used by course-selection listings.
    RowRange,
    /// `queryModel.currentPage`/`queryModel.showCount`, used by query grids.
    QueryModel,
}

impl BoundsStyle {
    fn fields(self, bounds: PageBounds) -> [(String, String); 2] {
        match self {
            Self::RowRange => [
                ("kspage".into(), bounds.first_row().to_string()),
                ("jspage".into(), bounds.last_row().to_string()),
            ],
            Self::QueryModel => [
                ("queryModel.currentPage".into(), bounds.page.to_string()),
                ("queryModel.showCount".into(), bounds.size.to_string()),
            ],
        }
    }
}

/// Posts a fixed form template plus per-page bounds through a [`Session`].
pub struct FormPageSource<'s> {
    session: &'s mut Session,
    url: Url,
    template: Vec<(String, String)>,
    style: BoundsStyle,
    referer: Option<String>,
}

impl<'s> FormPageSource<'s> {
    pub fn new(session: &'s mut Session, url: Url, template: Vec<(String, String)>, style: BoundsStyle) -> Self {
        Self {
            session,
            url,
            template,
            style,
            referer: None,
        }
    }

    /// Send the XHR header profile with this `Referer` instead of plain page headers.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

impl PageSource for FormPageSource<'_> {
    async fn fetch_page(&mut self, bounds: PageBounds) -> Result<RawPage, PortalError> {
        let mut form = self.template.clone();
        for (key, value) in self.style.fields(bounds) {
            match form.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => form.push((key, value)),
            }
        }
        let profile = match &self.referer {
            Some(referer) => HeaderProfile::Ajax { referer },
            None => HeaderProfile::Page,
        };
        let response = self.session.post_form(&self.url, &form, profile).await?;
        Ok(response.into())
    }
}
