//! Portal operations, one module per feature area.
//!
//! Each operation has a private `fetch_*` method returning
//! `Result<T, PortalError>` and a public wrapper converting it into an
//! [`Envelope`](crate::portal::Envelope).

mod evaluation;
mod grades;
mod notifications;
mod profile;
mod schedule;
mod selection;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::portal::document::Document;
use crate::portal::errors::PortalError;
use crate::utils::cache_buster;

/// Form fields, kept in the order the portal's own pages send them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form(Vec<(String, String)>);

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set `name`, replacing an earlier value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Add `name` unless it is already set.
    pub fn field_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if self.get(&name).is_none() {
            self.0.push((name, value.into()));
        }
        self
    }

    /// Merge `fields`, keeping values already present.
    pub fn with_defaults(self, fields: impl IntoIterator<Item = (String, String)>) -> Self {
        fields
            .into_iter()
            .fold(self, |form, (name, value)| form.field_default(name, value))
    }

    /// Append the jqGrid query-model block used by every `doType=query` endpoint.
    pub fn query_model(self, show_count: u32, sort_name: &str, sort_order: &str) -> Self {
        self.field("_search", "false")
            .field("nd", cache_buster())
            .field("queryModel.showCount", show_count.to_string())
            .field("queryModel.currentPage", "1")
            .field("queryModel.sortName", sort_name)
            .field("queryModel.sortOrder", sort_order)
            .field("time", "0")
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0
    }
}

/// `{ "items": [...] }` wrapper of query-model responses.
#[derive(Debug, Deserialize)]
struct QueryPage<T> {
    items: Option<Vec<T>>,
}

impl<T> QueryPage<T> {
    /// Rows of the page; a missing or empty list is [`PortalError::Empty`].
    fn non_empty(self) -> Result<Vec<T>, PortalError> {
        match self.items {
            Some(items) if !items.is_empty() => Ok(items),
            _ => Err(PortalError::Empty),
        }
    }
}

/// Decode listing rows one by one, naming the failing row and field.
fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, PortalError> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            serde_path_to_error::deserialize(row).map_err(|err| {
                PortalError::protocol(format!("row {idx} at '{}': {}", err.path(), err.inner()))
            })
        })
        .collect()
}

/// Query pages that answer with an HTML error page titled "错误..." mean the
/// session no longer has access.
fn is_error_page(doc: &Document) -> bool {
    doc.text_of("title").is_some_and(|t| t.contains("错误"))
}
