//! Per-institution portal configuration.
//!
//! Institutions are stored as a JSON object keyed by display name:
//!
//! ```json
//! {
//!   "示例大学": {
//!     "school_code": "10001",
//!     "base_url": "https://jw.example.edu.cn/jwglxt/",
//!     "requires_captcha": false,
//!     "urls": { "grade": "cjcx/cjcx_cxDgXscj.html?gnmkdm=N305005" },
//!     "parameters": { "term_mapping": { "1": "3" }, "grade_year_offset": -1 }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::portal::endpoints::Endpoint;

/// Static description of one institution's portal deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionConfig {
    /// Display name; filled from the registry key when loaded from a file.
    #[serde(default, skip_serializing)]
    pub name: String,
    #[serde(rename = "school_code", default)]
    pub code: String,
    pub base_url: String,
    #[serde(default = "default_requires_captcha")]
    pub requires_captcha: bool,
    #[serde(default)]
    pub description: String,
    /// Operation key -> path relative to `base_url`.
    #[serde(default)]
    pub urls: HashMap<String, String>,
    #[serde(default)]
    pub parameters: InstitutionParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionParameters {
    /// Term number (as a string key) -> portal `xqm` value.
    #[serde(default)]
    pub term_mapping: HashMap<String, String>,
    #[serde(default = "default_grade_year_offset")]
    pub grade_year_offset: i32,
    /// Extra form fields merged into course-selection requests.
    #[serde(default)]
    pub default_params: BTreeMap<String, serde_json::Value>,
}

impl Default for InstitutionParameters {
    fn default() -> Self {
        Self {
            term_mapping: HashMap::new(),
            grade_year_offset: default_grade_year_offset(),
            default_params: BTreeMap::new(),
        }
    }
}

fn default_requires_captcha() -> bool {
    true
}

fn default_grade_year_offset() -> i32 {
    -1
}

impl InstitutionConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: String::new(),
            base_url: base_url.into(),
            requires_captcha: true,
            description: String::new(),
            urls: HashMap::new(),
            parameters: InstitutionParameters::default(),
        }
    }

    /// Configured relative path for an operation, ignoring blank entries.
    pub fn path_for(&self, endpoint: Endpoint) -> Option<&str> {
        self.urls
            .get(endpoint.key())
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
    }

    /// Portal `xqm` value for a term number.
    ///
    /// The institution's own mapping wins; otherwise the common `term² × 3`
    /// encoding applies (1 -> "3", 2 -> "12") with 0 meaning "all terms".
    pub fn term_parameter(&self, term: u8) -> String {
        self.parameters
            .term_mapping
            .get(&term.to_string())
            .cloned()
            .unwrap_or_else(|| standard_term_parameter(term))
    }

    pub fn grade_year(&self, year: i32) -> i32 {
        year + self.parameters.grade_year_offset
    }

    /// `default_params` rendered as form fields; nested values are skipped.
    pub fn default_form_params(&self) -> Vec<(String, String)> {
        self.parameters
            .default_params
            .iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((k.clone(), value))
            })
            .collect()
    }
}

/// `term² × 3`, with term 0 (whole year) encoded as an empty string.
pub fn standard_term_parameter(term: u8) -> String {
    match term {
        0 => String::new(),
        t => (u32::from(t).pow(2) * 3).to_string(),
    }
}

/// Read access to institution configuration.
///
/// The store behind it is owned elsewhere; the engine only looks entries up.
pub trait InstitutionDirectory: Send + Sync {
    fn get(&self, id: &str) -> Option<&InstitutionConfig>;

    /// Unknown institutions are assumed to show a captcha.
    fn requires_captcha(&self, id: &str) -> bool {
        self.get(id).is_none_or(|c| c.requires_captcha)
    }

    fn term_parameter(&self, id: &str, term: u8) -> String {
        match self.get(id) {
            Some(config) => config.term_parameter(term),
            None => standard_term_parameter(term),
        }
    }

    fn grade_year(&self, id: &str, year: i32) -> i32 {
        match self.get(id) {
            Some(config) => config.grade_year(year),
            None => year + default_grade_year_offset(),
        }
    }
}

/// In-memory registry loaded from the JSON institutions file.
#[derive(Debug, Clone, Default)]
pub struct InstitutionRegistry {
    entries: BTreeMap<String, InstitutionConfig>,
}

impl InstitutionRegistry {
    pub fn from_json(body: &str) -> anyhow::Result<Self> {
        let raw: BTreeMap<String, InstitutionConfig> =
            crate::portal::json::decode(body).context("invalid institutions document")?;

        let entries = raw
            .into_iter()
            .map(|(name, mut config)| {
                config.name = name.clone();
                (name, config)
            })
            .collect::<BTreeMap<_, _>>();

        debug!(count = entries.len(), "parsed institution registry");
        Ok(Self { entries })
    }

    /// Load the registry file; a missing file yields an empty registry.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "institutions file not found, using empty registry");
            return Ok(Self::default());
        }
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&body)
    }

    pub fn insert(&mut self, config: InstitutionConfig) {
        self.entries.insert(config.name.clone(), config);
    }

    pub fn by_code(&self, code: &str) -> Option<&InstitutionConfig> {
        self.entries.values().find(|c| c.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstitutionConfig> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl InstitutionDirectory for InstitutionRegistry {
    fn get(&self, id: &str) -> Option<&InstitutionConfig> {
        self.entries.get(id).or_else(|| self.by_code(id))
    }
}
