//! Logical portal operations and their URL resolution.

use std::sync::Arc;

use tracing::trace;
use url::Url;

use crate::config::{InstitutionConfig, InstitutionDirectory};

/// Every portal page or endpoint the engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    PublicKey,
    Captcha,
    Profile,
    ProfilePage,
    ProfileSupplement,
    Grades,
    GradeDetails,
    Exams,
    ScheduleIndex,
    Schedule,
    Notifications,
    Gpa,
    EvaluationMenu,
    EvaluationDetail,
    SelectedCourses,
    BlockCoursesIndex,
    BlockCourses,
    CourseClasses,
    SelectCourse,
    DropCourse,
}

impl Endpoint {
    /// Key used in an institution's `urls` table.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PublicKey => "key",
            Self::Captcha => "kaptcha",
            Self::Profile => "info",
            Self::ProfilePage => "info_page",
            Self::ProfileSupplement => "info_supplement",
            Self::Grades => "grade",
            Self::GradeDetails => "grade_detail",
            Self::Exams => "exam",
            Self::ScheduleIndex => "schedule_index",
            Self::Schedule => "schedule",
            Self::Notifications => "notifications",
            Self::Gpa => "gpa",
            Self::EvaluationMenu => "evaluate",
            Self::EvaluationDetail => "evaluate_detail",
            Self::SelectedCourses => "selected_courses",
            Self::BlockCoursesIndex => "block_courses_index",
            Self::BlockCourses => "block_courses",
            Self::CourseClasses => "course_classes",
            Self::SelectCourse => "select_course",
            Self::DropCourse => "drop_course",
        }
    }

    /// Path relative to the portal root used when no institution overrides it.
    ///
    /// Course-selection endpoints differ between deployments and have no default.
    pub const fn default_path(self) -> Option<&'static str> {
        match self {
            Self::Login => Some("xtgl/login_slogin.html"),
            Self::PublicKey => Some("xtgl/login_getPublicKey.html"),
            Self::Captcha => Some("kaptcha"),
            Self::Profile => Some("xsxxxggl/xsxxwh_cxCkDgxsxx.html?gnmkdm=N100801"),
            Self::ProfilePage => Some("xsxxxggl/xsgrxxwh_cxXsgrxx.html?gnmkdm=N100801"),
            Self::ProfileSupplement => {
                Some("xszbbgl/xszbbgl_cxXszbbsqIndex.html?doType=details&gnmkdm=N106005")
            }
            Self::Grades => Some("cjcx/cjcx_cxDgXscj.html?doType=query&gnmkdm=N305005"),
            Self::GradeDetails => Some("cjcx/cjcx_cxXsKccjList.html?doType=query&gnmkdm=N305007"),
            Self::Exams => Some("kwgl/kscx_cxXsksxxIndex.html?doType=query&gnmkdm=N358105"),
            Self::ScheduleIndex => Some("kbcx/xskbcx_cxXskbcxIndex.html?gnmkdm=N2151&layout=default"),
            Self::Schedule => Some("kbcx/xskbcx_cxXsgrkb.html?gnmkdm=N2151"),
            Self::Notifications => Some("xtgl/index_cxDbsy.html?doType=query"),
            Self::Gpa => Some("xsxy/xsxyqk_cxXsxyqkIndex.html?gnmkdm=N105515&layout=default"),
            Self::EvaluationMenu => Some("xspjgl/xspj_cxXspjIndex.html?doType=query&gnmkdm=N401605"),
            Self::EvaluationDetail => Some("xspjgl/xspj_cxXspjDisplay.html?gnmkdm=N401605"),
            Self::SelectedCourses
            | Self::BlockCoursesIndex
            | Self::BlockCourses
            | Self::CourseClasses
            | Self::SelectCourse
            | Self::DropCourse => None,
        }
    }

    /// Query endpoints only answer with data when `doType=query` is present.
    pub const fn is_query(self) -> bool {
        matches!(
            self,
            Self::Grades | Self::GradeDetails | Self::Exams | Self::Notifications
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no portal root URL is configured (needed for '{operation}')")]
    NoRoot { operation: &'static str },
    #[error("no URL is configured for '{operation}' and it has no default path")]
    NoDefault { operation: &'static str },
    #[error("invalid portal URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Join `path` onto `root` with exactly one slash between them.
///
/// Absolute `http(s)` paths are taken as-is.
pub fn join_root(root: &str, path: &str) -> Result<Url, ConfigurationError> {
    let joined = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!(
            "{}/{}",
            root.trim().trim_end_matches('/'),
            path.trim().trim_start_matches('/')
        )
    };
    Url::parse(&joined).map_err(|source| ConfigurationError::InvalidUrl {
        url: joined,
        source,
    })
}

/// Ensure `doType=query` is present, swapping out `layout=default` if needed.
pub fn with_query_flag(url: &str) -> String {
    if url.contains("doType=query") {
        url.to_string()
    } else if url.contains("layout=default") {
        url.replacen("layout=default", "doType=query", 1)
    } else {
        let sep = if url.contains('?') { '&' } else { '?' };
        format!("{url}{sep}doType=query")
    }
}

/// The page a browser would have been on before issuing a query request.
pub fn query_referer(url: &str) -> String {
    if url.contains("?doType=query") {
        url.replacen("?doType=query", "?layout=default", 1)
    } else if url.contains("&doType=query") {
        url.replacen("&doType=query", "&layout=default", 1)
    } else if !url.contains('?') {
        format!("{url}?layout=default")
    } else {
        url.to_string()
    }
}

/// Resolves operations to absolute URLs for one bound institution/root pair.
#[derive(Clone)]
pub struct EndpointResolver {
    directory: Arc<dyn InstitutionDirectory>,
    institution: Option<String>,
    root_url: Option<String>,
}

impl std::fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("institution", &self.institution)
            .field("root_url", &self.root_url)
            .finish_non_exhaustive()
    }
}

impl EndpointResolver {
    /// Bind to an institution and/or an explicit root.
    ///
    /// Without an explicit root, the institution's `base_url` is used.
    pub fn new(
        directory: Arc<dyn InstitutionDirectory>,
        institution: Option<String>,
        root_url: Option<String>,
    ) -> Self {
        let root_url = root_url.filter(|r| !r.trim().is_empty()).or_else(|| {
            institution
                .as_deref()
                .and_then(|id| directory.get(id))
                .map(|c| c.base_url.clone())
                .filter(|r| !r.trim().is_empty())
        });
        Self {
            directory,
            institution,
            root_url,
        }
    }

    pub fn institution_id(&self) -> Option<&str> {
        self.institution.as_deref()
    }

    pub fn institution(&self) -> Option<&InstitutionConfig> {
        self.institution
            .as_deref()
            .and_then(|id| self.directory.get(id))
    }

    pub fn directory(&self) -> &Arc<dyn InstitutionDirectory> {
        &self.directory
    }

    /// Bound root normalized to a single trailing slash.
    pub fn root(&self) -> Result<String, ConfigurationError> {
        self.root_url
            .as_deref()
            .map(|r| format!("{}/", r.trim().trim_end_matches('/')))
            .ok_or(ConfigurationError::NoRoot { operation: "root" })
    }

    /// `scheme://host[:port]` of the bound root.
    pub fn origin(&self) -> Result<String, ConfigurationError> {
        let root = self.root()?;
        let url = Url::parse(&root).map_err(|source| ConfigurationError::InvalidUrl {
            url: root.clone(),
            source,
        })?;
        Ok(url.origin().ascii_serialization())
    }

    pub fn resolve(&self, endpoint: Endpoint) -> Result<Url, ConfigurationError> {
        self.resolve_for(endpoint, None, None)
    }

    /// Resolve with an optional per-call institution or root override.
    pub fn resolve_for(
        &self,
        endpoint: Endpoint,
        institution: Option<&str>,
        root_url: Option<&str>,
    ) -> Result<Url, ConfigurationError> {
        if let Some(config) = institution.and_then(|id| self.directory.get(id))
            && let Some(path) = config.path_for(endpoint)
            && !config.base_url.trim().is_empty()
        {
            trace!(operation = endpoint.key(), institution = config.name.as_str(), "using institution path");
            return join_root(&config.base_url, path);
        }

        let root = root_url
            .filter(|r| !r.trim().is_empty())
            .or(self.root_url.as_deref())
            .ok_or(ConfigurationError::NoRoot {
                operation: endpoint.key(),
            })?;

        if institution.is_none()
            && let Some(path) = self.institution().and_then(|c| c.path_for(endpoint))
        {
            trace!(operation = endpoint.key(), "using bound institution path");
            return join_root(root, path);
        }

        match endpoint.default_path() {
            Some(path) => join_root(root, path),
            None => Err(ConfigurationError::NoDefault {
                operation: endpoint.key(),
            }),
        }
    }

    /// Resolve a query endpoint, returning `(request_url, referer)`.
    pub fn resolve_query(&self, endpoint: Endpoint) -> Result<(Url, String), ConfigurationError> {
        let url = self.resolve(endpoint)?;
        let flagged = with_query_flag(url.as_str());
        let referer = query_referer(&flagged);
        let url = Url::parse(&flagged).map_err(|source| ConfigurationError::InvalidUrl {
            url: flagged,
            source,
        })?;
        Ok((url, referer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstitutionRegistry;

    fn registry() -> Arc<dyn InstitutionDirectory> {
        let mut registry = InstitutionRegistry::default();
        let mut school = InstitutionConfig::new("示例大学", "https://jw.example.edu.cn/jwglxt");
        school
            .urls
            .insert("grade".into(), "cjcx/custom_grade.html?gnmkdm=N1".into());
        school
            .urls
            .insert("block_courses".into(), "/xsxk/zzxkyzb_cxZzxkYzbPartDisplay.html".into());
        registry.insert(school);

        let mut other = InstitutionConfig::new("Other", "http://other.test/");
        other.urls.insert("exam".into(), "kwgl/other_exam.html".into());
        registry.insert(other);
        Arc::new(registry)
    }

    // --- join_root ---

    #[test]
    fn test_join_root_single_slash() {
        for root in ["http://a.test/jw", "http://a.test/jw/", "http://a.test/jw//"] {
            for path in ["x/y.html", "/x/y.html"] {
                assert_eq!(join_root(root, path).unwrap().as_str(), "http://a.test/jw/x/y.html");
            }
        }
    }

    #[test]
    fn test_join_root_rejects_garbage_root() {
        assert!(matches!(
            join_root("not a url", "x.html"),
            Err(ConfigurationError::InvalidUrl { .. })
        ));
    }

    // --- resolution order ---

    #[test]
    fn test_institution_path_wins() {
        let resolver = EndpointResolver::new(registry(), Some("示例大学".into()), None);
        let url = resolver.resolve(Endpoint::Grades).unwrap();
        assert_eq!(
            url.as_str(),
            "https://jw.example.edu.cn/jwglxt/cjcx/custom_grade.html?gnmkdm=N1"
        );
    }

    #[test]
    fn test_explicit_institution_overrides_bound_root() {
        let resolver = EndpointResolver::new(registry(), None, Some("http://bound.test/".into()));
        let url = resolver
            .resolve_for(Endpoint::Exams, Some("Other"), None)
            .unwrap();
        assert_eq!(url.as_str(), "http://other.test/kwgl/other_exam.html");
    }

    #[test]
    fn test_explicit_root_with_bound_institution_path() {
        let resolver = EndpointResolver::new(registry(), Some("示例大学".into()), None);
        let url = resolver
            .resolve_for(Endpoint::BlockCourses, None, Some("http://mirror.test/jw"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://mirror.test/jw/xsxk/zzxkyzb_cxZzxkYzbPartDisplay.html"
        );
    }

    #[test]
    fn test_default_path_fallback() {
        let resolver = EndpointResolver::new(registry(), None, Some("http://plain.test".into()));
        let url = resolver.resolve(Endpoint::Login).unwrap();
        assert_eq!(url.as_str(), "http://plain.test/xtgl/login_slogin.html");
    }

    #[test]
    fn test_missing_default_is_configuration_error() {
        let resolver = EndpointResolver::new(registry(), None, Some("http://plain.test".into()));
        assert!(matches!(
            resolver.resolve(Endpoint::SelectCourse),
            Err(ConfigurationError::NoDefault {
                operation: "select_course"
            })
        ));
    }

    #[test]
    fn test_missing_root_is_configuration_error() {
        let resolver = EndpointResolver::new(registry(), Some("Nowhere".into()), None);
        assert!(matches!(
            resolver.resolve(Endpoint::Login),
            Err(ConfigurationError::NoRoot { .. })
        ));
    }

    #[test]
    fn test_origin_strips_path() {
        let resolver = EndpointResolver::new(registry(), Some("示例大学".into()), None);
        assert_eq!(resolver.origin().unwrap(), "https://jw.example.edu.cn");
        assert_eq!(resolver.root().unwrap(), "https://jw.example.edu.cn/jwglxt/");
    }

    // --- query flag ---

    #[test]
    fn test_query_flag_added_and_referer_derived() {
        let resolver = EndpointResolver::new(registry(), Some("示例大学".into()), None);
        let (url, referer) = resolver.resolve_query(Endpoint::Grades).unwrap();
        assert_eq!(
            url.as_str(),
            "https://jw.example.edu.cn/jwglxt/cjcx/custom_grade.html?gnmkdm=N1&doType=query"
        );
        assert_eq!(
            referer,
            "https://jw.example.edu.cn/jwglxt/cjcx/custom_grade.html?gnmkdm=N1&layout=default"
        );
    }

    #[test]
    fn test_query_flag_replaces_layout() {
        assert_eq!(
            with_query_flag("http://a/x.html?layout=default&gnmkdm=N1"),
            "http://a/x.html?doType=query&gnmkdm=N1"
        );
        assert_eq!(with_query_flag("http://a/x.html"), "http://a/x.html?doType=query");
        assert_eq!(query_referer("http://a/x.html?doType=query"), "http://a/x.html?layout=default");
    }
}
