//! Browser-emulating client for the ZF academic portal.
//!
//! A [`PortalClient`] owns one cookie session bound to one institution/root
//! pair. Log in through [`PortalClient::login`] (or restore cookies with
//! [`PortalClient::with_cookies`]), then call the operations in [`ops`]; every
//! public operation returns an [`Envelope`].

pub mod auth;
pub mod crypto;
pub mod document;
pub mod endpoints;
pub mod envelope;
pub mod errors;
pub mod json;
pub mod models;
pub mod normalize;
pub mod ops;
pub mod pagination;
pub mod session;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::config::institutions::standard_term_parameter;
use crate::config::{Config, InstitutionDirectory};
pub use auth::{LoginChallenge, LoginOutcome, LoginReport, LoginStage};
use endpoints::{ConfigurationError, Endpoint, EndpointResolver};
pub use envelope::{Envelope, ResultCode};
pub use errors::PortalError;
use normalize::NormalizerConfig;
use session::Session;

/// Offset applied to the academic year when no institution says otherwise.
const DEFAULT_GRADE_YEAR_OFFSET: i32 = -1;

#[derive(Debug)]
pub struct PortalClient {
    session: Session,
    resolver: EndpointResolver,
    normalizer: NormalizerConfig,
}

impl PortalClient {
    /// Bind a fresh session to `institution` and/or an explicit `root_url`.
    ///
    /// Fails with a configuration error when neither yields a portal root.
    pub fn new(
        config: &Config,
        directory: Arc<dyn InstitutionDirectory>,
        institution: Option<&str>,
        root_url: Option<&str>,
    ) -> Result<Self, PortalError> {
        let resolver = EndpointResolver::new(
            directory,
            institution.map(str::to_owned),
            root_url.map(str::to_owned),
        );
        let root = resolver.root()?;
        let cookie_url = Url::parse(&root).map_err(|source| ConfigurationError::InvalidUrl {
            url: root.clone(),
            source,
        })?;

        let mut session = Session::new(cookie_url, config.request_timeout, config.user_agent.as_deref())?;
        if let Ok(login_url) = resolver.resolve(Endpoint::Login) {
            session.set_login_referer(&login_url);
        }
        debug!(root = root.as_str(), institution = ?institution, "portal client created");

        Ok(Self {
            session,
            resolver,
            normalizer: NormalizerConfig::default(),
        })
    }

    /// Restore a previously captured cookie set.
    pub fn with_cookies<K, V>(mut self, cookies: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.session.set_cookies(cookies);
        self
    }

    pub fn with_normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn cookies(&self) -> BTreeMap<String, String> {
        self.session.cookies()
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Whether the bound institution is configured as captcha-gated.
    ///
    /// Routing hint only; the login flow decides from the login page itself.
    pub fn requires_captcha(&self) -> bool {
        self.resolver
            .institution_id()
            .is_none_or(|id| self.resolver.directory().requires_captcha(id))
    }

    pub async fn login(&mut self, sid: &str, password: &str) -> LoginReport {
        auth::LoginFlow::new(&mut self.session, &self.resolver)
            .password_login(sid, password)
            .await
    }

    pub async fn login_with_captcha(
        &mut self,
        challenge: &LoginChallenge,
        password: &str,
        captcha: &str,
    ) -> LoginReport {
        auth::LoginFlow::new(&mut self.session, &self.resolver)
            .complete_challenge(challenge, password, captcha)
            .await
    }

    /// Fetch a fresh captcha challenge without attempting a login.
    pub async fn request_challenge(&mut self, sid: &str) -> LoginReport {
        auth::LoginFlow::new(&mut self.session, &self.resolver)
            .request_challenge(sid)
            .await
    }

    /// Portal `xqm` value for `term` under the bound institution.
    fn term_parameter(&self, term: u8) -> String {
        match self.resolver.institution_id() {
            Some(id) => self.resolver.directory().term_parameter(id, term),
            None => standard_term_parameter(term),
        }
    }

    /// Enrollment grade (`njdm_id`) used by course-selection forms for `year`.
    fn grade_year(&self, year: i32) -> i32 {
        match self.resolver.institution_id() {
            Some(id) => self.resolver.directory().grade_year(id, year),
            None => year + DEFAULT_GRADE_YEAR_OFFSET,
        }
    }

    /// Institution-level fields merged into course-selection forms.
    fn default_form_params(&self) -> Vec<(String, String)> {
        self.resolver
            .institution()
            .map(|c| c.default_form_params())
            .unwrap_or_default()
    }
}
