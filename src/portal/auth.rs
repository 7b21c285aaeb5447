//! Login protocol as an explicit state machine.
//!
//! ```text
//! Start -> CsrfObtained -> PublicKeyObtained -> CaptchaRequired
//!                                            -> Ready -> Submitted -> Authenticated
//!                                                                  -> Rejected
//!                                                                  -> Indeterminate
//! ```
//!
//! A captcha-gated portal stops at `CaptchaRequired` and hands back a
//! [`LoginChallenge`]; the caller completes it with
//! [`LoginFlow::complete_challenge`], which re-enters at `Ready`.

use std::collections::BTreeMap;

use custom_debug_derive::Debug as CustomDebug;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::portal::crypto;
use crate::portal::endpoints::{Endpoint, EndpointResolver};
use crate::portal::envelope::{Envelope, ResultCode};
use crate::portal::errors::PortalError;
use crate::portal::session::{HeaderProfile, Session};

/// Markers only present on pages served to a logged-in user.
const LOGGED_IN_MARKERS: [&str; 3] = ["退出登录", "个人信息", "main"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoginStage {
    Start,
    CsrfObtained,
    PublicKeyObtained,
    CaptchaRequired,
    Ready,
    Submitted,
    Authenticated,
    Rejected,
    Indeterminate,
}

/// Everything needed to finish a captcha-gated login in a later call.
#[derive(CustomDebug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginChallenge {
    pub sid: String,
    #[debug(with = crate::fmt::redacted)]
    pub csrf_token: String,
    /// Pre-authentication cookies the captcha is bound to.
    #[debug(with = crate::fmt::redacted)]
    pub cookies: BTreeMap<String, String>,
    #[debug(skip)]
    pub modulus: String,
    #[debug(skip)]
    pub exponent: String,
    /// Base64 captcha image.
    #[debug(with = crate::fmt::len_only)]
    pub kaptcha_pic: String,
    /// Unix seconds at which the challenge was issued.
    pub timestamp: i64,
}

/// Extra context returned when a submission matched neither a success nor an
/// error marker.
#[derive(CustomDebug, Clone, PartialEq, Serialize)]
pub struct LoginDiagnostics {
    pub content_length: usize,
    pub has_tips: bool,
    pub cookies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[debug(skip_if = Option::is_none, with = crate::fmt::opt)]
    pub original_cookies: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated { cookies: BTreeMap<String, String> },
    CaptchaRequired(LoginChallenge),
    WrongCredentials,
    WrongCaptcha,
    /// The portal showed an error banner with this text.
    Rejected(String),
    Indeterminate(LoginDiagnostics),
}

/// Payload of a login envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LoginData {
    Cookies { cookies: BTreeMap<String, String> },
    Challenge(LoginChallenge),
    Diagnostics(LoginDiagnostics),
}

impl LoginOutcome {
    pub fn code(&self) -> ResultCode {
        match self {
            Self::Authenticated { .. } => ResultCode::Success,
            Self::CaptchaRequired(_) => ResultCode::CaptchaRequired,
            Self::WrongCredentials => ResultCode::WrongCredentials,
            Self::WrongCaptcha => ResultCode::WrongCaptcha,
            Self::Rejected(_) => ResultCode::PortalRejected,
            Self::Indeterminate(_) => ResultCode::Unclassified,
        }
    }

    pub fn into_envelope(self) -> Envelope<LoginData> {
        let code = self.code();
        match self {
            Self::Authenticated { cookies } => Envelope::success("登录成功", LoginData::Cookies { cookies }),
            Self::CaptchaRequired(challenge) => {
                Envelope::with_code(code, "获取验证码成功", Some(LoginData::Challenge(challenge)))
            }
            Self::WrongCredentials => Envelope::with_code(code, "用户名或密码不正确", None),
            Self::WrongCaptcha => Envelope::with_code(code, "验证码输入错误", None),
            Self::Rejected(text) => Envelope::with_code(code, text, None),
            Self::Indeterminate(diagnostics) => Envelope::with_code(
                code,
                "未知登录状态，请检查响应",
                Some(LoginData::Diagnostics(diagnostics)),
            ),
        }
    }
}

/// Result of one run of the login machine, with the stages it went through.
#[derive(Debug)]
pub struct LoginReport {
    pub stages: Vec<LoginStage>,
    pub result: Result<LoginOutcome, PortalError>,
}

impl LoginReport {
    pub fn into_envelope(self) -> Envelope<LoginData> {
        match self.result {
            Ok(outcome) => outcome.into_envelope(),
            Err(err) => Envelope::from_error(&err),
        }
    }
}

/// How the submission page was read.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    WrongCredentials,
    WrongCaptcha,
    Rejected(String),
    LoggedIn,
    Unknown,
}

/// Classify the page returned by the login POST.
///
/// The `p#tips` banner wins over any logged-in marker. On the captcha path a
/// banner mentioning the captcha is reported before a credentials complaint.
fn classify_submission(body: &str, captcha_path: bool) -> Verdict {
    let doc = crate::portal::document::Document::parse(body);
    if let Some(tips) = doc.first("p#tips") {
        let text = tips.text();
        return if captcha_path && text.contains("验证码") {
            Verdict::WrongCaptcha
        } else if text.contains("用户名或密码") {
            Verdict::WrongCredentials
        } else {
            Verdict::Rejected(text)
        };
    }
    if LOGGED_IN_MARKERS.iter().any(|m| body.contains(m)) {
        Verdict::LoggedIn
    } else {
        Verdict::Unknown
    }
}

#[derive(Deserialize)]
struct RawPublicKey {
    modulus: Option<String>,
    exponent: Option<String>,
}

/// State gathered before the form can be submitted.
struct Prepared {
    login_url: Url,
    csrf_token: String,
    modulus: String,
    exponent: String,
    captcha_input: bool,
    cookies: BTreeMap<String, String>,
}

/// Drives one login attempt over a borrowed session.
pub struct LoginFlow<'c> {
    session: &'c mut Session,
    resolver: &'c EndpointResolver,
    stages: Vec<LoginStage>,
}

impl<'c> LoginFlow<'c> {
    pub fn new(session: &'c mut Session, resolver: &'c EndpointResolver) -> Self {
        Self {
            session,
            resolver,
            stages: Vec::new(),
        }
    }

    fn enter(&mut self, stage: LoginStage) {
        debug!(stage = ?stage, "login stage");
        self.stages.push(stage);
    }

    fn finish(self, result: Result<LoginOutcome, PortalError>) -> LoginReport {
        match &result {
            Ok(outcome) => info!(code = outcome.code().as_u16(), stages = ?self.stages, "login finished"),
            Err(err) => warn!(error = %err, stages = ?self.stages, "login failed"),
        }
        LoginReport {
            stages: self.stages,
            result,
        }
    }

    /// Password login. Stops with a challenge when the login page asks for a captcha.
    pub async fn password_login(mut self, sid: &str, password: &str) -> LoginReport {
        let result = self.run_password_login(sid, password).await;
        self.finish(result)
    }

    /// Finish a captcha-gated login started by [`Self::password_login`] or
    /// [`Self::request_challenge`].
    pub async fn complete_challenge(mut self, challenge: &LoginChallenge, password: &str, captcha: &str) -> LoginReport {
        let result = self.run_challenge(challenge, password, captcha).await;
        self.finish(result)
    }

    /// Always fetch a fresh captcha, whether or not the login page shows one.
    pub async fn request_challenge(mut self, sid: &str) -> LoginReport {
        let result = self.run_request_challenge(sid).await;
        self.finish(result)
    }

    async fn run_request_challenge(&mut self, sid: &str) -> Result<LoginOutcome, PortalError> {
        let prepared = self.prepare().await?;
        let kaptcha_pic = self.fetch_captcha().await?;
        self.enter(LoginStage::CaptchaRequired);
        // the captcha endpoint may rotate the session cookie
        let cookies = self.session.cookies();
        Ok(LoginOutcome::CaptchaRequired(LoginChallenge {
            cookies,
            ..challenge_from(sid, prepared, kaptcha_pic)
        }))
    }

    async fn run_password_login(&mut self, sid: &str, password: &str) -> Result<LoginOutcome, PortalError> {
        let prepared = self.prepare().await?;

        if prepared.captcha_input {
            let kaptcha_pic = self.fetch_captcha().await?;
            self.enter(LoginStage::CaptchaRequired);
            return Ok(LoginOutcome::CaptchaRequired(challenge_from(sid, prepared, kaptcha_pic)));
        }

        self.enter(LoginStage::Ready);
        let mm = crypto::encrypt_password(password, &prepared.modulus, &prepared.exponent)?;
        let form = [
            ("csrftoken", prepared.csrf_token.as_str()),
            ("yhm", sid),
            ("mm", mm.as_str()),
        ];
        self.submit(&prepared.login_url, &form, None).await
    }

    async fn run_challenge(
        &mut self,
        challenge: &LoginChallenge,
        password: &str,
        captcha: &str,
    ) -> Result<LoginOutcome, PortalError> {
        let login_url = self.resolver.resolve(Endpoint::Login)?;
        self.session.set_login_referer(&login_url);
        self.session.set_cookies(challenge.cookies.clone());
        self.enter(LoginStage::Ready);

        let mm = crypto::encrypt_password(password, &challenge.modulus, &challenge.exponent)?;
        let form = [
            ("csrftoken", challenge.csrf_token.as_str()),
            ("yhm", challenge.sid.as_str()),
            ("mm", mm.as_str()),
            ("yzm", captcha),
        ];
        self.submit(&login_url, &form, Some(&challenge.cookies)).await
    }

    /// `Start -> CsrfObtained -> PublicKeyObtained`.
    async fn prepare(&mut self) -> Result<Prepared, PortalError> {
        self.enter(LoginStage::Start);
        let login_url = self.resolver.resolve(Endpoint::Login)?;
        let key_url = self.resolver.resolve(Endpoint::PublicKey)?;
        self.session.set_login_referer(&login_url);

        let page = self.session.get(&login_url, HeaderProfile::Page).await?.ensure_ok()?;
        let doc = page.document();
        let csrf_token = doc
            .attr_of("#csrftoken", "value")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PortalError::protocol("login page has no CSRF token"))?;
        let captcha_input = doc.exists("input#yzm");
        let cookies = self.session.cookies();
        self.enter(LoginStage::CsrfObtained);

        let key: RawPublicKey = self.session.get(&key_url, HeaderProfile::Page).await?.ensure_ok()?.json()?;
        let (Some(modulus), Some(exponent)) = (
            key.modulus.filter(|m| !m.is_empty()),
            key.exponent.filter(|e| !e.is_empty()),
        ) else {
            return Err(PortalError::protocol("public key response is incomplete"));
        };
        self.enter(LoginStage::PublicKeyObtained);

        Ok(Prepared {
            login_url,
            csrf_token,
            modulus,
            exponent,
            captcha_input,
            cookies,
        })
    }

    async fn fetch_captcha(&mut self) -> Result<String, PortalError> {
        let url = self.resolver.resolve(Endpoint::Captcha)?;
        let (status, bytes) = self.session.get_bytes(&url).await?;
        if status != 200 {
            return Err(PortalError::protocol(format!("captcha request failed with status {status}")));
        }
        debug!(len = bytes.len(), "captcha fetched");
        Ok(crypto::encode_bytes(&bytes))
    }

    /// `Ready -> Submitted -> {Authenticated | Rejected | Indeterminate}`.
    async fn submit(
        &mut self,
        login_url: &Url,
        form: &[(&str, &str)],
        original_cookies: Option<&BTreeMap<String, String>>,
    ) -> Result<LoginOutcome, PortalError> {
        let response = self
            .session
            .post_form(login_url, form, HeaderProfile::Page)
            .await?
            .ensure_ok()?;
        self.enter(LoginStage::Submitted);

        let outcome = match classify_submission(&response.body, original_cookies.is_some()) {
            Verdict::LoggedIn => {
                self.enter(LoginStage::Authenticated);
                let jar = self.session.cookies();
                let cookies = match original_cookies {
                    Some(original) => {
                        let cookies = carry_route(&response.issued_cookies, original, jar);
                        if let Some(route) = cookies.get("route") {
                            self.session.set_cookies([("route", route.as_str())]);
                        }
                        cookies
                    }
                    None => jar,
                };
                LoginOutcome::Authenticated { cookies }
            }
            Verdict::WrongCredentials => LoginOutcome::WrongCredentials,
            Verdict::WrongCaptcha => LoginOutcome::WrongCaptcha,
            Verdict::Rejected(text) => LoginOutcome::Rejected(text),
            Verdict::Unknown => {
                self.enter(LoginStage::Indeterminate);
                return Ok(LoginOutcome::Indeterminate(LoginDiagnostics {
                    content_length: response.body.len(),
                    has_tips: response.document().by_id("tips").is_some(),
                    cookies: self.session.cookies(),
                    original_cookies: original_cookies.cloned(),
                }));
            }
        };
        if !matches!(outcome, LoginOutcome::Authenticated { .. }) {
            self.enter(LoginStage::Rejected);
        }
        Ok(outcome)
    }
}

/// Some deployments drop the load-balancer `route` cookie when answering a
/// captcha login; the session only stays valid when it is carried over, so
/// the result is pinned to `{JSESSIONID, route}`.
fn carry_route(
    issued: &BTreeMap<String, String>,
    original: &BTreeMap<String, String>,
    jar: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let Some(route) = original.get("route") else {
        return jar;
    };
    if issued.contains_key("route") {
        return jar;
    }
    let jsessionid = issued
        .get("JSESSIONID")
        .or_else(|| jar.get("JSESSIONID"))
        .or_else(|| original.get("JSESSIONID"))
        .cloned()
        .unwrap_or_default();
    debug!("login response dropped the route cookie, carrying it over");
    BTreeMap::from([
        ("JSESSIONID".to_string(), jsessionid),
        ("route".to_string(), route.clone()),
    ])
}

fn challenge_from(sid: &str, prepared: Prepared, kaptcha_pic: String) -> LoginChallenge {
    LoginChallenge {
        sid: sid.to_string(),
        csrf_token: prepared.csrf_token,
        cookies: prepared.cookies,
        modulus: prepared.modulus,
        exponent: prepared.exponent,
        kaptcha_pic,
        timestamp: chrono::Utc::now().timestamp(),
    }
}
