//! Browser-shaped HTTP session: one cookie jar, one timeout, and the header
//! profiles the portal expects for page loads and XHR posts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::portal::document::Document;
use crate::portal::errors::PortalError;
use crate::portal::json::{self, is_json_content_type};
use crate::utils::{fmt_duration, log_if_slow};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT_PAGE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";
const ACCEPT_XHR: &str = "application/json, text/javascript, */*; q=0.01";
const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";
const SEC_CH_UA: &str = "\"Microsoft Edge\";v=\"137\", \"Chromium\";v=\"137\", \"Not/A)Brand\";v=\"24\"";

const SLOW_REQUEST: Duration = Duration::from_secs(5);

/// Which set of headers a request carries on top of the base browser set.
#[derive(Debug, Clone, Copy)]
pub enum HeaderProfile<'a> {
    /// Top-level navigation; `Referer` is the login page.
    Page,
    /// jQuery XHR with the full fetch-metadata set.
    Ajax { referer: &'a str },
    /// Minimal XHR form post, as sent by the timetable page.
    Xhr { referer: &'a str },
}

/// A fully read portal response.
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub url: String,
    pub body: String,
    /// Cookies set by this response's `Set-Cookie` headers.
    pub issued_cookies: BTreeMap<String, String>,
}

impl PortalResponse {
    /// Non-200 answers are reported as a service failure.
    pub fn ensure_ok(self) -> Result<Self, PortalError> {
        if self.status == 200 {
            Ok(self)
        } else {
            Err(PortalError::protocol(format!(
                "portal responded with status {} for {}",
                self.status, self.url
            )))
        }
    }

    pub fn is_json(&self) -> bool {
        is_json_content_type(self.content_type.as_deref())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, PortalError> {
        json::decode(&self.body).map_err(|source| PortalError::Decode {
            status: self.status,
            url: self.url.clone(),
            source,
        })
    }

    pub fn document(&self) -> Document {
        Document::parse(&self.body)
    }

    /// The portal serves its login page in place of content once the session lapses.
    pub fn ensure_logged_in(self) -> Result<Self, PortalError> {
        if self.body.contains("用户登录") && self.document().is_login_page() {
            Err(PortalError::SessionExpired)
        } else {
            Ok(self)
        }
    }
}

pub struct Session {
    client: reqwest::Client,
    jar: Arc<Jar>,
    cookie_url: Url,
    login_referer: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("cookie_url", &self.cookie_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session whose cookies are scoped to `cookie_url` (the portal root).
    pub fn new(cookie_url: Url, timeout: Duration, user_agent: Option<&str>) -> Result<Self, PortalError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .timeout(timeout)
            .cookie_provider(jar.clone())
            .build()?;

        Ok(Self {
            client,
            jar,
            cookie_url,
            login_referer: None,
            timeout,
        })
    }

    /// Page loads after login carry the login page as their `Referer`.
    pub fn set_login_referer(&mut self, url: &Url) {
        self.login_referer = Some(url.to_string());
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Snapshot of the cookies the jar would send to the portal root.
    pub fn cookies(&self) -> BTreeMap<String, String> {
        let Some(header) = self.jar.cookies(&self.cookie_url) else {
            return BTreeMap::new();
        };
        let Ok(raw) = header.to_str() else {
            return BTreeMap::new();
        };
        cookie::Cookie::split_parse(raw.to_owned())
            .filter_map(Result::ok)
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect()
    }

    /// Load saved cookies into the jar, overwriting cookies of the same name.
    pub fn set_cookies<K, V>(&mut self, cookies: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in cookies {
            let cookie = cookie::Cookie::build((name.into(), value.into()))
                .path("/")
                .build();
            self.jar.add_cookie_str(&cookie.to_string(), &self.cookie_url);
        }
    }

    fn headers(&self, profile: HeaderProfile<'_>) -> HeaderMap {
        let mut map = HeaderMap::new();
        put(&mut map, header::ACCEPT, ACCEPT_PAGE);
        put(&mut map, header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE);
        put(&mut map, header::CONNECTION, "keep-alive");
        put(&mut map, header::UPGRADE_INSECURE_REQUESTS, "1");
        if let Some(referer) = &self.login_referer {
            put(&mut map, header::REFERER, referer);
        }

        let origin = self.cookie_url.origin().ascii_serialization();
        match profile {
            HeaderProfile::Page => {}
            HeaderProfile::Ajax { referer } => {
                put(&mut map, header::ACCEPT, ACCEPT_XHR);
                put(&mut map, header::CACHE_CONTROL, "no-cache");
                put(&mut map, header::CONTENT_TYPE, FORM_CONTENT_TYPE);
                put(&mut map, header::DNT, "1");
                put(&mut map, header::ORIGIN, &origin);
                put(&mut map, header::PRAGMA, "no-cache");
                put(&mut map, header::REFERER, referer);
                put_named(&mut map, "sec-ch-ua", SEC_CH_UA);
                put_named(&mut map, "sec-ch-ua-mobile", "?0");
                put_named(&mut map, "sec-ch-ua-platform", "\"Windows\"");
                put_named(&mut map, "sec-fetch-dest", "empty");
                put_named(&mut map, "sec-fetch-mode", "cors");
                put_named(&mut map, "sec-fetch-site", "same-origin");
                put_named(&mut map, "x-requested-with", "XMLHttpRequest");
            }
            HeaderProfile::Xhr { referer } => {
                put(&mut map, header::ACCEPT, "*/*");
                put(&mut map, header::CACHE_CONTROL, "no-cache");
                put(&mut map, header::CONTENT_TYPE, FORM_CONTENT_TYPE);
                put(&mut map, header::ORIGIN, &origin);
                put(&mut map, header::PRAGMA, "no-cache");
                put(&mut map, header::REFERER, referer);
                put_named(&mut map, "x-requested-with", "XMLHttpRequest");
            }
        }
        map
    }

    pub async fn get(&mut self, url: &Url, profile: HeaderProfile<'_>) -> Result<PortalResponse, PortalError> {
        let request = self.client.get(url.clone()).headers(self.headers(profile));
        self.execute("GET", url, request).await
    }

    pub async fn post_form<F>(
        &mut self,
        url: &Url,
        form: &F,
        profile: HeaderProfile<'_>,
    ) -> Result<PortalResponse, PortalError>
    where
        F: Serialize + ?Sized,
    {
        let request = self
            .client
            .post(url.clone())
            .headers(self.headers(profile))
            .form(form);
        self.execute("POST", url, request).await
    }

    /// GET a binary resource such as the captcha image.
    pub async fn get_bytes(&mut self, url: &Url) -> Result<(u16, Vec<u8>), PortalError> {
        let start = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .headers(self.headers(HeaderProfile::Page))
            .send()
            .await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        log_if_slow(start, SLOW_REQUEST, "GET", url.as_str());
        debug!(url = url.as_str(), status, len = bytes.len(), "fetched binary resource");
        Ok((status, bytes.to_vec()))
    }

    async fn execute(
        &mut self,
        method: &'static str,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<PortalResponse, PortalError> {
        let start = Instant::now();
        let response = request.send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let final_url = response.url().to_string();
        let issued_cookies: BTreeMap<String, String> = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let body = response.text().await?;

        log_if_slow(start, SLOW_REQUEST, method, url.as_str());
        debug!(
            method,
            url = url.as_str(),
            status,
            content_type = content_type.as_deref().unwrap_or_default(),
            len = body.len(),
            duration = fmt_duration(start.elapsed()),
            "portal request"
        );
        if final_url != url.as_str() {
            trace!(from = url.as_str(), to = final_url.as_str(), "followed redirect");
        }

        Ok(PortalResponse {
            status,
            content_type,
            url: final_url,
            body,
            issued_cookies,
        })
    }
}

fn put(map: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        map.insert(name, value);
    }
}

fn put_named(map: &mut HeaderMap, name: &'static str, value: &str) {
    put(map, HeaderName::from_static(name), value);
}
