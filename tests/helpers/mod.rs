//! Shared fixtures for the mock-portal integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eduportal::PortalClient;
use eduportal::config::{Config, InstitutionConfig, InstitutionRegistry};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const SCHOOL: &str = "测试大学";

/// Portal root served by `server`, mirroring a `/jwglxt/` deployment.
pub fn root(server: &MockServer) -> String {
    format!("{}/jwglxt/", server.uri())
}

/// Absolute mock path for a portal-relative page.
pub fn portal_path(relative: &str) -> String {
    format!("/jwglxt/{relative}")
}

/// Client bound only to the mock root (standard term mapping, no institution URLs).
pub fn client(server: &MockServer) -> PortalClient {
    PortalClient::new(&Config::default(), Arc::new(InstitutionRegistry::default()), None, Some(&root(server)))
        .expect("mock root is a valid portal root")
}

/// Client bound to a registry entry whose `base_url` is the mock root.
pub fn school_client(server: &MockServer, configure: impl FnOnce(&mut InstitutionConfig)) -> PortalClient {
    let mut school = InstitutionConfig::new(SCHOOL, root(server));
    school.requires_captcha = false;
    configure(&mut school);

    let mut registry = InstitutionRegistry::default();
    registry.insert(school);
    PortalClient::new(&Config::default(), Arc::new(registry), Some(SCHOOL), None)
        .expect("mock institution is valid")
}

pub fn login_page(with_captcha: bool) -> String {
    let captcha = if with_captcha {
        r#"<input type="text" id="yzm" name="yzm"/><img id="yzmPic" src="kaptcha"/>"#
    } else {
        ""
    };
    format!(
        r#"<html><body><h5>用户登录</h5>
        <form id="form" action="/jwglxt/xtgl/login_slogin.html" method="post">
          <input type="hidden" id="csrftoken" name="csrftoken" value="csrf-0001"/>
          <input type="text" id="yhm" name="yhm"/>
          <input type="password" id="mm" name="mm"/>
          {captcha}
        </form></body></html>"#
    )
}

/// Serve the login page and a freshly generated public key; returns the private half.
pub async fn mount_login_prelude(server: &MockServer, with_captcha: bool) -> RsaPrivateKey {
    Mock::given(method("GET"))
        .and(path(portal_path("xtgl/login_slogin.html")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "JSESSIONID=PRE-LOGIN; Path=/")
                .set_body_raw(login_page(with_captcha), "text/html;charset=utf-8"),
        )
        .mount(server)
        .await;

    let key = RsaPrivateKey::new(&mut OsRng, 1024).expect("key generation");
    let public = serde_json::json!({
        "modulus": STANDARD.encode(key.n().to_bytes_be()),
        "exponent": STANDARD.encode(key.e().to_bytes_be()),
    });
    Mock::given(method("GET"))
        .and(path(portal_path("xtgl/login_getPublicKey.html")))
        .respond_with(json_response(public))
        .mount(server)
        .await;

    key
}

pub fn json_response(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/json;charset=utf-8")
}

pub fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html;charset=utf-8")
}

/// Decode an urlencoded request body into a name -> value map.
pub fn form_fields(request: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&request.body).into_owned().collect()
}

/// Every POST the server received for `relative`, in order.
pub async fn posts_to(server: &MockServer, relative: &str) -> Vec<Request> {
    let wanted = portal_path(relative);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == wanted)
        .collect()
}

pub fn header<'r>(request: &'r Request, name: &str) -> Option<&'r str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Recover the plaintext password from the `mm` field of a login post.
pub fn decrypt_password(key: &RsaPrivateKey, mm: &str) -> String {
    let ciphertext = STANDARD.decode(mm).expect("mm is base64");
    let plain = key.decrypt(Pkcs1v15Encrypt, &ciphertext).expect("mm decrypts");
    String::from_utf8(plain).expect("password is utf-8")
}

/// Page served in place of content once the session has lapsed.
pub const EXPIRED_PAGE: &str = r#"<html><head><title>用户登录</title></head><body><h5>用户登录</h5><input id="csrftoken" value="x"/></body></html>"#;
