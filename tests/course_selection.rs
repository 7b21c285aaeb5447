//! Course-selection listings and mutations against a mock portal with
//! institution-configured URLs.

mod helpers;

use eduportal::ResultCode;
use helpers::{form_fields, html_response, json_response, portal_path, posts_to, school_client};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const BLOCK_INDEX: &str = "xsxk/zzxkyzb_cxZzxkYzbIndex.html";
const BLOCK_LIST: &str = "xsxk/zzxkyzb_cxZzxkYzbPartDisplay.html";
const CLASS_LIST: &str = "xsxk/zzxkyzbjk_cxJxbWithKchZzxkYzb.html";
const DROP: &str = "xsxk/zzxkyzb_tuikBcZzxkYzb.html";
const SELECT: &str = "xsxk/zzxkyzbjk_xkBcZyZzxkYzb.html";

fn configure_urls(school: &mut eduportal::config::InstitutionConfig) {
    for (key, relative) in [
        ("block_courses_index", BLOCK_INDEX),
        ("block_courses", BLOCK_LIST),
        ("course_classes", CLASS_LIST),
        ("drop_course", DROP),
        ("select_course", SELECT),
    ] {
        school.urls.insert(key.to_string(), format!("{relative}?gnmkdm=N253512"));
    }
    school.parameters.grade_year_offset = -1;
    school
        .parameters
        .default_params
        .insert("jg_id".to_string(), json!("14"));
}

fn catalog_row(n: u32) -> Value {
    json!({
        "kch_id": format!("K{n:03}"), "jxb_id": format!("J{n:03}"), "do_jxb_id": format!("D{n:03}"),
        "kcmc": format!("课程{n}"), "jsxx": "T001/王五/讲师", "xf": "2",
        "jxbrl": "60", "yxzrs": n.to_string(), "sfkx": "1"
    })
}

/// Serves a fixed number of catalog rows, paged by the `kspage`/`jspage` row range.
struct CatalogPages {
    total: u32,
}

impl Respond for CatalogPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let form = form_fields(request);
        let first: u32 = form["kspage"].parse().unwrap();
        let last: u32 = form["jspage"].parse().unwrap();
        if first > self.total {
            return json_response(json!({"tmpList": []}));
        }
        let rows: Vec<Value> = (first..=last.min(self.total)).map(catalog_row).collect();
        json_response(json!({"tmpList": rows, "sfxsjc": "1"}))
    }
}

async fn mount_catalog(server: &MockServer, total: u32) {
    Mock::given(method("GET"))
        .and(path(portal_path(BLOCK_INDEX)))
        .respond_with(html_response("<html><body>自主选课</body></html>"))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(portal_path(BLOCK_LIST)))
        .respond_with(CatalogPages { total })
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_block_catalog_walks_every_page() {
    let server = MockServer::start().await;
    mount_catalog(&server, 23).await;

    let mut portal = school_client(&server, configure_urls);
    let envelope = portal.block_courses(2024, 1, 2).await;
    assert_eq!(envelope.code, ResultCode::Success);
    let catalog = envelope.data.expect("catalog");
    assert_eq!(catalog.count, 23);
    assert_eq!(catalog.pages, 3);
    assert_eq!(catalog.block, 2);

    let first = &catalog.courses[0];
    assert_eq!(first.course_id.as_deref(), Some("K001"));
    assert_eq!(first.teacher_id.as_deref(), Some("T001"));
    assert_eq!(first.teacher.as_deref(), Some("王五"));
    assert_eq!(first.credit, 2.0);
    assert_eq!(first.available, 59);
    assert!(first.optional);

    let posts = posts_to(&server, BLOCK_LIST).await;
    let ranges: Vec<(String, String)> = posts
        .iter()
        .map(|p| {
            let form = form_fields(p);
            (form["kspage"].clone(), form["jspage"].clone())
        })
        .collect();
    assert_eq!(
        ranges,
        vec![
            ("1".to_string(), "10".to_string()),
            ("11".to_string(), "20".to_string()),
            ("21".to_string(), "30".to_string()),
        ]
    );

    let form = form_fields(&posts[0]);
    assert_eq!(form["xkxnm"], "2024");
    assert_eq!(form["xkxqm"], "3");
    assert_eq!(form["njdm_id"], "2023");
    assert_eq!(form["jg_id"], "14");
    assert_eq!(form["rwlx"], "2");
}

#[tokio::test]
async fn test_exact_multiple_stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_catalog(&server, 20).await;

    let mut portal = school_client(&server, configure_urls);
    let catalog = portal.block_courses(2024, 2, 1).await.data.expect("catalog");
    assert_eq!(catalog.count, 20);
    assert_eq!(catalog.pages, 2);
    assert_eq!(posts_to(&server, BLOCK_LIST).await.len(), 3);
}

#[tokio::test]
async fn test_empty_block_is_reported_empty() {
    let server = MockServer::start().await;
    mount_catalog(&server, 0).await;

    let mut portal = school_client(&server, configure_urls);
    assert_eq!(portal.block_courses(2024, 1, 3).await.code, ResultCode::Empty);
}

#[tokio::test]
async fn test_selection_urls_are_required() {
    let server = MockServer::start().await;
    let mut portal = school_client(&server, |_| {});
    let envelope = portal.block_courses(2024, 1, 1).await;
    assert_eq!(envelope.code, ResultCode::ServiceFailure);
    assert!(
        server.received_requests().await.unwrap_or_default().is_empty(),
        "nothing may be sent without a configured URL"
    );
}

#[tokio::test]
async fn test_course_classes_sentinel_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(portal_path(CLASS_LIST)))
        .respond_with(ResponseTemplate::new(200).set_body_raw("\"0\"", "text/html"))
        .mount(&server)
        .await;

    let mut portal = school_client(&server, configure_urls);
    assert_eq!(portal.course_classes(2024, 1, "K001").await.code, ResultCode::Empty);

    let form = form_fields(&posts_to(&server, CLASS_LIST).await[0]);
    assert_eq!(form["kch_id"], "K001");
}

#[tokio::test]
async fn test_course_classes_lists_classes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(portal_path(CLASS_LIST)))
        .respond_with(json_response(json!([catalog_row(7), catalog_row(8)])))
        .mount(&server)
        .await;

    let mut portal = school_client(&server, configure_urls);
    let classes = portal.course_classes(2024, 1, "K007").await.data.expect("classes");
    assert_eq!(classes.count, 2);
    assert_eq!(classes.classes[1].do_id.as_deref(), Some("D008"));
}

#[tokio::test]
async fn test_select_course_derives_grade_and_major() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(portal_path(SELECT)))
        .respond_with(json_response(json!({"flag": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut portal = school_client(&server, configure_urls);
    let envelope = portal.select_course("2108050101", "K001", "D001", "10", 2024, 1).await;
    assert_eq!(envelope.code, ResultCode::Success);
    assert_eq!(envelope.data, Some(json!({"flag": "1"})));

    let form = form_fields(&posts_to(&server, SELECT).await[0]);
    assert_eq!(form["njdm_id"], "21");
    assert_eq!(form["zyh_id"], "0805");
    assert_eq!(form["jxb_ids"], "D001");
    assert_eq!(form["qz"], "0");
}

#[tokio::test]
async fn test_select_course_rejects_short_sid() {
    let server = MockServer::start().await;
    let mut portal = school_client(&server, configure_urls);
    let envelope = portal.select_course("210", "K001", "D001", "10", 2024, 1).await;
    assert_eq!(envelope.code, ResultCode::InvalidInput);
    assert!(posts_to(&server, SELECT).await.is_empty());
}

#[tokio::test]
async fn test_drop_course_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(portal_path(DROP)))
        .respond_with(html_response("\"1\""))
        .expect(1)
        .mount(&server)
        .await;

    let mut portal = school_client(&server, configure_urls);
    let envelope = portal.drop_course("D001", "K001", 2024, 2).await;
    assert_eq!(envelope.code, ResultCode::Success);
    assert_eq!(envelope.data.map(|d| d.status), Some("1".to_string()));
}
