//! Teaching-evaluation menu, rating form and submission against a mock portal.

mod helpers;

use std::collections::HashMap;

use eduportal::ResultCode;
use eduportal::portal::models::evaluation::EvaluationSubmission;
use helpers::{client, form_fields, header, html_response, json_response, portal_path, posts_to};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

const MENU: &str = "xspjgl/xspj_cxXspjIndex.html";
const DETAIL: &str = "xspjgl/xspj_cxXspjDisplay.html";
const SAVE: &str = "xspjgl/xspj_tjXspj.html";

const DETAIL_PAGE: &str = r#"
    <div class="panel panel-default panel-pjdx" data-pjmbmcb_id="M01" data-pjdxdm="01"
         data-xspfb_id="F99" data-fxzgf="">
      <form id="ajaxForm1" action="xspjgl/xspj_tjXspj.html?gnmkdm=N401605">
        <table>
          <tr class="tr-xspj" data-pjzbxm_id="P1" data-zsmbmcb_id="Z1" data-pfdjdmb_id="D1" data-qzz="0.5">
            <td style="width: 400px;">*教学准备充分</td>
            <td><input name="pf_P1" data-zxfz="60" data-zdfz="100" value=""/></td>
          </tr>
          <tr class="tr-xspj" data-pjzbxm_id="P2" data-zsmbmcb_id="Z2" data-pfdjdmb_id="D2" data-qzz="0.5">
            <td style="width: 400px;">讲解清晰</td>
            <td><input name="pf_P2" data-zxfz="60" data-zdfz="100" value=""/></td>
          </tr>
        </table>
        <textarea id="M01_py" name="py"></textarea>
      </form>
    </div>"#;

async fn mount_menu_and_detail(server: &MockServer, detail: &str) {
    Mock::given(method("POST"))
        .and(path(portal_path(MENU)))
        .respond_with(json_response(json!({
            "items": [{
                "kch_id": "B1001", "kcmc": "高等数学A", "jzgmc": "李四", "jxbmc": "高数A-01",
                "jxb_id": "JXB01", "jgh_id": "T01", "xsdm": "01", "tjztmc": "未评"
            }],
            "currentPage": 1,
            "totalPage": 1
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(portal_path(DETAIL)))
        .respond_with(html_response(detail))
        .mount(server)
        .await;
}

fn submission(scores: &[(&str, u32)], comment: &str) -> EvaluationSubmission {
    EvaluationSubmission {
        scores: scores
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<HashMap<_, _>>(),
        comment: comment.to_string(),
    }
}

#[tokio::test]
async fn test_menu_lists_ratable_classes() {
    let server = MockServer::start().await;
    mount_menu_and_detail(&server, DETAIL_PAGE).await;

    let mut portal = client(&server);
    let menu = portal.evaluation_menu().await.data.expect("menu");
    assert_eq!(menu.count, 1);
    assert_eq!(menu.pages, 1);
    assert_eq!(menu.courses[0].status.as_deref(), Some("未评"));

    let posts = posts_to(&server, MENU).await;
    let form = form_fields(&posts[0]);
    assert_eq!(form["queryModel.currentPage"], "1");
    assert_eq!(form["queryModel.showCount"], "15");
    assert_eq!(form["queryModel.sortName"], "kcmc,jzgmc ");
    assert!(header(&posts[0], "referer").is_some_and(|r| r.contains("layout=default")));
}

#[tokio::test]
async fn test_menu_stops_at_reported_last_page() {
    let server = MockServer::start().await;
    // A full page that the grid reports as its only one; asking for page 2
    // would get the same rows back.
    let rows: Vec<_> = (0..15)
        .map(|i| json!({"kch_id": format!("B{i:03}"), "kcmc": "课程", "jxb_id": format!("JXB{i:02}")}))
        .collect();
    Mock::given(method("POST"))
        .and(path(portal_path(MENU)))
        .respond_with(json_response(json!({"items": rows, "currentPage": 1, "totalPage": 1, "totalResult": 15})))
        .expect(1)
        .mount(&server)
        .await;

    let mut portal = client(&server);
    let menu = portal.evaluation_menu().await.data.expect("menu");
    assert_eq!(menu.count, 15);
    assert_eq!(menu.pages, 1);
    assert_eq!(menu.courses[14].jxb_id.as_deref(), Some("JXB14"));
}

#[tokio::test]
async fn test_detail_parses_the_rating_form() {
    let server = MockServer::start().await;
    mount_menu_and_detail(&server, DETAIL_PAGE).await;

    let mut portal = client(&server);
    let form = portal.evaluation_detail("JXB01").await.data.expect("form");
    assert_eq!(form.items.len(), 2);
    assert!(!form.is_evaluated);
    assert_eq!(form.teacher_name.as_deref(), Some("李四"));
    assert_eq!(
        form.action,
        Some(format!("{}/jwglxt/xspjgl/xspj_tjXspj.html?gnmkdm=N401605", server.uri()))
    );

    let detail = form_fields(&posts_to(&server, DETAIL).await[0]);
    assert_eq!(detail["jxb_id"], "JXB01");
    assert_eq!(detail["jgh_id"], "T01");
}

#[tokio::test]
async fn test_unknown_class_is_invalid_input() {
    let server = MockServer::start().await;
    mount_menu_and_detail(&server, DETAIL_PAGE).await;

    let mut portal = client(&server);
    assert_eq!(portal.evaluation_detail("NOPE").await.code, ResultCode::InvalidInput);
    assert!(posts_to(&server, DETAIL).await.is_empty());
}

#[tokio::test]
async fn test_closed_evaluation_is_empty() {
    let server = MockServer::start().await;
    mount_menu_and_detail(&server, "<div>目前未对你放开教学质量评价</div>").await;

    let mut portal = client(&server);
    assert_eq!(portal.evaluation_detail("JXB01").await.code, ResultCode::Empty);
}

#[tokio::test]
async fn test_submit_posts_scores() {
    let server = MockServer::start().await;
    mount_menu_and_detail(&server, DETAIL_PAGE).await;
    Mock::given(method("POST"))
        .and(path(portal_path(SAVE)))
        .respond_with(html_response("提交成功"))
        .expect(1)
        .mount(&server)
        .await;

    let mut portal = client(&server);
    let envelope = portal
        .submit_evaluation("JXB01", &submission(&[("pf_P1", 95), ("pf_P2", 88)], "  "))
        .await;
    assert_eq!(envelope.code, ResultCode::Success);
    assert_eq!(envelope.msg, "提交成功");

    let posts = posts_to(&server, SAVE).await;
    let form = form_fields(&posts[0]);
    assert_eq!(form["tjzt"], "1");
    assert_eq!(form["modelList[0].py"], "无评语!");
    assert_eq!(form["modelList[0].xspjList[0].childXspjList[0].pjf"], "95");
    assert_eq!(form["modelList[0].xspjList[0].childXspjList[1].pjzbxm_id"], "P2");
    assert_eq!(header(&posts[0], "x-requested-with"), Some("XMLHttpRequest"));
    assert!(header(&posts[0], "referer").is_some_and(|r| r.ends_with("jxb_id=JXB01")));
}

#[tokio::test]
async fn test_save_rejects_out_of_range_score() {
    let server = MockServer::start().await;
    mount_menu_and_detail(&server, DETAIL_PAGE).await;

    let mut portal = client(&server);
    let envelope = portal
        .save_evaluation("JXB01", &submission(&[("pf_P1", 20)], "好"))
        .await;
    assert_eq!(envelope.code, ResultCode::InvalidInput);
    assert!(posts_to(&server, SAVE).await.is_empty());
}

#[tokio::test]
async fn test_save_passes_portal_refusal_through() {
    let server = MockServer::start().await;
    mount_menu_and_detail(&server, DETAIL_PAGE).await;
    Mock::given(method("POST"))
        .and(path(portal_path(SAVE)))
        .respond_with(json_response(json!({"code": 0, "msg": "评价时间已结束"})))
        .mount(&server)
        .await;

    let mut portal = client(&server);
    let envelope = portal
        .save_evaluation("JXB01", &submission(&[("pf_P1", 90)], "讲得好"))
        .await;
    assert_eq!(envelope.code, ResultCode::PortalRejected);
    assert_eq!(envelope.msg, "评价时间已结束");

    let form = form_fields(&posts_to(&server, SAVE).await[0]);
    assert_eq!(form["tjzt"], "-1");
    assert!(!form.contains_key("modelList[0].xspjList[0].childXspjList[1].pjf"));
}
