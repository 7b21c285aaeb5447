//! Teaching-quality evaluation: the ratable class menu, the rating form and the
//! form payload posted back on save/submit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::portal::document::{Document, Node};
use crate::portal::endpoints::join_root;
use crate::portal::errors::PortalError;
use crate::portal::normalize::values::{self, Loose};

pub const COMMENT_MAX_CHARS: usize = 500;
/// Sent when the caller leaves the comment blank; the portal refuses empty ones.
pub const EMPTY_COMMENT: &str = "无评语!";

const DEFAULT_MIN_SCORE: u32 = 30;
const DEFAULT_MAX_SCORE: u32 = 100;
const DEFAULT_WEIGHT: f64 = 0.2;

/// `items` row of the evaluation menu query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEvaluationRow {
    pub kch_id: Option<Loose>,
    pub kcmc: Option<Loose>,
    pub jzgmc: Option<Loose>,
    pub jxbmc: Option<Loose>,
    pub jxdd: Option<Loose>,
    pub sksj: Option<Loose>,
    pub jgmc: Option<Loose>,
    pub tjztmc: Option<Loose>,
    pub jxb_id: Option<Loose>,
    pub jgh_id: Option<Loose>,
    pub xsdm: Option<Loose>,
}

/// A class that can be rated, with the hidden ids the detail request needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationCourse {
    pub course_id: Option<String>,
    pub course_name: Option<String>,
    pub teacher: Option<String>,
    pub class_name: Option<String>,
    pub classroom: Option<String>,
    pub time: Option<String>,
    pub college: Option<String>,
    /// Portal status label, e.g. `"未评"` / `"已评完"`.
    pub status: Option<String>,
    pub jxb_id: Option<String>,
    pub jgh_id: Option<String>,
    pub xsdm: Option<String>,
}

impl From<&RawEvaluationRow> for EvaluationCourse {
    fn from(row: &RawEvaluationRow) -> Self {
        Self {
            course_id: values::text(&row.kch_id),
            course_name: values::text(&row.kcmc),
            teacher: values::text(&row.jzgmc),
            class_name: values::text(&row.jxbmc),
            classroom: values::text(&row.jxdd),
            time: values::text(&row.sksj),
            college: values::text(&row.jgmc),
            status: values::text(&row.tjztmc),
            jxb_id: values::text(&row.jxb_id),
            jgh_id: values::text(&row.jgh_id),
            xsdm: values::text(&row.xsdm),
        }
    }
}

impl EvaluationCourse {
    /// Form fields of the detail request for this class.
    pub fn detail_form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("jxb_id", self.jxb_id.clone().unwrap_or_default()),
            ("kch_id", self.course_id.clone().unwrap_or_default()),
            ("xsdm", self.xsdm.clone().unwrap_or_else(|| "01".to_string())),
            ("jgh_id", self.jgh_id.clone().unwrap_or_default()),
            ("tjzt", "-1".to_string()),
            ("pjmbmcb_id", String::new()),
            ("sfcjlrjs", "1".to_string()),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationMenu {
    pub count: usize,
    pub pages: u32,
    pub courses: Vec<EvaluationCourse>,
}

/// Data attributes of the `div.panel-pjdx` rating panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationPanel {
    pub pjmbmcb_id: String,
    pub pjdxdm: String,
    pub xspfb_id: String,
    pub fxzgf: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ItemInput {
    /// Item still open for rating.
    Editable {
        input_name: String,
        min_score: u32,
        max_score: u32,
        placeholder: String,
        current_value: String,
        weight: f64,
    },
    /// The class was already rated; the page only shows the given score.
    Scored { score: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationItem {
    pub content: String,
    pub pjzbxm_id: String,
    pub zsmbmcb_id: String,
    pub pfdjdmb_id: String,
    #[serde(flatten)]
    pub input: ItemInput,
}

impl EvaluationItem {
    fn from_row(row: Node<'_>) -> Option<Self> {
        let content_cell = row
            .select("td")
            .into_iter()
            .find(|td| td.attr("style").is_some_and(|s| s.contains("width: 400px")))?;
        let cells = row.select("td");
        let second = cells.get(1)?;

        let data = |name: &str| row.attr(name).unwrap_or_default().to_string();
        let pjzbxm_id = data("data-pjzbxm_id");

        let input = match row.first("input") {
            Some(input) => ItemInput::Editable {
                input_name: input
                    .attr("name")
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned)
                    .unwrap_or_else(|| pjzbxm_id.clone()),
                min_score: parse_or(input.attr("data-zxfz"), DEFAULT_MIN_SCORE),
                max_score: parse_or(input.attr("data-zdfz"), DEFAULT_MAX_SCORE),
                placeholder: input.attr("placeholder").unwrap_or_default().to_string(),
                current_value: input.attr("value").unwrap_or_default().to_string(),
                weight: parse_or(row.attr("data-qzz"), DEFAULT_WEIGHT),
            },
            None => ItemInput::Scored {
                score: second.text(),
            },
        };

        Some(Self {
            content: content_cell.text().replace('*', "").trim().to_string(),
            pjzbxm_id,
            zsmbmcb_id: data("data-zsmbmcb_id"),
            pfdjdmb_id: data("data-pfdjdmb_id"),
            input,
        })
    }

    pub fn is_editable(&self) -> bool {
        matches!(self.input, ItemInput::Editable { .. })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// The parsed rating form of one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationForm {
    /// Absolute URL the form posts to, when the page declares one.
    pub action: Option<String>,
    pub course_name: Option<String>,
    pub teacher_name: Option<String>,
    pub jxb_id: String,
    pub kch_id: String,
    pub jgh_id: String,
    pub xsdm: String,
    #[serde(flatten)]
    pub panel: EvaluationPanel,
    pub items: Vec<EvaluationItem>,
    pub comment_name: String,
    pub comment: String,
    pub comment_max_length: usize,
    pub is_evaluated: bool,
}

/// Parse the rating form page for `course`. Relative form actions are joined to `root`.
pub fn parse_evaluation_form(doc: &Document, root: &str, course: &EvaluationCourse) -> EvaluationForm {
    let panel = doc
        .first("div.panel-pjdx")
        .map(|p| {
            let data = |name: &str| p.attr(name).unwrap_or_default().to_string();
            EvaluationPanel {
                pjmbmcb_id: data("data-pjmbmcb_id"),
                pjdxdm: data("data-pjdxdm"),
                xspfb_id: data("data-xspfb_id"),
                fxzgf: data("data-fxzgf"),
            }
        })
        .unwrap_or_default();

    let action = doc
        .attr_of("form#ajaxForm1", "action")
        .filter(|a| !a.trim().is_empty())
        .and_then(|a| join_root(root, &a).ok())
        .map(String::from);

    let items: Vec<EvaluationItem> = doc
        .select("tr.tr-xspj")
        .into_iter()
        .filter_map(EvaluationItem::from_row)
        .collect();

    let comment_name = doc
        .select("textarea[id$='_py']")
        .first()
        .and_then(|t| t.attr("name"))
        .filter(|n| !n.is_empty())
        .unwrap_or("py")
        .to_string();

    EvaluationForm {
        action,
        course_name: course.course_name.clone(),
        teacher_name: course.teacher.clone(),
        jxb_id: course.jxb_id.clone().unwrap_or_default(),
        kch_id: course.course_id.clone().unwrap_or_default(),
        jgh_id: course.jgh_id.clone().unwrap_or_default(),
        xsdm: course.xsdm.clone().unwrap_or_else(|| "01".to_string()),
        panel,
        is_evaluated: items.iter().any(|i| !i.is_editable()),
        items,
        comment_name,
        comment: doc.text_of("#pyDiv .input-xspj").unwrap_or_default(),
        comment_max_length: COMMENT_MAX_CHARS,
    }
}

/// Whether the rating is saved as a draft or submitted for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Save,
    Submit,
}

impl SubmitMode {
    fn tjzt(self) -> &'static str {
        match self {
            Self::Save => "-1",
            Self::Submit => "1",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            Self::Save => "保存成功",
            Self::Submit => "提交成功",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Self::Save => "保存失败，请检查评价内容",
            Self::Submit => "提交失败，请检查评价内容",
        }
    }

    fn html_markers(self) -> [&'static str; 2] {
        match self {
            Self::Save => ["保存成功", "评价已保存"],
            Self::Submit => ["提交成功", "评价已提交"],
        }
    }
}

/// Caller-supplied ratings: scores keyed by item input name, plus a comment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationSubmission {
    pub scores: HashMap<String, u32>,
    #[serde(default)]
    pub comment: String,
}

impl EvaluationForm {
    /// Build the nested `modelList[0]...` payload for `submission`.
    ///
    /// Scores outside an item's bounds and over-long comments are rejected.
    /// Editable items without a score are left out.
    pub fn form_fields(
        &self,
        submission: &EvaluationSubmission,
        mode: SubmitMode,
    ) -> Result<Vec<(String, String)>, PortalError> {
        let comment = submission.comment.trim();
        if comment.chars().count() > self.comment_max_length {
            return Err(PortalError::invalid_input(format!(
                "comment exceeds {} characters",
                self.comment_max_length
            )));
        }

        let mut fields: Vec<(String, String)> = [
            ("ztpjbl", "100"),
            ("jszdpjbl", "0"),
            ("xykzpjbl", "0"),
            ("jxb_id", self.jxb_id.as_str()),
            ("kch_id", self.kch_id.as_str()),
            ("jgh_id", self.jgh_id.as_str()),
            ("xsdm", self.xsdm.as_str()),
            ("tjzt", mode.tjzt()),
            ("modelList[0].pjmbmcb_id", self.panel.pjmbmcb_id.as_str()),
            (
                "modelList[0].pjdxdm",
                if self.panel.pjdxdm.is_empty() { "01" } else { self.panel.pjdxdm.as_str() },
            ),
            ("modelList[0].xspfb_id", self.panel.xspfb_id.as_str()),
            ("modelList[0].fxzgf", self.panel.fxzgf.as_str()),
            (
                "modelList[0].py",
                if comment.is_empty() { EMPTY_COMMENT } else { comment },
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        for (idx, item) in self.items.iter().enumerate() {
            let ItemInput::Editable {
                input_name,
                min_score,
                max_score,
                ..
            } = &item.input
            else {
                continue;
            };
            let Some(&score) = submission.scores.get(input_name) else {
                continue;
            };
            if !(*min_score..=*max_score).contains(&score) {
                return Err(PortalError::invalid_input(format!(
                    "score {score} for '{}' must be between {min_score} and {max_score}",
                    item.content
                )));
            }

            let prefix = format!("modelList[0].xspjList[0].childXspjList[{idx}]");
            fields.push((format!("{prefix}.pjf"), score.to_string()));
            fields.push((format!("{prefix}.pjzbxm_id"), item.pjzbxm_id.clone()));
            fields.push((format!("{prefix}.pfdjdmb_id"), item.pfdjdmb_id.clone()));
            fields.push((format!("{prefix}.zsmbmcb_id"), item.zsmbmcb_id.clone()));
        }

        fields.push((
            "modelList[0].xspjList[0].pjzbxm_id".to_string(),
            self.items
                .first()
                .map(|i| i.pjzbxm_id.clone())
                .unwrap_or_default(),
        ));
        fields.push(("modelList[0].pjzt".to_string(), "1".to_string()));
        Ok(fields)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSaveResponse {
    code: Option<Loose>,
    msg: Option<Loose>,
}

/// Classify the portal's answer to a save/submit post.
pub fn classify_save_response(body: &str, mode: SubmitMode) -> Result<(), PortalError> {
    if let Ok(reply) = serde_json::from_str::<RawSaveResponse>(body) {
        let msg = values::text(&reply.msg).unwrap_or_default();
        let accepted = reply.code.as_ref().and_then(Loose::as_i64) == Some(200)
            || msg.contains("成功")
            || (mode == SubmitMode::Save && msg.contains("保存"));
        return if accepted {
            Ok(())
        } else if msg.is_empty() {
            Err(PortalError::Business(mode.failure_message().to_string()))
        } else {
            Err(PortalError::Business(msg))
        };
    }

    if mode.html_markers().iter().any(|m| body.contains(m)) {
        return Ok(());
    }
    for phrase in ["评价分数不能为空", "评语不能超过500字"] {
        if body.contains(phrase) {
            return Err(PortalError::Business(phrase.to_string()));
        }
    }
    Err(PortalError::Business(mode.failure_message().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DETAIL_PAGE: &str = r#"
        <div class="panel panel-default panel-pjdx" data-pjmbmcb_id="M01" data-pjdxdm="01"
             data-xspfb_id="F99" data-fxzgf="">
          <form id="ajaxForm1" action="/jwglxt/xspjgl/xspj_tjXspj.html?gnmkdm=N401605">
            <table>
              <tr class="tr-xspj" data-pjzbxm_id="P1" data-zsmbmcb_id="Z1" data-pfdjdmb_id="D1" data-qzz="0.3">
                <td style="width: 400px;">*教学准备充分</td>
                <td><input name="pf_P1" data-zxfz="60" data-zdfz="100" placeholder="60-100" value=""/></td>
              </tr>
              <tr class="tr-xspj" data-pjzbxm_id="P2" data-zsmbmcb_id="Z2" data-pfdjdmb_id="D2">
                <td style="width: 400px;">讲解清晰</td>
                <td><input data-zdfz="90"/></td>
              </tr>
              <tr class="tr-xspj"><td>no content cell</td><td>x</td></tr>
            </table>
            <textarea id="M01_py" name="pyxx"></textarea>
          </form>
        </div>"#;

    fn course() -> EvaluationCourse {
        let row: RawEvaluationRow = serde_json::from_value(serde_json::json!({
            "kch_id": "B1001", "kcmc": "高等数学A", "jzgmc": "李四",
            "jxb_id": "JXB01", "jgh_id": "T01", "tjztmc": "未评"
        }))
        .unwrap();
        EvaluationCourse::from(&row)
    }

    fn form() -> EvaluationForm {
        parse_evaluation_form(
            &Document::parse(DETAIL_PAGE),
            "https://jw.example.edu.cn/",
            &course(),
        )
    }

    // --- parsing ---

    #[test]
    fn test_detail_form_defaults_student_code() {
        let fields = course().detail_form();
        assert!(fields.contains(&("xsdm", "01".to_string())));
        assert!(fields.contains(&("tjzt", "-1".to_string())));
        assert!(fields.contains(&("jgh_id", "T01".to_string())));
    }

    #[test]
    fn test_parse_form() {
        let form = form();
        assert_eq!(
            form.action.as_deref(),
            Some("https://jw.example.edu.cn/jwglxt/xspjgl/xspj_tjXspj.html?gnmkdm=N401605")
        );
        assert_eq!(form.panel.pjmbmcb_id, "M01");
        assert_eq!(form.panel.xspfb_id, "F99");
        assert_eq!(form.comment_name, "pyxx");
        assert_eq!(form.comment, "");
        assert!(!form.is_evaluated);
        assert_eq!(form.items.len(), 2);

        let first = &form.items[0];
        assert_eq!(first.content, "教学准备充分");
        assert_eq!(
            first.input,
            ItemInput::Editable {
                input_name: "pf_P1".into(),
                min_score: 60,
                max_score: 100,
                placeholder: "60-100".into(),
                current_value: String::new(),
                weight: 0.3,
            }
        );

        // name falls back to the row id, bounds and weight to their defaults
        let ItemInput::Editable {
            input_name,
            min_score,
            max_score,
            weight,
            ..
        } = &form.items[1].input
        else {
            panic!("expected editable item");
        };
        assert_eq!(input_name, "P2");
        assert_eq!((*min_score, *max_score), (30, 90));
        assert_eq!(*weight, 0.2);
    }

    #[test]
    fn test_parse_already_evaluated() {
        let html = r#"
            <table><tr class="tr-xspj" data-pjzbxm_id="P1"><td style="width: 400px">态度认真</td><td>95</td></tr></table>
            <div id="pyDiv"><div class="input-xspj">很好的老师</div></div>"#;
        let form = parse_evaluation_form(&Document::parse(html), "https://jw.example.edu.cn/", &course());
        assert!(form.is_evaluated);
        assert!(form.action.is_none());
        assert_eq!(form.comment_name, "py");
        assert_eq!(form.comment, "很好的老师");
        assert_eq!(form.items[0].input, ItemInput::Scored { score: "95".into() });
    }

    // --- payload ---

    #[test]
    fn test_form_fields_nested_layout() {
        let submission = EvaluationSubmission {
            scores: HashMap::from([("pf_P1".to_string(), 95), ("P2".to_string(), 88)]),
            comment: "  ".into(),
        };
        let fields: HashMap<String, String> = form()
            .form_fields(&submission, SubmitMode::Submit)
            .unwrap()
            .into_iter()
            .collect();

        assert_eq!(fields["tjzt"], "1");
        assert_eq!(fields["modelList[0].py"], EMPTY_COMMENT);
        assert_eq!(fields["modelList[0].pjdxdm"], "01");
        assert_eq!(fields["modelList[0].xspjList[0].childXspjList[0].pjf"], "95");
        assert_eq!(fields["modelList[0].xspjList[0].childXspjList[1].pjf"], "88");
        assert_eq!(fields["modelList[0].xspjList[0].childXspjList[1].zsmbmcb_id"], "Z2");
        assert_eq!(fields["modelList[0].xspjList[0].pjzbxm_id"], "P1");
        assert_eq!(fields["modelList[0].pjzt"], "1");
    }

    #[test]
    fn test_form_fields_rejects_out_of_range_score() {
        let submission = EvaluationSubmission {
            scores: HashMap::from([("pf_P1".to_string(), 50)]),
            comment: String::new(),
        };
        let err = form().form_fields(&submission, SubmitMode::Save).unwrap_err();
        assert_eq!(err.code().as_u16(), 400);
    }

    #[test]
    fn test_form_fields_rejects_long_comment() {
        let submission = EvaluationSubmission {
            scores: HashMap::new(),
            comment: "好".repeat(501),
        };
        assert!(matches!(
            form().form_fields(&submission, SubmitMode::Save),
            Err(PortalError::InvalidInput(_))
        ));
    }

    // --- responses ---

    #[test]
    fn test_classify_save_response() {
        assert!(classify_save_response(r#"{"code":200}"#, SubmitMode::Submit).is_ok());
        assert!(classify_save_response(r#"{"msg":"保存数据"}"#, SubmitMode::Save).is_ok());
        assert!(classify_save_response(r#"{"msg":"保存数据"}"#, SubmitMode::Submit).is_err());
        assert!(classify_save_response("<p>评价已提交</p>", SubmitMode::Submit).is_ok());

        let err = classify_save_response(r#"{"code":500,"msg":"评价时间已过"}"#, SubmitMode::Submit)
            .unwrap_err();
        assert_eq!(err.to_string(), "评价时间已过");

        let err = classify_save_response("<div>评价分数不能为空</div>", SubmitMode::Save).unwrap_err();
        assert_eq!(err.to_string(), "评价分数不能为空");
    }
}
