//! Student profile and the page parsers that feed it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::portal::document::Document;
use crate::portal::normalize::values::{self, Loose};

/// Placeholder the portal UI shows for blank profile fields.
pub const MISSING: &str = "无";

/// Profile JSON endpoint payload. Some deployments send the display name in the
/// `zs*` fields and the id in the plain one, so both are kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawProfile {
    pub xh: Option<Loose>,
    pub xm: Option<Loose>,
    pub zsjg_id: Option<Loose>,
    pub jg_id: Option<Loose>,
    pub zszyh_id: Option<Loose>,
    pub zyh_id: Option<Loose>,
    pub bh_id: Option<Loose>,
    pub xjztdm: Option<Loose>,
    pub rxrq: Option<Loose>,
    pub ksh: Option<Loose>,
    pub byzx: Option<Loose>,
    pub jg: Option<Loose>,
    pub yzbm: Option<Loose>,
    pub zzmmm: Option<Loose>,
    pub mzm: Option<Loose>,
    pub pyccdm: Option<Loose>,
    pub sjhm: Option<Loose>,
    pub gddh: Option<Loose>,
    pub dzyx: Option<Loose>,
    pub csrq: Option<Loose>,
    pub zjhm: Option<Loose>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentProfile {
    pub sid: Option<String>,
    pub name: Option<String>,
    pub college_name: Option<String>,
    pub major_name: Option<String>,
    pub class_name: Option<String>,
    pub status: Option<String>,
    pub enrollment_date: Option<String>,
    pub candidate_number: Option<String>,
    pub graduation_school: Option<String>,
    pub domicile: Option<String>,
    pub postal_code: Option<String>,
    pub politics_status: Option<String>,
    pub nationality: Option<String>,
    pub education: Option<String>,
    pub phone_number: Option<String>,
    pub parents_number: Option<String>,
    pub email: Option<String>,
    pub birthday: Option<String>,
    pub id_number: Option<String>,
}

impl From<&RawProfile> for StudentProfile {
    fn from(raw: &RawProfile) -> Self {
        let either = |a: &Option<Loose>, b: &Option<Loose>| values::text(a).or_else(|| values::text(b));
        Self {
            sid: values::text(&raw.xh),
            name: values::text(&raw.xm),
            college_name: either(&raw.zsjg_id, &raw.jg_id),
            major_name: either(&raw.zszyh_id, &raw.zyh_id),
            class_name: either(&raw.bh_id, &raw.xjztdm),
            status: values::text(&raw.xjztdm),
            enrollment_date: values::text(&raw.rxrq),
            candidate_number: values::text(&raw.ksh),
            graduation_school: values::text(&raw.byzx),
            domicile: values::text(&raw.jg),
            postal_code: values::text(&raw.yzbm),
            politics_status: values::text(&raw.zzmmm),
            nationality: values::text(&raw.mzm),
            education: values::text(&raw.pyccdm),
            phone_number: values::text(&raw.sjhm),
            parents_number: values::text(&raw.gddh),
            email: values::text(&raw.dzyx),
            birthday: values::text(&raw.csrq),
            id_number: values::text(&raw.zjhm),
        }
    }
}

/// Label -> value pairs scraped from a bootstrap form page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledFields(HashMap<String, String>);

impl LabeledFields {
    /// Labels keep their trailing full-width colon, e.g. `"学号："`.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .get(label)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn owned(&self, label: &str) -> Option<String> {
        self.get(label).map(str::to_owned)
    }
}

/// Parse the HTML profile page: `div.col-sm-6`/`div.col-sm-4` form groups with a
/// `label.col-sm-4.control-label` and a `p.form-control-static` value.
pub fn parse_profile_page(doc: &Document) -> LabeledFields {
    let mut fields = HashMap::new();
    for column in doc.select("div.col-sm-6, div.col-sm-4") {
        for group in column.select("div.form-group") {
            let Some(label) = group.first("label.col-sm-4.control-label") else {
                continue;
            };
            let value = group
                .first("div.col-sm-8 p.form-control-static")
                .map(|n| n.text())
                .unwrap_or_default();
            fields.insert(label.text(), value);
        }
    }
    LabeledFields(fields)
}

/// Parse the ID-card reissue page, whose labels lack the trailing colon and
/// whose values sit in a second `label.control-label`.
pub fn parse_supplement_page(doc: &Document) -> LabeledFields {
    let mut fields = HashMap::new();
    for column in doc.select("div.col-sm-6") {
        for group in column.select("div.form-group") {
            let Some(label) = group.first("label.col-sm-4.control-label") else {
                continue;
            };
            let value = group
                .first("div.col-sm-8 label.control-label")
                .map(|n| n.text())
                .unwrap_or_default();
            fields.insert(format!("{}：", label.text()), value);
        }
    }
    LabeledFields(fields)
}

impl StudentProfile {
    pub fn from_page(fields: &LabeledFields) -> Self {
        Self {
            sid: fields.owned("学号："),
            name: fields.owned("姓名："),
            college_name: fields.owned("学院名称："),
            major_name: fields.owned("专业名称："),
            class_name: fields.owned("班级名称："),
            status: fields.owned("学籍状态："),
            enrollment_date: fields.owned("入学日期："),
            candidate_number: fields.owned("考生号："),
            graduation_school: fields.owned("毕业中学："),
            domicile: fields.owned("籍贯："),
            postal_code: fields.owned("邮政编码："),
            politics_status: fields.owned("政治面貌："),
            nationality: fields.owned("民族："),
            education: fields.owned("培养层次："),
            phone_number: fields.owned("手机号码："),
            parents_number: None,
            email: fields.owned("电子邮箱："),
            birthday: fields.owned("出生日期："),
            id_number: fields.owned("证件号码："),
        }
    }

    pub fn lacks_affiliation(&self) -> bool {
        self.college_name.is_none() || self.major_name.is_none() || self.class_name.is_none()
    }

    /// Fill college/major/class from the supplement page without overwriting.
    pub fn fill_affiliation(&mut self, supplement: &LabeledFields) {
        if self.college_name.is_none() {
            self.college_name = supplement.owned("学院：");
        }
        if self.major_name.is_none() {
            self.major_name = supplement.owned("专业：");
        }
        if self.class_name.is_none() {
            self.class_name = supplement.owned("班级：");
        }
    }

    /// Replace every blank text field except the id with [`MISSING`].
    pub fn with_placeholders(mut self) -> Self {
        for field in [
            &mut self.name,
            &mut self.college_name,
            &mut self.major_name,
            &mut self.class_name,
            &mut self.status,
            &mut self.enrollment_date,
            &mut self.candidate_number,
            &mut self.graduation_school,
            &mut self.domicile,
            &mut self.postal_code,
            &mut self.politics_status,
            &mut self.nationality,
            &mut self.education,
            &mut self.phone_number,
            &mut self.parents_number,
            &mut self.email,
            &mut self.birthday,
            &mut self.id_number,
        ] {
            field.get_or_insert_with(|| MISSING.to_string());
        }
        self
    }
}
