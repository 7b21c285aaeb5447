//! Scalar coercions for loosely typed portal fields.

use serde::{Deserialize, Serialize};

/// A field the portal may send as a string, a number, or a boolean.
///
/// Row structs declare fields as `Option<Loose>` so `null`, missing and
/// mistyped values all decode without failing the whole row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Other(serde_json::Value),
}

impl Loose {
    /// Textual form, trimmed. Nested values render as compact JSON.
    pub fn text(&self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Other(v) => v.to_string(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Non-empty text of an optional loose field.
pub fn text(field: &Option<Loose>) -> Option<String> {
    field.as_ref().map(Loose::text).filter(|s| !s.is_empty())
}

/// Integer value of a count-like field; absent or garbled counts are 0.
pub fn count(field: &Option<Loose>) -> i64 {
    field.as_ref().and_then(Loose::as_i64).unwrap_or(0)
}

/// A value that is numeric when the portal sends digits and free text otherwise
/// (grades such as `"优秀"`, hours such as `"2-0"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(i64),
    Text(String),
}

pub fn number_or_text(field: &Option<Loose>) -> Option<NumberOrText> {
    let raw = text(field)?;
    if raw.chars().all(|c| c.is_ascii_digit())
        && let Ok(n) = raw.parse()
    {
        return Some(NumberOrText::Number(n));
    }
    Some(NumberOrText::Text(raw))
}

/// One-decimal rendering of credits and grade points; `"无"` means zero.
///
/// Values that are not numbers are passed through untouched.
pub fn one_decimal(field: &Option<Loose>) -> Option<String> {
    let raw = text(field)?;
    if raw == "无" {
        return Some("0.0".to_string());
    }
    match raw.parse::<f64>() {
        Ok(v) => Some(format!("{v:.1}")),
        Err(_) => Some(raw),
    }
}

/// Split a teacher field shaped `"工号/姓名/职称"` into `(id, name)`.
pub fn split_teacher(field: &Option<Loose>) -> (Option<String>, Option<String>) {
    let Some(raw) = text(field) else {
        return (None, None);
    };
    let mut parts = raw.split('/').map(str::trim);
    let id = parts.next().filter(|s| !s.is_empty()).map(str::to_owned);
    let name = parts.next().filter(|s| !s.is_empty()).map(str::to_owned);
    (id, name)
}

/// First place of a multi-place `<br/>`-separated field.
pub fn first_place(field: &Option<Loose>) -> Option<String> {
    let raw = text(field)?;
    let first = raw.split("<br/>").next().unwrap_or_default().trim();
    (!first.is_empty()).then(|| first.to_string())
}

/// Multi-slot time field with `<br/>` separators joined by `、`.
pub fn joined_times(field: &Option<Loose>) -> Option<String> {
    let raw = text(field)?;
    Some(
        raw.split("<br/>")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("、"),
    )
}
