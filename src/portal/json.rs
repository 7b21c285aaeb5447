//! JSON decoding for portal payloads with path-aware diagnostics.
//!
//! Portal responses are loosely typed: numbers arrive as strings, fields go
//! missing between deployments, and error pages are served as HTML with a
//! 200 status. Decode failures therefore carry the serde path and a snippet of
//! the offending line so a log entry is enough to diagnose a new variant.

use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
#[error("{summary}")]
pub struct JsonDecodeError {
    /// Serde path to the failing field, e.g. `items[3].xf`.
    pub path: Option<String>,
    pub line: usize,
    pub column: usize,
    summary: String,
}

/// Decode `body`, reporting the field path and surrounding text on failure.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, JsonDecodeError> {
    let mut de = serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(&mut de).map_err(|err| {
        let path = err.path().to_string();
        let inner = err.into_inner();
        let (line, column) = (inner.line(), inner.column());

        let raw = inner.to_string();
        let location = format!(" at line {line} column {column}");
        let detail = describe_mismatch(raw.strip_suffix(&location).unwrap_or(&raw));

        let path = (!path.is_empty() && path != ".").then_some(path);
        let mut summary = match &path {
            Some(p) => format!("at '{p}': {detail}"),
            None => detail,
        };
        summary.push_str(&format!(
            " (line {line} col {column})\n{}",
            snippet_around(body, line, column, 24)
        ));

        JsonDecodeError {
            path,
            line,
            column,
            summary,
        }
    })
}

/// Whether a `Content-Type` header value announces a JSON body.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
}

/// Rephrase serde's "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {expected}, got {actual}");
    }
    msg.to_string()
}

/// Render the text around `column` on `line` with a caret under the error.
///
/// Columns are byte offsets; slicing is clamped to char boundaries since
/// portal payloads are mostly CJK text.
fn snippet_around(body: &str, line: usize, column: usize, width: usize) -> String {
    let text = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if text.is_empty() {
        return "(empty line)".to_string();
    }

    let at = floor_boundary(text, column.saturating_sub(1).min(text.len()));
    let start = floor_boundary(text, at.saturating_sub(width / 2));
    let end = ceil_boundary(text, (at + width / 2).min(text.len()));

    let caret_offset = text[start..at].chars().count();
    format!(
        "...{}...\n   {}^",
        &text[start..end],
        " ".repeat(caret_offset)
    )
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
