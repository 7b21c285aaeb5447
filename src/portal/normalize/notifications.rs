/// Split `"类型:内容"` on the first ASCII or full-width colon into `(type, content)`.
///
/// Text without a colon has no type and is kept whole as the content.
pub fn split_notification(text: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return (None, None);
    };
    match text.split_once([':', '：']) {
        Some((kind, content)) => (
            Some(kind.trim().to_string()),
            Some(content.trim().to_string()),
        ),
        None => (None, Some(text.to_string())),
    }
}
