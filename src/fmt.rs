//! Debug formatting helpers for [`custom_debug_derive`].

use std::fmt;

/// Formats an `Option<T>` by printing the inner value directly (no `Some(...)` wrapper).
///
/// Use with `#[debug(with = crate::fmt::opt)]` on fields that are
/// already gated by `#[debug(skip_if = Option::is_none)]`.
pub fn opt<T: fmt::Debug>(value: &Option<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Some(inner) => fmt::Debug::fmt(inner, f),
        None => f.write_str("None"),
    }
}

/// Prints only the length of a large or sensitive string, e.g. a base64 image.
#[allow(clippy::ptr_arg)]
pub fn len_only(value: &String, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<{} bytes>", value.len())
}

pub fn redacted<T>(_value: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("<redacted>")
}
