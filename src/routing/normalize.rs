//! Request path normalization.
//!
//! Exclusions are matched against the path the upstream will route on, so
//! dot segments are resolved before matching, the way a URL parser resolves
//! them: `.` and `..` in any percent-encoded spelling, with `\` treated as a
//! separator. Empty segments are kept.

use std::borrow::Cow;

/// Resolve dot segments in an origin-form path.
///
/// Paths that need no change are returned borrowed. Anything not starting
/// with `/` (such as `*`) is left alone.
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    let Some(rest) = path.strip_prefix('/') else {
        return Cow::Borrowed(path);
    };
    if !path.bytes().any(|b| matches!(b, b'.' | b'%' | b'\\')) {
        return Cow::Borrowed(path);
    }

    let mut segments: Vec<&str> = Vec::new();
    let mut parts = rest.split(['/', '\\']).peekable();
    while let Some(segment) = parts.next() {
        let last = parts.peek().is_none();
        if is_double_dot(segment) {
            segments.pop();
            if last {
                segments.push("");
            }
        } else if is_single_dot(segment) {
            if last {
                segments.push("");
            }
        } else {
            segments.push(segment);
        }
    }

    let normalized = format!("/{}", segments.join("/"));
    if normalized == path {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(normalized)
    }
}

fn is_single_dot(segment: &str) -> bool {
    segment == "." || segment.eq_ignore_ascii_case("%2e")
}

fn is_double_dot(segment: &str) -> bool {
    ["..", ".%2e", "%2e.", "%2e%2e"]
        .iter()
        .any(|form| segment.eq_ignore_ascii_case(form))
}
