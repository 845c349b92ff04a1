//! Forged middleware header detection.
//!
//! The dashboard framework marks its own internal subrequests and prefetches
//! with `x-middleware-*` headers. A client forging them can make the
//! framework skip request middleware, so the gate rejects them outright.

use axum::http::{HeaderMap, HeaderName};
use thiserror::Error;

pub const X_MIDDLEWARE_SUBREQUEST: HeaderName = HeaderName::from_static("x-middleware-subrequest");
pub const X_MIDDLEWARE_PREFETCH: HeaderName = HeaderName::from_static("x-middleware-prefetch");

/// Why a request was rejected. Never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ForgedHeader {
    #[error("forged internal subrequest header")]
    Subrequest,
    #[error("forged prefetch marker")]
    Prefetch,
}

impl ForgedHeader {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ForgedHeader::Subrequest => "subrequest",
            ForgedHeader::Prefetch => "prefetch",
        }
    }
}

/// Check a request's headers.
///
/// - `x-middleware-subrequest` is rejected whenever present, even empty.
/// - `x-middleware-prefetch` is rejected when its value is non-empty and not
///   exactly `1`. Repeated headers are read joined with `", "`.
pub fn inspect_headers(headers: &HeaderMap) -> Result<(), ForgedHeader> {
    if headers.contains_key(X_MIDDLEWARE_SUBREQUEST) {
        return Err(ForgedHeader::Subrequest);
    }

    let values: Vec<&[u8]> = headers
        .get_all(X_MIDDLEWARE_PREFETCH)
        .iter()
        .map(|v| v.as_bytes())
        .collect();
    if !values.is_empty() {
        let joined = values.join(&b", "[..]);
        if !joined.is_empty() && joined != b"1" {
            return Err(ForgedHeader::Prefetch);
        }
    }

    Ok(())
}
