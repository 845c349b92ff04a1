//! Edge gate middleware.
//!
//! Runs before any page or API handler. The request path is normalized
//! first, so the exclusion check, the session rules and the upstream all see
//! the same path. Excluded paths skip the gate entirely; everything else has
//! its `x-middleware-*` headers checked and is then handed to the session
//! refresher, whose response is returned as is.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{uri::PathAndQuery, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::observability::metrics;
use crate::routing::{normalize_path, ExclusionSet};
use crate::security::forged_headers::inspect_headers;
use crate::session::SessionRefresher;

/// State required by the gate.
#[derive(Clone)]
pub struct GateState {
    /// Swapped whole on config reload.
    pub exclusions: Arc<ArcSwap<ExclusionSet>>,
    pub refresher: Arc<dyn SessionRefresher>,
}

impl GateState {
    pub fn new(exclusions: ExclusionSet, refresher: Arc<dyn SessionRefresher>) -> Self {
        Self {
            exclusions: Arc::new(ArcSwap::from_pointee(exclusions)),
            refresher,
        }
    }
}

pub async fn edge_gate_middleware(
    State(gate): State<GateState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(uri) = normalized_uri(request.uri()) {
        match uri {
            Ok(uri) => {
                tracing::debug!(from = %request.uri(), to = %uri, "Normalized request path");
                *request.uri_mut() = uri;
            }
            Err(e) => {
                tracing::warn!(uri = %request.uri(), error = %e, "Unusable request path");
                metrics::record_gate("rejected");
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    }
    let path = request.uri().path();

    if gate.exclusions.load().is_excluded(path) {
        metrics::record_gate("bypassed");
        return next.run(request).await;
    }

    if let Err(forged) = inspect_headers(request.headers()) {
        tracing::warn!(
            reason = %forged,
            method = %request.method(),
            path = %path,
            "Rejected request with forged middleware header"
        );
        metrics::record_gate("rejected");
        metrics::record_rejection(forged.as_str());
        return StatusCode::FORBIDDEN.into_response();
    }

    metrics::record_gate("refreshed");
    gate.refresher.refresh(request, next).await
}

/// The request URI with dot segments resolved, or `None` when the path is
/// already normal.
fn normalized_uri(uri: &Uri) -> Option<Result<Uri, axum::http::Error>> {
    let normalized = normalize_path(uri.path());
    if normalized == uri.path() {
        return None;
    }
    let path_and_query = match uri.query() {
        Some(query) => format!("{normalized}?{query}"),
        None => normalized.into_owned(),
    };
    let mut parts = uri.clone().into_parts();
    Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(axum::http::Error::from)
            .and_then(|pq| {
                parts.path_and_query = Some(pq);
                Uri::from_parts(parts).map_err(axum::http::Error::from)
            }),
    )
}
