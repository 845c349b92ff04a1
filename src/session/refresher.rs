//! Session refreshers.
//!
//! The gate hands every request that survives its header checks to a
//! [`SessionRefresher`] and returns whatever the refresher produces. A
//! refresher continues the pipeline by running `next`, optionally with
//! cookies attached, or answers the request itself.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::SessionConfig;
use crate::observability::metrics;
use crate::session::cookies::SessionCookie;
use crate::session::policy::{Decision, RedirectPolicy};
use crate::session::provider::{AuthError, AuthProvider, RemoteAuthProvider};

/// Validates or renews the caller's session before routing continues.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh(&self, request: Request<Body>, next: Next) -> Response;
}

/// Continues every request unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughRefresher;

#[async_trait]
impl SessionRefresher for PassThroughRefresher {
    async fn refresh(&self, request: Request<Body>, next: Next) -> Response {
        next.run(request).await
    }
}

/// Build the refresher described by the configuration.
pub fn refresher_from_config(config: &SessionConfig) -> Result<Arc<dyn SessionRefresher>, AuthError> {
    if !config.enabled {
        tracing::info!("Session handling disabled, requests pass through");
        return Ok(Arc::new(PassThroughRefresher));
    }
    let provider = RemoteAuthProvider::new(config)?;
    tracing::info!(auth_url = %config.auth_url, "Session handling enabled");
    Ok(Arc::new(AuthSessionRefresher::new(provider, config)))
}

/// Refreshes the auth session from cookies and applies the redirect rules.
pub struct AuthSessionRefresher<P> {
    provider: P,
    cookie: SessionCookie,
    policy: RedirectPolicy,
}

impl<P: AuthProvider> AuthSessionRefresher<P> {
    pub fn new(provider: P, config: &SessionConfig) -> Self {
        Self {
            provider,
            cookie: SessionCookie {
                name: config.cookie_name(),
                secure: config.secure_cookies,
            },
            policy: RedirectPolicy::from_config(config),
        }
    }
}

#[async_trait]
impl<P: AuthProvider> SessionRefresher for AuthSessionRefresher<P> {
    async fn refresh(&self, mut request: Request<Body>, next: Next) -> Response {
        let present = self.cookie.present(request.headers());

        let mut set_cookies = Vec::new();
        let session = match self.cookie.read(request.headers()) {
            Ok(None) => None,
            Ok(Some(stored)) => match self.provider.authenticate(&stored.tokens()).await {
                Ok(Some(session)) => {
                    if let Some(rotated) = &session.rotated {
                        self.cookie.write_request(request.headers_mut(), Some(rotated));
                        set_cookies = self.cookie.issue(rotated, &present);
                        metrics::record_session("rotated");
                    } else {
                        metrics::record_session("valid");
                    }
                    Some(session)
                }
                Ok(None) => {
                    tracing::debug!("Session invalid, clearing cookies");
                    set_cookies = self.discard(request.headers_mut(), &present);
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Auth provider unavailable, treating caller as anonymous");
                    metrics::record_session("error");
                    None
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "Unreadable session cookie, clearing");
                set_cookies = self.discard(request.headers_mut(), &present);
                None
            }
        };

        let path = request.uri().path().to_string();
        let mut response = match self.policy.decide(&path, session.as_ref()) {
            Decision::Continue => next.run(request).await,
            Decision::Redirect(target) => {
                let location = match request.uri().query() {
                    Some(query) => format!("{target}?{query}"),
                    None => target,
                };
                tracing::debug!(from = %path, to = %location, "Session redirect");
                redirect(&location)
            }
        };

        let headers = response.headers_mut();
        for cookie in set_cookies {
            headers.append(header::SET_COOKIE, cookie);
        }
        response
    }
}

impl<P> AuthSessionRefresher<P> {
    /// Drop the session from the forwarded request and expire it in the
    /// browser.
    fn discard(&self, headers: &mut HeaderMap, present: &[String]) -> Vec<HeaderValue> {
        self.cookie.write_request(headers, None);
        metrics::record_session("invalid");
        self.cookie.clear(present)
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}
