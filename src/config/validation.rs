//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. All errors are
//! collected so an operator sees every problem at once.

use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::GateConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),
    #[error("upstream.address `{0}` is not a host:port authority")]
    UpstreamAddress(String),
    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,
    #[error("exclusion path `{0}` must start with '/'")]
    RelativeExclusion(String),
    #[error("exclusion extension `{0}` must be non-empty and carry no dot")]
    BadExtension(String),
    #[error("session.auth_url `{0}` is not an http(s) URL")]
    AuthUrl(String),
    #[error("session.anon_key is required when session handling is enabled")]
    MissingAnonKey,
    #[error("session cookie name `{0}` is not a valid cookie name")]
    CookieName(String),
    #[error("session path `{0}` must start with '/'")]
    RelativeSessionPath(String),
    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.upstream.address.parse::<Authority>().is_err() || config.upstream.address.is_empty() {
        errors.push(ValidationError::UpstreamAddress(config.upstream.address.clone()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    for path in config.exclusions.prefixes.iter().chain(&config.exclusions.exact) {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativeExclusion(path.clone()));
        }
    }
    for ext in &config.exclusions.extensions {
        if ext.is_empty() || ext.contains('.') {
            errors.push(ValidationError::BadExtension(ext.clone()));
        }
    }

    let session = &config.session;
    if session.enabled {
        match url::Url::parse(&session.auth_url) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            _ => errors.push(ValidationError::AuthUrl(session.auth_url.clone())),
        }
        if session.anon_key.is_empty() {
            errors.push(ValidationError::MissingAnonKey);
        }
        if let Some(name) = &session.cookie_name {
            let valid = !name.is_empty()
                && name
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
            if !valid {
                errors.push(ValidationError::CookieName(name.clone()));
            }
        }
        let paths = [
            &session.protected_prefix,
            &session.login_path,
            &session.mfa_path,
            &session.home_path,
        ];
        for path in paths.into_iter().chain(&session.auth_pages) {
            if !path.starts_with('/') {
                errors.push(ValidationError::RelativeSessionPath(path.clone()));
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
