//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Dashboard application that surviving requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Paths the gate never inspects.
    pub exclusions: ExclusionConfig,

    /// Session refresh and auth redirects.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream (dashboard application) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream authority (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Path exclusion rules. A path matching any rule bypasses the gate.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Path prefixes (static assets, image optimizer, cron API).
    pub prefixes: Vec<String>,

    /// Exact paths (favicon).
    pub exact: Vec<String>,

    /// File extensions without the leading dot. Case-sensitive.
    pub extensions: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            prefixes: vec![
                "/_next/static".to_string(),
                "/_next/image".to_string(),
                "/api/cron".to_string(),
            ],
            exact: vec!["/favicon.ico".to_string()],
            extensions: ["svg", "png", "jpg", "jpeg", "gif", "webp"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Session refresh configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Enable session refresh. When disabled requests pass straight through.
    pub enabled: bool,

    /// Base URL of the auth API (e.g., "https://project.example.co").
    pub auth_url: String,

    /// Public API key sent as the `apikey` header.
    pub anon_key: String,

    /// Session cookie name. Derived from `auth_url` as
    /// `sb-<first host label>-auth-token` when unset, matching the
    /// dashboard's auth client.
    pub cookie_name: Option<String>,

    /// Mark issued cookies `Secure`.
    pub secure_cookies: bool,

    /// Refresh the access token when it expires within this many seconds.
    pub refresh_margin_secs: u64,

    /// Auth API request timeout in seconds.
    pub auth_timeout_secs: u64,

    /// Paths under this prefix require a signed-in user.
    pub protected_prefix: String,

    /// Where anonymous callers are sent.
    pub login_path: String,

    /// Second-factor verification page.
    pub mfa_path: String,

    /// Landing page for signed-in users.
    pub home_path: String,

    /// Pages signed-in users are bounced away from.
    pub auth_pages: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auth_url: String::new(),
            anon_key: String::new(),
            cookie_name: None,
            secure_cookies: true,
            refresh_margin_secs: 10,
            auth_timeout_secs: 5,
            protected_prefix: "/dashboard".to_string(),
            login_path: "/login".to_string(),
            mfa_path: "/mfa".to_string(),
            home_path: "/dashboard".to_string(),
            auth_pages: vec!["/login".to_string(), "/signup".to_string()],
        }
    }
}

impl SessionConfig {
    /// The effective session cookie name.
    pub fn cookie_name(&self) -> String {
        if let Some(name) = &self.cookie_name {
            return name.clone();
        }
        let project = url::Url::parse(&self.auth_url)
            .ok()
            .and_then(|u| u.host_str().and_then(|h| h.split('.').next()).map(str::to_string))
            .unwrap_or_default();
        format!("sb-{project}-auth-token")
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
