//! Edge gate for the uptime dashboard.
//!
//! Rejects forged `x-middleware-*` headers, refreshes the caller's auth
//! session and forwards everything else to the dashboard upstream.

pub mod config;
pub mod cron;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod session;

pub use config::GateConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
