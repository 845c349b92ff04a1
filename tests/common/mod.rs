//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use uptime_gate::session::SessionRefresher;
use uptime_gate::{GateConfig, HttpServer, Shutdown};

/// Serve `router` on an ephemeral port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Start an upstream that answers every request with what it received.
pub async fn start_echo_upstream() -> SocketAddr {
    serve(Router::new().fallback(echo)).await
}

async fn echo(request: Request<Body>) -> Json<Value> {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": request.method().as_str(),
        "uri": request.uri().to_string(),
        "cookie": header("cookie"),
        "x_forwarded_for": header("x-forwarded-for"),
        "x_request_id": header("x-request-id"),
    }))
}

/// A running gate.
pub struct TestGate {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<GateConfig>,
}

impl TestGate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gate in front of `upstream` with the given refresher.
pub async fn start_gate(
    upstream: SocketAddr,
    refresher: Arc<dyn SessionRefresher>,
) -> TestGate {
    let mut config = GateConfig::default();
    config.upstream.address = upstream.to_string();
    start_gate_with_config(config, refresher).await
}

pub async fn start_gate_with_config(
    mut config: GateConfig,
    refresher: Arc<dyn SessionRefresher>,
) -> TestGate {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::with_refresher(config, refresher).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestGate {
        addr,
        shutdown,
        updates,
    }
}

/// Client that neither follows redirects nor uses a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// Counts invocations and continues the pipeline.
#[derive(Clone, Default)]
pub struct CountingRefresher {
    pub calls: Arc<AtomicUsize>,
}

impl CountingRefresher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRefresher for CountingRefresher {
    async fn refresh(&self, request: Request<Body>, next: Next) -> Response {
        self.calls.fetch_add(1, Ordering::SeqCst);
        next.run(request).await
    }
}

/// Answers every request itself without continuing.
pub struct FixedRefresher;

#[async_trait]
impl SessionRefresher for FixedRefresher {
    async fn refresh(&self, _request: Request<Body>, _next: Next) -> Response {
        (
            StatusCode::IM_A_TEAPOT,
            [("x-refreshed", "yes")],
            "from refresher",
        )
            .into_response()
    }
}
