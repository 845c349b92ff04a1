//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the gate and the upstream forwarder
//! - Wire up middleware (request ID, tracing, timeout)
//! - Apply path exclusion reloads
//! - Serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::uri::Authority, middleware, routing::any, Router};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::http::forward::{forward_handler, UpstreamState};
use crate::routing::ExclusionSet;
use crate::security::{edge_gate_middleware, GateState};
use crate::session::{refresher_from_config, AuthError, SessionRefresher};

/// Errors building the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid upstream address `{0}`")]
    Upstream(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// HTTP server for the edge gate.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    gate: GateState,
}

impl HttpServer {
    /// Create a server whose session refresher is built from the config.
    pub fn new(config: GateConfig) -> Result<Self, ServerError> {
        let refresher = refresher_from_config(&config.session)?;
        Self::with_refresher(config, refresher)
    }

    /// Create a server around an explicit session refresher.
    pub fn with_refresher(
        config: GateConfig,
        refresher: Arc<dyn SessionRefresher>,
    ) -> Result<Self, ServerError> {
        let authority: Authority = config
            .upstream
            .address
            .parse()
            .map_err(|_| ServerError::Upstream(config.upstream.address.clone()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let upstream = UpstreamState { client, authority };
        let gate = GateState::new(ExclusionSet::from_config(&config.exclusions), refresher);

        let router = Self::build_router(&config, upstream, gate.clone());
        Ok(Self {
            router,
            config,
            gate,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, upstream: UpstreamState, gate: GateState) -> Router {
        Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .with_state(upstream)
            .layer(middleware::from_fn_with_state(gate, edge_gate_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configs arriving on `config_updates` replace the path exclusions.
    /// Returns once `shutdown` fires and in-flight requests have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let exclusions = self.gate.exclusions.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                exclusions.store(Arc::new(ExclusionSet::from_config(&new_config.exclusions)));
                tracing::info!(
                    prefixes = ?new_config.exclusions.prefixes,
                    exact = ?new_config.exclusions.exact,
                    extensions = ?new_config.exclusions.extensions,
                    "Path exclusions reloaded; other settings apply on restart"
                );
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
