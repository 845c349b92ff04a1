//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate, session refresher and forwarder produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID (x-request-id) set at the edge and echoed in responses
//! - Rejection reasons are logged, never returned to the client

pub mod logging;
pub mod metrics;
