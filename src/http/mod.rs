//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → edge gate (security) → session refresher
//!     → forward.rs (rewrite to upstream, stream response back)
//!     → Send to client
//! ```

pub mod forward;
pub mod server;

pub use forward::{forward_handler, UpstreamState};
pub use server::{HttpServer, ServerError};
