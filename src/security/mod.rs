//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → gate.rs (skip excluded paths)
//!     → forged_headers.rs (reject spoofed x-middleware-* headers)
//!     → session refresher
//! ```
//!
//! # Design Decisions
//! - Fail closed: a forged header ends the request with a bare 403
//! - No detail in the rejection; the reason is only logged
//! - No trust in client input

pub mod forged_headers;
pub mod gate;

pub use forged_headers::{inspect_headers, ForgedHeader};
pub use gate::{edge_gate_middleware, GateState};
