//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → normalize.rs (resolve dot segments)
//!     → matcher.rs (evaluate exclusion rules)
//!     → excluded: straight to the upstream forwarder
//!     → otherwise: edge gate
//!
//! Compilation (at startup and on reload):
//!     ExclusionConfig
//!     → compile matchers
//!     → freeze as immutable ExclusionSet
//! ```
//!
//! # Design Decisions
//! - Exclusions compiled once, swapped whole on reload
//! - Deterministic: same path always yields the same answer

pub mod matcher;
pub mod normalize;

pub use matcher::{ExclusionSet, PathMatcher};
pub use normalize::normalize_path;
