//! Session refresh subsystem.
//!
//! # Data Flow
//! ```text
//! Request from the gate
//!     → cookies.rs (read the stored session, chunked or whole)
//!     → provider.rs (look up user, refresh grant when needed)
//!     → policy.rs (login / MFA / home redirects)
//!     → refresher.rs (continue with rotated cookies, or redirect)
//! ```
//!
//! # Design Decisions
//! - The refresher is injected into the gate, never reached through globals
//! - Provider outages degrade to anonymous; they never fail the request
//! - Rotated tokens are visible to the upstream on the same request

pub mod claims;
pub mod cookies;
pub mod policy;
pub mod provider;
pub mod refresher;

pub use cookies::{CookieError, SessionCookie, SessionTokens, StoredSession};
pub use policy::{Decision, RedirectPolicy};
pub use provider::{
    Aal, AssuranceLevel, AuthError, AuthProvider, AuthUser, AuthenticatedSession, Factor,
    RemoteAuthProvider,
};
pub use refresher::{refresher_from_config, AuthSessionRefresher, PassThroughRefresher, SessionRefresher};
