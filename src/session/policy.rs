//! Auth redirect rules for dashboard, auth and MFA pages.

use crate::config::SessionConfig;
use crate::session::provider::AuthenticatedSession;

/// What the refresher does with a request once the session is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Continue to the upstream.
    Continue,
    /// Send the caller to another path.
    Redirect(String),
}

/// Paths the redirect rules are expressed in.
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    protected_prefix: String,
    login_path: String,
    mfa_path: String,
    home_path: String,
    auth_pages: Vec<String>,
}

impl RedirectPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            protected_prefix: config.protected_prefix.clone(),
            login_path: config.login_path.clone(),
            mfa_path: config.mfa_path.clone(),
            home_path: config.home_path.clone(),
            auth_pages: config.auth_pages.clone(),
        }
    }

    pub fn decide(&self, path: &str, session: Option<&AuthenticatedSession>) -> Decision {
        let protected = path.starts_with(&self.protected_prefix);

        let Some(session) = session else {
            if protected {
                return Decision::Redirect(self.login_path.clone());
            }
            return Decision::Continue;
        };

        let mfa_pending = session.assurance.mfa_pending();

        if protected && mfa_pending {
            return Decision::Redirect(self.mfa_path.clone());
        }

        if self.auth_pages.iter().any(|page| page == path) {
            let target = if mfa_pending { &self.mfa_path } else { &self.home_path };
            return Decision::Redirect(target.clone());
        }

        if path == self.mfa_path && !mfa_pending {
            return Decision::Redirect(self.home_path.clone());
        }

        Decision::Continue
    }
}
