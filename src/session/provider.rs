//! Auth provider: resolves session tokens to a signed-in user.
//!
//! `RemoteAuthProvider` talks to a GoTrue-compatible auth API. It looks the
//! user up with the access token and falls back to a refresh grant when the
//! access token is missing, about to expire, or rejected.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SessionConfig;
use crate::session::claims::AccessClaims;
use crate::session::cookies::{SessionTokens, StoredSession};

/// Authenticator assurance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aal {
    Aal1,
    Aal2,
}

/// Current and attainable assurance level of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssuranceLevel {
    pub current: Aal,
    pub next: Aal,
}

impl AssuranceLevel {
    /// The user has a second factor enrolled that this session has not
    /// verified yet.
    pub fn mfa_pending(&self) -> bool {
        self.next == Aal::Aal2 && self.current != Aal::Aal2
    }
}

/// An enrolled authentication factor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Factor {
    pub id: String,
    #[serde(default)]
    pub factor_type: Option<String>,
    pub status: String,
}

/// The signed-in user as reported by the auth API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub factors: Option<Vec<Factor>>,
}

impl AuthUser {
    pub fn has_verified_factor(&self) -> bool {
        self.factors
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|f| f.status == "verified")
    }
}

/// A validated session.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedSession {
    pub user: AuthUser,
    pub assurance: AssuranceLevel,
    /// The new session to store when the provider refreshed it.
    pub rotated: Option<StoredSession>,
}

/// Errors talking to the auth API.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth API returned unexpected status {0}")]
    UnexpectedStatus(u16),
    #[error("malformed access token")]
    MalformedToken,
    #[error("malformed auth response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Resolves session tokens to a user.
///
/// `Ok(None)` means the tokens are not a valid session and should be
/// discarded; `Err` means the answer is unknown.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(
        &self,
        tokens: &SessionTokens,
    ) -> Result<Option<AuthenticatedSession>, AuthError>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// HTTP client of a GoTrue-compatible auth API.
#[derive(Clone)]
pub struct RemoteAuthProvider {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    refresh_margin_secs: u64,
}

impl RemoteAuthProvider {
    pub fn new(config: &SessionConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.auth_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.auth_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            refresh_margin_secs: config.refresh_margin_secs,
        })
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Option<AuthUser>, AuthError> {
        let res = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match res.status() {
            s if s.is_success() => Ok(Some(res.json().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            s => Err(AuthError::UnexpectedStatus(s.as_u16())),
        }
    }

    /// Run a refresh grant. The response body is the new session as it is
    /// stored in the cookie.
    async fn refresh(&self, refresh_token: &str) -> Result<Option<StoredSession>, AuthError> {
        let res = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        match res.status() {
            s if s.is_success() => Ok(Some(res.json().await?)),
            // Revoked, reused or unknown refresh tokens come back as client errors.
            s if s.is_client_error() => Ok(None),
            s => Err(AuthError::UnexpectedStatus(s.as_u16())),
        }
    }

    async fn refresh_session(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<Option<AuthenticatedSession>, AuthError> {
        let Some(refresh_token) = refresh_token else {
            return Ok(None);
        };
        let Some(session) = self.refresh(refresh_token).await? else {
            return Ok(None);
        };
        let user: AuthUser =
            serde_json::from_value(session.user().cloned().unwrap_or_default())?;
        tracing::debug!(user_id = %user.id, "Session refreshed");
        let assurance = assurance_for(&user, &session.access_token);
        Ok(Some(AuthenticatedSession {
            user,
            assurance,
            rotated: Some(session),
        }))
    }
}

#[async_trait]
impl AuthProvider for RemoteAuthProvider {
    async fn authenticate(
        &self,
        tokens: &SessionTokens,
    ) -> Result<Option<AuthenticatedSession>, AuthError> {
        let refresh_token = tokens.refresh_token.as_deref();

        let Some(access_token) = tokens.access_token.as_deref() else {
            return self.refresh_session(refresh_token).await;
        };

        match AccessClaims::decode(access_token) {
            Ok(claims) if claims.expires_within(unix_now(), self.refresh_margin_secs) => {
                return self.refresh_session(refresh_token).await;
            }
            Ok(_) => {}
            Err(_) => return self.refresh_session(refresh_token).await,
        }

        match self.fetch_user(access_token).await? {
            Some(user) => {
                let assurance = assurance_for(&user, access_token);
                Ok(Some(AuthenticatedSession {
                    user,
                    assurance,
                    rotated: None,
                }))
            }
            None => self.refresh_session(refresh_token).await,
        }
    }
}

fn assurance_for(user: &AuthUser, access_token: &str) -> AssuranceLevel {
    let current = AccessClaims::decode(access_token)
        .map(|c| c.current_level())
        .unwrap_or(Aal::Aal1);
    let next = if user.has_verified_factor() {
        Aal::Aal2
    } else {
        current
    };
    AssuranceLevel { current, next }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(factors: Option<Vec<Factor>>) -> AuthUser {
        AuthUser {
            id: "u1".into(),
            email: Some("owner@example.com".into()),
            factors,
        }
    }

    fn factor(status: &str) -> Factor {
        Factor {
            id: "f1".into(),
            factor_type: Some("totp".into()),
            status: status.into(),
        }
    }

    #[test]
    fn test_mfa_pending() {
        let pending = AssuranceLevel { current: Aal::Aal1, next: Aal::Aal2 };
        let verified = AssuranceLevel { current: Aal::Aal2, next: Aal::Aal2 };
        let none = AssuranceLevel { current: Aal::Aal1, next: Aal::Aal1 };
        assert!(pending.mfa_pending());
        assert!(!verified.mfa_pending());
        assert!(!none.mfa_pending());
    }

    #[test]
    fn test_only_verified_factors_raise_next_level() {
        let token = crate::session::claims::encode_test_token(&serde_json::json!({"aal": "aal1"}));
        assert_eq!(
            assurance_for(&user(Some(vec![factor("unverified")])), &token),
            AssuranceLevel { current: Aal::Aal1, next: Aal::Aal1 }
        );
        assert_eq!(
            assurance_for(&user(Some(vec![factor("verified")])), &token),
            AssuranceLevel { current: Aal::Aal1, next: Aal::Aal2 }
        );
        assert_eq!(
            assurance_for(&user(None), &token),
            AssuranceLevel { current: Aal::Aal1, next: Aal::Aal1 }
        );
    }

    #[test]
    fn test_user_deserializes_without_factors() {
        let user: AuthUser = serde_json::from_str(r#"{"id":"u1","email":null}"#).unwrap();
        assert!(!user.has_verified_factor());
    }
}
