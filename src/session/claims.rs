//! Access token claims.
//!
//! Only the payload is decoded; the signature is the auth API's concern and
//! is checked there on every user lookup. Expiry is read here but enforced
//! by the refresh margin, not by the decoder.

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

use crate::session::provider::{Aal, AuthError};

/// The claims the gate reads from an access token.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Expiry as a Unix timestamp.
    #[serde(default)]
    pub exp: Option<u64>,

    /// Authenticator assurance level of the session.
    #[serde(default)]
    pub aal: Option<Aal>,
}

impl AccessClaims {
    /// Decode the claims of a compact JWT without verifying it.
    pub fn decode(token: &str) -> Result<Self, AuthError> {
        jsonwebtoken::decode::<Self>(token, &DecodingKey::from_secret(&[]), &unverified())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token not decodable");
                AuthError::MalformedToken
            })
    }

    /// True when the token is expired or expires within `margin_secs`.
    pub fn expires_within(&self, now_secs: u64, margin_secs: u64) -> bool {
        match self.exp {
            Some(exp) => exp <= now_secs.saturating_add(margin_secs),
            None => false,
        }
    }

    /// Current assurance level; a token without the claim is first-factor.
    pub fn current_level(&self) -> Aal {
        self.aal.unwrap_or(Aal::Aal1)
    }
}

/// Structural checks only: any algorithm, any audience, no required claims.
fn unverified() -> Validation {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &serde_json::Value) -> String {
    use jsonwebtoken::{EncodingKey, Header};

    jsonwebtoken::encode(&Header::default(), payload, &EncodingKey::from_secret(b"test-secret"))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_claims() {
        let token = encode_test_token(&json!({"sub": "u1", "exp": 1_700_000_000u64, "aal": "aal2"}));
        let claims = AccessClaims::decode(&token).unwrap();
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.current_level(), Aal::Aal2);
    }

    #[test]
    fn test_missing_aal_is_first_factor() {
        let token = encode_test_token(&json!({"sub": "u1"}));
        let claims = AccessClaims::decode(&token).unwrap();
        assert_eq!(claims.current_level(), Aal::Aal1);
        assert!(!claims.expires_within(u64::MAX - 1, 10));
    }

    #[test]
    fn test_expired_token_with_audience_still_decodes() {
        let token = encode_test_token(&json!({
            "sub": "u1",
            "aud": "authenticated",
            "exp": 1u64,
            "aal": "aal1"
        }));
        let claims = AccessClaims::decode(&token).unwrap();
        assert_eq!(claims.exp, Some(1));
        assert!(claims.expires_within(2, 0));
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(AccessClaims::decode("not-a-jwt").is_err());
        assert!(AccessClaims::decode("a.b").is_err());
        assert!(AccessClaims::decode("a.!!!.c").is_err());
        assert!(AccessClaims::decode("a.b.c.d").is_err());
    }

    #[test]
    fn test_expiry_margin() {
        let claims = AccessClaims { exp: Some(1_000), aal: None };
        assert!(claims.expires_within(995, 10));
        assert!(claims.expires_within(1_000, 0));
        assert!(!claims.expires_within(900, 10));
    }
}
