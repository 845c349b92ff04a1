//! Session cookie handling.
//!
//! The dashboard's auth client keeps the whole session (tokens, expiry, user)
//! as JSON in one cookie named `sb-<project>-auth-token`. The value is
//! written as `base64-` followed by unpadded base64url; plain JSON is still
//! accepted on read. Values longer than [`MAX_CHUNK_SIZE`] are split across
//! `<name>.0`, `<name>.1`, ... and joined back in order on read.

use axum::http::{header, HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Longest value stored in a single cookie.
pub const MAX_CHUNK_SIZE: usize = 3180;

const BASE64_PREFIX: &str = "base64-";

/// Lifetime of issued cookies: 400 days, the browser maximum.
const MAX_AGE_SECS: u64 = 400 * 24 * 60 * 60;

/// Session token pair handed to the auth provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// The session object stored in the auth cookie. Fields other than the two
/// tokens are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl StoredSession {
    pub fn tokens(&self) -> SessionTokens {
        SessionTokens {
            access_token: Some(self.access_token.clone()).filter(|t| !t.is_empty()),
            refresh_token: Some(self.refresh_token.clone()).filter(|t| !t.is_empty()),
        }
    }

    /// The `user` object, when the session carries one.
    pub fn user(&self) -> Option<&Value> {
        self.rest.get("user").filter(|user| !user.is_null())
    }
}

/// A session cookie that exists but cannot be read.
#[derive(Debug, Error)]
pub enum CookieError {
    #[error("session cookie is not valid base64")]
    Base64(#[from] base64::DecodeError),
    #[error("session cookie is not a session object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Name and attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub secure: bool,
}

impl SessionCookie {
    /// Read the session from the request cookies. `Ok(None)` when there is
    /// no session cookie.
    pub fn read(&self, headers: &HeaderMap) -> Result<Option<StoredSession>, CookieError> {
        let Some(raw) = self.raw_value(headers) else {
            return Ok(None);
        };
        let json = match raw.strip_prefix(BASE64_PREFIX) {
            Some(encoded) => URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?,
            None => raw.into_bytes(),
        };
        Ok(Some(serde_json::from_slice(&json)?))
    }

    /// Names of the session cookies the request carries, chunks included.
    pub fn present(&self, headers: &HeaderMap) -> Vec<String> {
        let mut names: Vec<String> = cookie_pairs(headers)
            .filter_map(|(name, _)| std::str::from_utf8(name).ok())
            .filter(|name| self.owns(name))
            .map(str::to_string)
            .collect();
        names.dedup();
        names
    }

    /// Replace the session cookies in the request's `Cookie` header, keeping
    /// every unrelated cookie byte for byte. `None` removes the session.
    ///
    /// The header is left as it was if the new value cannot be built.
    pub fn write_request(&self, headers: &mut HeaderMap, session: Option<&StoredSession>) {
        let chunks = match session.map(|s| self.encode(s)).transpose() {
            Ok(chunks) => chunks.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Session not serializable, request cookies unchanged");
                return;
            }
        };

        let mut value: Vec<u8> = Vec::new();
        let kept = cookie_pairs(headers)
            .filter(|(name, _)| !std::str::from_utf8(name).is_ok_and(|n| self.owns(n)))
            .map(|(name, val)| [name, b"=".as_slice(), val].concat());
        let added = chunks
            .iter()
            .map(|(name, val)| format!("{name}={val}").into_bytes());
        for pair in kept.chain(added) {
            if !value.is_empty() {
                value.extend_from_slice(b"; ");
            }
            value.extend_from_slice(&pair);
        }

        if value.is_empty() {
            headers.remove(header::COOKIE);
            return;
        }
        match HeaderValue::from_bytes(&value) {
            Ok(value) => {
                headers.insert(header::COOKIE, value);
            }
            Err(_) => tracing::warn!("Rewritten Cookie header is invalid, request cookies unchanged"),
        }
    }

    /// `Set-Cookie` values storing `session`, expiring any chunk in `present`
    /// the new value no longer uses.
    pub fn issue(&self, session: &StoredSession, present: &[String]) -> Vec<HeaderValue> {
        let chunks = match self.encode(session) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(error = %e, "Session not serializable, cookies not issued");
                return Vec::new();
            }
        };

        let mut cookies: Vec<HeaderValue> = chunks
            .iter()
            .filter_map(|(name, value)| self.set_cookie(name, value, MAX_AGE_SECS))
            .collect();
        cookies.extend(
            present
                .iter()
                .filter(|name| !chunks.iter().any(|(chunk, _)| chunk == *name))
                .filter_map(|name| self.set_cookie(name, "", 0)),
        );
        cookies
    }

    /// `Set-Cookie` values expiring every session cookie in `present`.
    pub fn clear(&self, present: &[String]) -> Vec<HeaderValue> {
        present
            .iter()
            .filter_map(|name| self.set_cookie(name, "", 0))
            .collect()
    }

    /// Encode `session` as `(name, value)` cookie pairs.
    pub fn encode(&self, session: &StoredSession) -> Result<Vec<(String, String)>, serde_json::Error> {
        let json = serde_json::to_vec(session)?;
        let value = format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(json));
        if value.len() <= MAX_CHUNK_SIZE {
            return Ok(vec![(self.name.clone(), value)]);
        }

        // base64url output is ASCII, so any byte offset is a char boundary.
        let mut chunks = Vec::new();
        let mut rest = value.as_str();
        while !rest.is_empty() {
            let (head, tail) = rest.split_at(rest.len().min(MAX_CHUNK_SIZE));
            chunks.push((format!("{}.{}", self.name, chunks.len()), head.to_string()));
            rest = tail;
        }
        Ok(chunks)
    }

    /// The whole cookie value, joined from chunks when needed.
    fn raw_value(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(value) = find_cookie(headers, &self.name) {
            return Some(value);
        }
        let mut joined = String::new();
        for index in 0.. {
            match find_cookie(headers, &format!("{}.{index}", self.name)) {
                Some(chunk) => joined.push_str(&chunk),
                None => break,
            }
        }
        Some(joined).filter(|v| !v.is_empty())
    }

    /// `name` is the session cookie or one of its chunks.
    fn owns(&self, name: &str) -> bool {
        match name.strip_prefix(self.name.as_str()) {
            Some("") => true,
            Some(suffix) => suffix
                .strip_prefix('.')
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
            None => false,
        }
    }

    fn set_cookie(&self, name: &str, value: &str, max_age: u64) -> Option<HeaderValue> {
        // The dashboard's browser client reads this cookie, so no HttpOnly.
        let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age}; SameSite=Lax");
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }
}

/// Every `name=value` pair across all `Cookie` headers, as raw bytes.
fn cookie_pairs(headers: &HeaderMap) -> impl Iterator<Item = (&[u8], &[u8])> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .flat_map(|v| v.as_bytes().split(|b| *b == b';'))
        .map(<[u8]>::trim_ascii)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.iter().position(|b| *b == b'=') {
            Some(eq) => (pair[..eq].trim_ascii(), pair[eq + 1..].trim_ascii()),
            None => (pair, &pair[pair.len()..]),
        })
}

fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    cookie_pairs(headers)
        .find(|(n, _)| *n == name.as_bytes())
        .and_then(|(_, value)| std::str::from_utf8(value).ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
