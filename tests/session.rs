//! Session refresh and auth redirects behind the gate.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use serde_json::{json, Value};

use uptime_gate::config::SessionConfig;
use uptime_gate::session::{
    Aal, AssuranceLevel, AuthError, AuthProvider, AuthSessionRefresher, AuthUser,
    AuthenticatedSession, SessionCookie, SessionTokens, StoredSession,
};

mod common;

const AUTH_URL: &str = "https://abcdefgh.supabase.co";
const COOKIE: &str = "sb-abcdefgh-auth-token";

/// Resolves sessions by the access token's literal value.
struct FakeProvider;

fn stored(access: &str, extra: Value) -> StoredSession {
    let mut session = json!({
        "access_token": access,
        "refresh_token": format!("r-{access}"),
        "token_type": "bearer",
        "user": {"id": "user-1"}
    });
    if let (Some(session), Value::Object(extra)) = (session.as_object_mut(), extra) {
        session.extend(extra);
    }
    serde_json::from_value(session).unwrap()
}

fn session(current: Aal, next: Aal, rotated: Option<StoredSession>) -> AuthenticatedSession {
    AuthenticatedSession {
        user: AuthUser {
            id: "user-1".into(),
            email: Some("owner@example.com".into()),
            factors: None,
        },
        assurance: AssuranceLevel { current, next },
        rotated,
    }
}

#[async_trait]
impl AuthProvider for FakeProvider {
    async fn authenticate(
        &self,
        tokens: &SessionTokens,
    ) -> Result<Option<AuthenticatedSession>, AuthError> {
        match tokens.access_token.as_deref() {
            Some("valid") => Ok(Some(session(Aal::Aal1, Aal::Aal1, None))),
            Some("mfa-pending") => Ok(Some(session(Aal::Aal1, Aal::Aal2, None))),
            Some("mfa-verified") => Ok(Some(session(Aal::Aal2, Aal::Aal2, None))),
            Some("stale") => Ok(Some(session(Aal::Aal1, Aal::Aal1, Some(stored("fresh", json!({})))))),
            Some("outage") => Err(AuthError::UnexpectedStatus(503)),
            _ => Ok(None),
        }
    }
}

fn session_cookie() -> SessionCookie {
    SessionCookie {
        name: COOKIE.into(),
        secure: false,
    }
}

/// `Cookie` header carrying `session`, chunked if it is large.
fn cookie_header(session: &StoredSession) -> String {
    let pairs = session_cookie().encode(session).unwrap();
    let pairs: Vec<String> = pairs.iter().map(|(n, v)| format!("{n}={v}")).collect();
    format!("theme=dark; {}", pairs.join("; "))
}

/// The session the upstream received, read back from its `Cookie` header.
fn upstream_session(body: &Value) -> Option<StoredSession> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = body["cookie"].as_str() {
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
    }
    session_cookie().read(&headers).unwrap()
}

async fn start() -> common::TestGate {
    let upstream = common::start_echo_upstream().await;
    let config = SessionConfig {
        enabled: true,
        auth_url: AUTH_URL.into(),
        secure_cookies: false,
        ..Default::default()
    };
    let refresher = AuthSessionRefresher::new(FakeProvider, &config);
    common::start_gate(upstream, Arc::new(refresher)).await
}

async fn get_with_cookie(gate: &common::TestGate, path: &str, cookie: Option<String>) -> reqwest::Response {
    let mut req = common::client().get(gate.url(path));
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.send().await.unwrap()
}

async fn get(gate: &common::TestGate, path: &str, access: Option<&str>) -> reqwest::Response {
    let cookie = access.map(|token| cookie_header(&stored(token, json!({}))));
    get_with_cookie(gate, path, cookie).await
}

fn location(res: &reqwest::Response) -> &str {
    res.headers()[header::LOCATION].to_str().unwrap()
}

fn set_cookies(res: &reqwest::Response) -> Vec<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_anonymous_dashboard_redirects_to_login() {
    let gate = start().await;

    let res = get(&gate, "/dashboard", None).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "/login");
    assert!(set_cookies(&res).is_empty());

    let res = get(&gate, "/dashboard/monitors/7?tab=history", None).await;
    assert_eq!(location(&res), "/login?tab=history");
}

#[tokio::test]
async fn test_anonymous_public_pages_pass() {
    let gate = start().await;
    for path in ["/", "/login", "/signup", "/status/acme"] {
        let res = get(&gate, path, None).await;
        assert_eq!(res.status(), StatusCode::OK, "path {path}");
    }
}

#[tokio::test]
async fn test_signed_in_user() {
    let gate = start().await;

    let res = get(&gate, "/dashboard/incidents", Some("valid")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(set_cookies(&res).is_empty());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["cookie"], cookie_header(&stored("valid", json!({}))));

    for path in ["/login", "/signup", "/mfa"] {
        let res = get(&gate, path, Some("valid")).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT, "path {path}");
        assert_eq!(location(&res), "/dashboard");
    }
}

#[tokio::test]
async fn test_pending_mfa_redirects_to_verification() {
    let gate = start().await;

    for path in ["/dashboard", "/login"] {
        let res = get(&gate, path, Some("mfa-pending")).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT, "path {path}");
        assert_eq!(location(&res), "/mfa");
    }

    let res = get(&gate, "/mfa", Some("mfa-pending")).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = get(&gate, "/dashboard", Some("mfa-verified")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = get(&gate, "/mfa", Some("mfa-verified")).await;
    assert_eq!(location(&res), "/dashboard");
}

#[tokio::test]
async fn test_rotated_session_reaches_upstream_and_client() {
    let gate = start().await;

    let res = get(&gate, "/dashboard", Some("stale")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let fresh = session_cookie().encode(&stored("fresh", json!({}))).unwrap();
    assert_eq!(
        set_cookies(&res),
        vec![format!("{COOKIE}={}; Path=/; Max-Age=34560000; SameSite=Lax", fresh[0].1)]
    );
    let body: Value = res.json().await.unwrap();
    let forwarded = upstream_session(&body).expect("session forwarded");
    assert_eq!(forwarded.access_token, "fresh");
    assert_eq!(forwarded.refresh_token, "r-fresh");
    assert!(body["cookie"].as_str().unwrap().starts_with("theme=dark; "));
}

#[tokio::test]
async fn test_chunked_session_is_read_and_replaced() {
    let gate = start().await;

    let large = stored("stale", json!({"provider_token": "p".repeat(6000)}));
    let cookie = cookie_header(&large);
    assert!(cookie.contains(&format!("{COOKIE}.1=")));

    let res = get_with_cookie(&gate, "/dashboard", Some(cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let cookies = set_cookies(&res);
    assert!(cookies[0].starts_with(&format!("{COOKIE}=base64-")));
    assert!(cookies.contains(&format!("{COOKIE}.0=; Path=/; Max-Age=0; SameSite=Lax")));
    assert!(cookies.contains(&format!("{COOKIE}.1=; Path=/; Max-Age=0; SameSite=Lax")));

    let body: Value = res.json().await.unwrap();
    assert_eq!(upstream_session(&body).unwrap().access_token, "fresh");
    assert!(!body["cookie"].as_str().unwrap().contains(&format!("{COOKIE}.0")));
}

#[tokio::test]
async fn test_invalid_session_clears_cookies() {
    let gate = start().await;

    let res = get(&gate, "/dashboard", Some("revoked")).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "/login");
    assert_eq!(
        set_cookies(&res),
        vec![format!("{COOKIE}=; Path=/; Max-Age=0; SameSite=Lax")]
    );

    let res = get(&gate, "/status/acme", Some("revoked")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(set_cookies(&res).len(), 1);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["cookie"], "theme=dark");
}

#[tokio::test]
async fn test_unreadable_session_cookie_is_cleared() {
    let gate = start().await;

    let cookie = format!("theme=dark; {COOKIE}=base64-not*base64");
    let res = get_with_cookie(&gate, "/dashboard", Some(cookie)).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "/login");
    assert_eq!(
        set_cookies(&res),
        vec![format!("{COOKIE}=; Path=/; Max-Age=0; SameSite=Lax")]
    );
}

#[tokio::test]
async fn test_other_projects_cookies_are_ignored() {
    let gate = start().await;

    let other = session_cookie().encode(&stored("valid", json!({}))).unwrap();
    let cookie = format!("sb-otherproj-auth-token={}", other[0].1);
    let res = get_with_cookie(&gate, "/dashboard", Some(cookie.clone())).await;
    assert_eq!(location(&res), "/login");
    assert!(set_cookies(&res).is_empty());

    let res = get_with_cookie(&gate, "/status/acme", Some(cookie.clone())).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["cookie"], cookie);
}

#[tokio::test]
async fn test_provider_outage_keeps_cookies() {
    let gate = start().await;

    let res = get(&gate, "/status/acme", Some("outage")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(set_cookies(&res).is_empty());

    let res = get(&gate, "/dashboard", Some("outage")).await;
    assert_eq!(location(&res), "/login");
    assert!(set_cookies(&res).is_empty());
}

#[tokio::test]
async fn test_forged_header_rejected_before_session() {
    let gate = start().await;

    let res = common::client()
        .get(gate.url("/dashboard"))
        .header("x-middleware-subrequest", "middleware")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(res.headers().get(header::LOCATION).is_none());
}
