//! Local cron trigger.
//!
//! Calls the dashboard's "check monitors" endpoint on a fixed interval with
//! the cron bearer secret. The endpoint lives under an excluded path, so the
//! call passes the gate untouched.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

pub const DEFAULT_CHECK_URL: &str = "http://localhost:3001/api/cron/check-monitors";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Errors from a single trigger.
#[derive(Debug, Error)]
pub enum CronError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("check failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("cron secret is not a valid header value")]
    InvalidSecret,
}

/// Triggers the monitor check endpoint.
#[derive(Clone)]
pub struct CronTrigger {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl CronTrigger {
    pub fn new(url: impl Into<String>, secret: &str) -> Result<Self, CronError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {secret}"))
            .map_err(|_| CronError::InvalidSecret)?;
        headers.insert(AUTHORIZATION, auth);

        // The endpoint is usually on localhost; ignore system proxy settings.
        let client = reqwest::Client::builder().no_proxy().build()?;

        Ok(Self {
            client,
            url: url.into(),
            headers,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call the endpoint once and return its JSON body.
    pub async fn trigger(&self) -> Result<Value, CronError> {
        let res = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(CronError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(res.json().await?)
    }

    /// Trigger now and then every `interval` until shutdown. Failures are
    /// logged and never stop the loop.
    pub async fn run(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(url = %self.url, interval_secs = interval.as_secs(), "Local cron started");

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Local cron stopping");
                    return;
                }
            }
        }
    }

    /// Trigger once and log the outcome.
    pub async fn run_once(&self) -> bool {
        tracing::info!("Triggering monitor check");
        match self.trigger().await {
            Ok(body) => {
                tracing::info!(response = %body, "Check successful");
                true
            }
            Err(CronError::Status { status, body }) => {
                tracing::error!(status, body = %body, "Check failed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Check request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_with_newline_rejected() {
        assert!(matches!(
            CronTrigger::new(DEFAULT_CHECK_URL, "bad\nsecret"),
            Err(CronError::InvalidSecret)
        ));
    }

    #[test]
    fn test_bearer_header() {
        let trigger = CronTrigger::new(DEFAULT_CHECK_URL, "s3cret").unwrap();
        assert_eq!(trigger.headers.get(AUTHORIZATION).unwrap(), "Bearer s3cret");
        assert_eq!(trigger.url(), DEFAULT_CHECK_URL);
    }
}
