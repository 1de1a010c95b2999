//! Outbound requests with bounded retries
//!
//! A dispatch is one create (`POST`) or partial update (`PATCH`) against an
//! entity service. Only HTTP 200 and 201 count as success; every other status
//! and every transport fault is retried until the [`RetryPolicy`] runs out, at
//! which point the record is dropped and the caller moves on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use seed_common::{RemoteId, Result, SeedError};

use crate::config::{IngestConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS};

/// Attempt budget and linear backoff of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per dispatch, first try included
    pub max_attempts: u32,
    /// Delay unit; retry `i` waits `base_delay * i`
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        )
    }
}

/// HTTP verbs a dispatch may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMethod {
    Post,
    Patch,
}

impl From<DispatchMethod> for Method {
    fn from(method: DispatchMethod) -> Self {
        match method {
            DispatchMethod::Post => Method::POST,
            DispatchMethod::Patch => Method::PATCH,
        }
    }
}

impl std::fmt::Display for DispatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMethod::Post => f.write_str("POST"),
            DispatchMethod::Patch => f.write_str("PATCH"),
        }
    }
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    succeeded: AtomicU64,
    exhausted: AtomicU64,
}

/// Point-in-time view of dispatcher activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub attempts: u64,
    pub succeeded: u64,
    pub exhausted: u64,
}

/// Retrying HTTP dispatcher shared by every stage of a run.
///
/// Cloning is cheap; clones share the connection pool and the counters.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    policy: RetryPolicy,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Build a dispatcher whose every attempt times out after `request_timeout`
    pub fn new(policy: RetryPolicy, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SeedError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            policy,
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        Self::new(config.retry, config.request_timeout)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Underlying client, for single-shot reads that bypass retries
    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            exhausted: self.counters.exhausted.load(Ordering::Relaxed),
        }
    }

    /// Create an entity at a collection endpoint
    pub async fn create(&self, endpoint: &str, payload: &Value) -> Option<Value> {
        self.dispatch(DispatchMethod::Post, endpoint, payload).await
    }

    /// Partially update the entity `id` under a collection endpoint
    pub async fn update(&self, endpoint: &str, id: &RemoteId, payload: &Value) -> Option<Value> {
        let url = format!("{}/{}", endpoint.trim_end_matches('/'), id);
        self.dispatch(DispatchMethod::Patch, &url, payload).await
    }

    /// Send `payload` to `url`, retrying per the policy.
    ///
    /// Returns the decoded response body on HTTP 200/201, or `None` once all
    /// attempts failed. A success body that is not JSON decodes as `Null`.
    pub async fn dispatch(
        &self,
        method: DispatchMethod,
        url: &str,
        payload: &Value,
    ) -> Option<Value> {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            self.counters.attempts.fetch_add(1, Ordering::Relaxed);

            match self.attempt(method, url, payload).await {
                Ok(body) => {
                    self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(%method, url, attempt, "Dispatch succeeded");
                    return Some(body);
                },
                Err(e) if attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        %method,
                        url,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Dispatch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) => {
                    error!(
                        %method,
                        url,
                        attempts = max_attempts,
                        error = %e,
                        payload = %payload,
                        "Dispatch exhausted retries, dropping record"
                    );
                },
            }
        }

        self.counters.exhausted.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn attempt(
        &self,
        method: DispatchMethod,
        url: &str,
        payload: &Value,
    ) -> std::result::Result<Value, AttemptError> {
        let response = self
            .client
            .request(method.into(), url)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(AttemptError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body).unwrap_or(Value::Null))
    }
}
