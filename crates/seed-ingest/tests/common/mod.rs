//! Shared helpers for seed-ingest integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

use seed_common::RawRecord;
use seed_ingest::config::{Endpoints, IngestConfig};
use seed_ingest::dispatch::{Dispatcher, RetryPolicy};
use seed_ingest::progress::ProgressObserver;

/// Answers every create with 201, echoing the payload plus an increasing id
pub struct SequentialIds {
    next: AtomicI64,
}

impl SequentialIds {
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Respond for SequentialIds {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        let mut body: Value = serde_json::from_slice(&request.body).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut body {
            map.insert("id".to_string(), json!(id));
        }
        ResponseTemplate::new(201).set_body_json(body)
    }
}

/// Answers every create with 201 and an id derived from one payload field
pub struct IdFromField {
    field: &'static str,
    prefix: &'static str,
}

impl IdFromField {
    pub fn new(field: &'static str, prefix: &'static str) -> Self {
        Self { field, prefix }
    }
}

impl Respond for IdFromField {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_else(|_| json!({}));
        let value = body[self.field].as_str().unwrap_or_default();
        let id = format!("{}{}", self.prefix, value);
        ResponseTemplate::new(201).set_body_json(json!({ "id": id }))
    }
}

/// Records when each request arrives, fails the first `failures` of them
/// with 500, then answers 201 with an increasing id after `delay`
pub struct TimedResponder {
    arrivals: Arc<Mutex<Vec<Instant>>>,
    seen: AtomicUsize,
    next: AtomicI64,
    failures: usize,
    delay: Duration,
}

impl TimedResponder {
    pub fn new(delay: Duration) -> Self {
        Self {
            arrivals: Arc::default(),
            seen: AtomicUsize::new(0),
            next: AtomicI64::new(1),
            failures: 0,
            delay,
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    /// Handle on the arrival times, readable after the responder is mounted
    pub fn arrivals(&self) -> Arc<Mutex<Vec<Instant>>> {
        Arc::clone(&self.arrivals)
    }
}

impl Respond for TimedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        if self.seen.fetch_add(1, Ordering::SeqCst) < self.failures {
            return ResponseTemplate::new(500);
        }
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(201)
            .set_body_json(json!({ "id": id }))
            .set_delay(self.delay)
    }
}

/// Sorted copy of the recorded arrival times
pub fn sorted_arrivals(arrivals: &Arc<Mutex<Vec<Instant>>>) -> Vec<Instant> {
    let mut times = arrivals.lock().unwrap().clone();
    times.sort();
    times
}

/// Largest number of requests that arrived within one `delay` window.
///
/// Every request is answered no sooner than `delay` after it arrives, so all
/// requests counted in a window were outstanding on the client at once.
pub fn max_in_flight(arrivals: &[Instant], delay: Duration) -> usize {
    arrivals
        .iter()
        .map(|&at| {
            arrivals
                .iter()
                .filter(|&&other| other <= at && at.duration_since(other) < delay)
                .count()
        })
        .max()
        .unwrap_or(0)
}

/// Records every progress update
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub updates: Mutex<Vec<(u64, u64)>>,
    pub finished: Mutex<bool>,
}

impl ProgressObserver for RecordingProgress {
    fn on_progress(&self, current: u64, total: u64) {
        self.updates.lock().unwrap().push((current, total));
    }

    fn on_finish(&self) {
        *self.finished.lock().unwrap() = true;
    }
}

pub fn record(pairs: &[(&str, &str)]) -> RawRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(10))
}

pub fn fast_dispatcher(max_attempts: u32) -> Dispatcher {
    Dispatcher::new(fast_policy(max_attempts), Duration::from_secs(2)).unwrap()
}

/// Configuration pointing every endpoint at `server`
pub fn config_for(server: &MockServer) -> IngestConfig {
    IngestConfig {
        endpoints: Endpoints::from_base(&server.uri()),
        retry: fast_policy(2),
        request_timeout: Duration::from_secs(2),
        concurrency: 4,
        page_size: 50,
        batch_size: 4,
        enrollment_count: 10,
        rng_seed: Some(7),
        ..IngestConfig::default()
    }
}

/// JSON bodies of every request received for `method` on `path`
pub async fn bodies(server: &MockServer, method: &str, path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == method && r.url.path() == path)
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}
