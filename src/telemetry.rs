// Request telemetry aggregator
//
// Keeps a bounded FIFO of completed upstream requests and derives success
// rate, throughput and latency summaries on demand.
//
// Numan Thabit 2025 Nov

use crate::metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::info;

/// Default capacity of the telemetry buffer.
pub const DEFAULT_MAX_LOGS: usize = 10000;

/// Latency label used for models outside the configured list.
pub const OTHER_MODEL_LABEL: &str = "other";

/// One completed upstream call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLog {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub model: String,
    pub status_code: u16,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub session_idx: usize,
    pub is_streaming: bool,
}

/// Measures a request on the proxy path and turns it into a [`RequestLog`].
#[derive(Debug)]
pub struct RequestTimer {
    started: Instant,
    timestamp: DateTime<Utc>,
    method: String,
    path: String,
    model: String,
    session_idx: usize,
    is_streaming: bool,
}

impl RequestTimer {
    pub fn start(
        method: impl Into<String>,
        path: impl Into<String>,
        model: impl Into<String>,
        session_idx: usize,
        is_streaming: bool,
    ) -> Self {
        Self {
            started: Instant::now(),
            timestamp: Utc::now(),
            method: method.into(),
            path: path.into(),
            model: model.into(),
            session_idx,
            is_streaming,
        }
    }

    /// Finish the measurement. 2xx and 3xx statuses count as successes.
    pub fn finish(self, status_code: u16, error: Option<String>) -> RequestLog {
        RequestLog {
            timestamp: self.timestamp,
            method: self.method,
            path: self.path,
            model: self.model,
            status_code,
            duration_ms: self.started.elapsed().as_millis() as u64,
            success: (200..400).contains(&status_code) && error.is_none(),
            error,
            session_idx: self.session_idx,
            is_streaming: self.is_streaming,
        }
    }
}

/// Aggregated statistics over the current buffer contents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Stats {
    pub total_requests: u64,
    pub success_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    /// requests per minute since the window origin
    pub rpm: f64,
    pub avg_duration_ms: f64,
}

struct Buffer {
    logs: VecDeque<RequestLog>,
    start_time: Instant,
}

/// Bounded request log shared between the proxy path and the admin API
pub struct RequestLogger {
    inner: RwLock<Buffer>,
    max_logs: usize,
    /// models allowed as metric label values
    known_models: Vec<String>,
}

impl RequestLogger {
    pub fn new(max_logs: usize) -> Self {
        let max_logs = max_logs.max(1);
        Self {
            inner: RwLock::new(Buffer {
                logs: VecDeque::with_capacity(max_logs.min(DEFAULT_MAX_LOGS)),
                start_time: Instant::now(),
            }),
            max_logs,
            known_models: Vec::new(),
        }
    }

    /// Restrict latency metric labels to `models`; anything else is
    /// reported as [`OTHER_MODEL_LABEL`].
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.known_models = models;
        self
    }

    pub fn max_logs(&self) -> usize {
        self.max_logs
    }

    fn model_label<'a>(&self, model: &'a str) -> &'a str {
        if self.known_models.iter().any(|m| m == model) {
            model
        } else {
            OTHER_MODEL_LABEL
        }
    }

    pub async fn record(&self, log: RequestLog) {
        let outcome = if log.success { "success" } else { "failure" };
        metrics::REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
        metrics::REQUEST_LATENCY
            .with_label_values(&[self.model_label(&log.model)])
            .observe(log.duration_ms as f64 / 1000.0);

        let mut buf = self.inner.write().await;
        buf.logs.push_back(log);
        while buf.logs.len() > self.max_logs {
            buf.logs.pop_front();
        }
    }

    pub async fn stats(&self) -> Stats {
        let buf = self.inner.read().await;
        let mut success = 0u64;
        let mut failed = 0u64;
        let mut total_duration = 0u64;
        for log in &buf.logs {
            if log.success {
                success += 1;
            } else {
                failed += 1;
            }
            total_duration += log.duration_ms;
        }
        let elapsed_minutes = buf.start_time.elapsed().as_secs_f64() / 60.0;
        drop(buf);

        let total = success + failed;
        let (success_rate, avg_duration_ms) = if total > 0 {
            (
                success as f64 / total as f64 * 100.0,
                total_duration as f64 / total as f64,
            )
        } else {
            (0.0, 0.0)
        };
        let rpm = if elapsed_minutes > 0.0 {
            total as f64 / elapsed_minutes
        } else {
            0.0
        };

        Stats {
            total_requests: total,
            success_requests: success,
            failed_requests: failed,
            success_rate,
            rpm,
            avg_duration_ms,
        }
    }

    /// Most recent entries, newest first. `limit == 0` returns everything.
    pub async fn recent(&self, limit: usize) -> Vec<RequestLog> {
        let buf = self.inner.read().await;
        let limit = if limit == 0 || limit > buf.logs.len() {
            buf.logs.len()
        } else {
            limit
        };
        buf.logs.iter().rev().take(limit).cloned().collect()
    }

    /// Entries strictly between `start` and `end`, oldest first.
    pub async fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<RequestLog> {
        let buf = self.inner.read().await;
        buf.logs
            .iter()
            .filter(|log| log.timestamp > start && log.timestamp < end)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.logs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Origin of the current rate window.
    pub async fn window_started(&self) -> Instant {
        self.inner.read().await.start_time
    }

    /// Drop all entries and restart the rate window.
    pub async fn clear(&self) {
        let mut buf = self.inner.write().await;
        let dropped = buf.logs.len();
        buf.logs = VecDeque::new();
        buf.start_time = Instant::now();
        info!(dropped, "request logs cleared");
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOGS)
    }
}
