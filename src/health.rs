//! Backend health checks, polling and local port discovery.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::{ApiClient, ApiRequest, ApiResponse};

/// Result of one health check.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: u64,
    /// Body of the health endpoint, or the error code when unhealthy.
    pub detail: JsonValue,
}

impl ApiClient {
    /// Checks the configured health path once, without retries or credential refresh.
    pub async fn health(&self) -> HealthStatus {
        let started = Instant::now();
        let request = ApiRequest::get(self.options().health_path.clone())
            .max_attempts(1)
            .without_auth_refresh();
        let response: ApiResponse<JsonValue> = self.send(request).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match response {
            ApiResponse::Success { data, .. } => HealthStatus {
                healthy: true,
                latency_ms,
                detail: data,
            },
            ApiResponse::Failure { error } => HealthStatus {
                healthy: false,
                latency_ms,
                detail: JsonValue::String(error.code),
            },
        }
    }
}

/// Background task polling [`ApiClient::health`] on a fixed interval.
///
/// Polling stops when the monitor is dropped.
#[derive(Debug)]
pub struct HealthMonitor {
    status: watch::Receiver<Option<HealthStatus>>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Starts polling immediately, then every `interval`.
    pub fn spawn(client: ApiClient, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = client.health().await;
                if !status.healthy {
                    tracing::warn!(latency_ms = status.latency_ms, detail = %status.detail, "backend unhealthy");
                }
                if tx.send(Some(status)).is_err() {
                    break;
                }
            }
        });
        Self { status: rx, task }
    }

    /// Latest check result, `None` before the first check finishes.
    pub fn current(&self) -> Option<HealthStatus> {
        self.status.borrow().clone()
    }

    /// Receiver notified on every new check result.
    pub fn subscribe(&self) -> watch::Receiver<Option<HealthStatus>> {
        self.status.clone()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Requests `http://127.0.0.1:<port><path>` for each port in order and
/// returns the base URL of the first one answering with a 2xx status.
pub async fn discover_local_backend(
    ports: &[u16],
    path: &str,
    timeout: Duration,
) -> Option<String> {
    let http = reqwest::Client::new();
    for port in ports {
        let base_url = format!("http://127.0.0.1:{port}");
        let health_url = format!("{base_url}/{}", path.trim_start_matches('/'));
        match http.get(&health_url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(port, "found backend");
                return Some(base_url);
            }
            Ok(response) => {
                tracing::debug!(port, status = response.status().as_u16(), "port answered without success");
            }
            Err(err) => {
                tracing::trace!(port, error = %err, "port not reachable");
            }
        }
    }
    None
}
