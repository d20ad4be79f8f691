//! Notification Dispatch
//!
//! Serializes a delta into the webhook payload and hands it to the
//! transport. Dispatch is fire-and-forget: a failed or rejected delivery is
//! logged and lost - the snapshot has already advanced past it and is never
//! rolled back. Consumers wanting durability should put a queue behind the
//! webhook endpoint.

use crate::detect::{Delta, DeltaSummary};
use crate::error::{MonitorError, MonitorResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

/// Shared HTTP client; per-request timeouts are applied at send time.
static HTTP: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// The webhook payload contract.
#[derive(Debug, Serialize)]
pub struct NotificationPayload {
    pub timestamp: DateTime<Utc>,
    pub database: String,
    pub changes: ChangeSet,
}

#[derive(Debug, Serialize)]
pub struct ChangeSet {
    pub summary: DeltaSummary,
    pub details: Delta,
}

impl NotificationPayload {
    pub fn from_delta(table: &str, delta: &Delta) -> Self {
        Self {
            timestamp: Utc::now(),
            database: table.to_string(),
            changes: ChangeSet {
                summary: delta.summary(),
                details: delta.clone(),
            },
        }
    }
}

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Delta was empty; the transport was never touched.
    Skipped,
    /// Consumer accepted the payload.
    Delivered { status: u16 },
    /// Transport error or non-success response. Not retried.
    Failed { reason: String },
}

/// Capability to deliver a serialized payload to the consumer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &Value) -> MonitorResult<u16>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, payload: &Value) -> MonitorResult<u16> {
        (**self).send(payload).await
    }
}

/// HTTP POST transport with a bounded per-request timeout.
pub struct HttpTransport {
    endpoint: Url,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &Value) -> MonitorResult<u16> {
        let response = HTTP
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| MonitorError::Dispatch(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// Builds payloads and hands them to the transport.
pub struct NotificationDispatcher {
    transport: Box<dyn Transport>,
}

impl NotificationDispatcher {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Dispatch a delta for `table`.
    ///
    /// No-ops without touching the transport when the delta is empty. A
    /// non-2xx response or transport error is reported as `Failed`; there is
    /// no retry and the already-swapped snapshot stays as it is.
    pub async fn dispatch(&self, table: &str, delta: &Delta) -> DispatchOutcome {
        if delta.is_empty() {
            return DispatchOutcome::Skipped;
        }

        let payload = NotificationPayload::from_delta(table, delta);
        let body = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to serialize payload for {}: {}", table, e);
                return DispatchOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match self.transport.send(&body).await {
            Ok(status) if (200..300).contains(&status) => {
                let summary = delta.summary();
                info!(
                    "📤 Notified {}: {} new, {} modified, {} deleted",
                    table,
                    summary.new_records,
                    summary.modified_records,
                    summary.deleted_records
                );
                DispatchOutcome::Delivered { status }
            }
            Ok(status) => {
                error!("Consumer rejected notification for {} (HTTP {})", table, status);
                DispatchOutcome::Failed {
                    reason: format!("HTTP {}", status),
                }
            }
            Err(e) => {
                error!("Notification for {} not delivered: {}", table, e);
                DispatchOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
