//! Application state management
//!
//! Each monitor owns its snapshot store outright; the only thing it shares
//! with the rest of the process is a read-only status handle. The status
//! surface renders these handles and has no path that mutates a monitor.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Scheduler state of one monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Init,
    Polling,
    Stopped,
}

/// Mutable part of a monitor's status, updated once per cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounters {
    pub state: MonitorState,
    pub cycles: u64,
    pub cycles_skipped: u64,
    pub notifications_delivered: u64,
    pub notifications_failed: u64,
    pub snapshot_rows: usize,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_source_modified: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for StatusCounters {
    fn default() -> Self {
        Self {
            state: MonitorState::Init,
            cycles: 0,
            cycles_skipped: 0,
            notifications_delivered: 0,
            notifications_failed: 0,
            snapshot_rows: 0,
            last_cycle_at: None,
            last_source_modified: None,
            last_error: None,
        }
    }
}

/// Read-only status handle for one monitor
pub struct MonitorStatus {
    pub id: Uuid,
    pub name: String,
    pub table: String,
    counters: RwLock<StatusCounters>,
}

impl MonitorStatus {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            table: table.into(),
            counters: RwLock::new(StatusCounters::default()),
        }
    }

    pub async fn set_state(&self, state: MonitorState) {
        self.counters.write().await.state = state;
    }

    pub async fn record_skipped(&self) {
        let mut c = self.counters.write().await;
        c.cycles += 1;
        c.cycles_skipped += 1;
        c.last_cycle_at = Some(Utc::now());
        c.last_error = None;
    }

    pub async fn record_cycle(
        &self,
        snapshot_rows: usize,
        source_modified: Option<DateTime<Utc>>,
        delivered: bool,
        failed: bool,
    ) {
        let mut c = self.counters.write().await;
        c.cycles += 1;
        c.snapshot_rows = snapshot_rows;
        c.last_cycle_at = Some(Utc::now());
        c.last_source_modified = source_modified;
        if delivered {
            c.notifications_delivered += 1;
        }
        if failed {
            c.notifications_failed += 1;
        }
        c.last_error = None;
    }

    pub async fn record_error(&self, error: impl Into<String>) {
        let mut c = self.counters.write().await;
        c.cycles += 1;
        c.last_cycle_at = Some(Utc::now());
        c.last_error = Some(error.into());
    }

    /// Point-in-time view for the status surface.
    pub async fn view(&self) -> MonitorStatusView {
        MonitorStatusView {
            id: self.id,
            name: self.name.clone(),
            table: self.table.clone(),
            counters: self.counters.read().await.clone(),
        }
    }
}

/// Serialized status of one monitor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatusView {
    pub id: Uuid,
    pub name: String,
    pub table: String,
    #[serde(flatten)]
    pub counters: StatusCounters,
}

/// Application state shared across all handlers
pub struct AppState {
    /// Read-only status handles, one per monitor
    pub monitors: Vec<Arc<MonitorStatus>>,
}

impl AppState {
    pub fn new(monitors: Vec<Arc<MonitorStatus>>) -> Self {
        Self { monitors }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
