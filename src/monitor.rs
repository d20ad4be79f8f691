//! Table Monitor
//!
//! Drives the detect → notify cycle for one monitored table on a fixed
//! interval. Cycles are strictly sequential; a cycle runs to completion (or
//! fails) before the next begins, and cancellation is only observed between
//! cycles. Failures inside a cycle are contained by an explicit policy:
//! configuration problems abort the monitor, everything else is logged and
//! retried on the next tick.

use crate::config::MonitorConfig;
use crate::detect::{ChangeDetector, SnapshotEntry, SnapshotStore};
use crate::enrich::Enricher;
use crate::error::{config_error, source_error, MonitorError, MonitorResult};
use crate::fingerprint::RecordHasher;
use crate::notify::{DispatchOutcome, HttpTransport, NotificationDispatcher, Transport};
use crate::source::{RecordSource, RowFilter};
use crate::state::{MonitorState, MonitorStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use url::Url;

/// What the scheduler does after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePolicy {
    /// Log, sleep the interval, try again.
    Continue,
    /// Leave the polling loop for good.
    Abort,
}

/// Failure-handling policy, kept as a plain function so it can be tested
/// on its own. Only configuration errors are unrecoverable; a flaky source
/// or consumer just costs us the cycle.
pub fn failure_policy(error: &MonitorError) -> CyclePolicy {
    match error {
        MonitorError::Config(_) => CyclePolicy::Abort,
        _ => CyclePolicy::Continue,
    }
}

/// Result of one detect → notify cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Source modification time has not advanced; nothing was read.
    SkippedUnchanged,
    /// First cycle with notification suppressed by configuration.
    Suppressed { new_records: usize },
    /// Full cycle ran; `dispatch` is `Skipped` when the delta was empty.
    Completed { dispatch: DispatchOutcome },
}

/// Monitors one table: reads, enriches, diffs, notifies, swaps the snapshot.
pub struct Monitor {
    config: MonitorConfig,
    filter: Option<RowFilter>,
    source: Arc<dyn RecordSource>,
    store: SnapshotStore,
    dispatcher: NotificationDispatcher,
    status: Arc<MonitorStatus>,
    initialized: bool,
}

impl Monitor {
    /// Build a monitor with the standard HTTP webhook transport.
    pub fn new(config: MonitorConfig, source: Arc<dyn RecordSource>) -> MonitorResult<Self> {
        let endpoint = Url::parse(&config.webhook_url).map_err(|e| {
            config_error(format!("Invalid webhook URL '{}': {}", config.webhook_url, e))
        })?;
        let transport = HttpTransport::new(
            endpoint,
            Duration::from_secs(config.request_timeout_secs),
        );
        Self::with_transport(config, source, Box::new(transport))
    }

    /// Build a monitor with an explicit transport.
    pub fn with_transport(
        config: MonitorConfig,
        source: Arc<dyn RecordSource>,
        transport: Box<dyn Transport>,
    ) -> MonitorResult<Self> {
        if config.poll_interval_secs == 0 {
            return Err(config_error("Poll interval must be positive"));
        }
        let filter = config
            .filter
            .as_deref()
            .map(RowFilter::parse)
            .transpose()?;
        let status = Arc::new(MonitorStatus::new(&config.name, &config.table));

        Ok(Self {
            config,
            filter,
            source,
            store: SnapshotStore::new(),
            dispatcher: NotificationDispatcher::new(transport),
            status,
            initialized: false,
        })
    }

    /// Read-only status handle for the diagnostics surface.
    pub fn status(&self) -> Arc<MonitorStatus> {
        Arc::clone(&self.status)
    }

    /// Number of rows in the current snapshot.
    #[allow(dead_code)]
    pub async fn snapshot_rows(&self) -> usize {
        self.store.len().await
    }

    /// Run one detect → notify cycle.
    pub async fn run_cycle(&mut self) -> MonitorResult<CycleOutcome> {
        let table = self.config.table.clone();

        let source_modified = match self.source.last_modified(&table).await {
            Ok(modified) => modified,
            Err(e) if self.config.trust_modification_time => return Err(e),
            Err(e) => {
                warn!("Modification time unavailable for {}: {}", table, e);
                None
            }
        };

        // Cheap skip: the backing storage has not been touched since the
        // last observed modification time. The first cycle has no prior
        // observation and always falls through to a full read.
        if self.config.trust_modification_time {
            if let (Some(current), Some(seen)) =
                (source_modified, self.store.last_modified().await)
            {
                if current <= seen {
                    return Ok(CycleOutcome::SkippedUnchanged);
                }
            }
        }

        let rows = tokio::time::timeout(
            Duration::from_secs(self.config.source_timeout_secs),
            self.source.read_table(&table, self.filter.as_ref()),
        )
        .await
        .map_err(|_| {
            source_error(format!(
                "Timed out reading {} after {}s",
                table, self.config.source_timeout_secs
            ))
        })??;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            // Fingerprint the raw row before enrichment so related data
            // never influences change detection.
            let fingerprint = RecordHasher::fingerprint(&row);
            let record =
                Enricher::enrich(self.source.as_ref(), row, &self.config.joins).await;
            entries.push(SnapshotEntry {
                record,
                fingerprint,
            });
        }

        let previous = self.store.current().await;
        let (delta, snapshot) =
            ChangeDetector::detect(&previous.entries, entries, &self.config.key_field);

        let first_cycle = !self.initialized;
        // The snapshot advances whatever happens downstream; a failed
        // dispatch is lost, not requeued.
        self.store.replace(snapshot, source_modified).await;
        self.initialized = true;

        if first_cycle && !self.config.notify_on_first_cycle {
            let new_records = delta.new.len();
            if new_records > 0 {
                info!(
                    "Initial delta for {} suppressed by configuration ({} records)",
                    table, new_records
                );
            }
            return Ok(CycleOutcome::Suppressed { new_records });
        }

        let dispatch = self.dispatcher.dispatch(&table, &delta).await;
        Ok(CycleOutcome::Completed { dispatch })
    }

    /// Poll until cancelled.
    ///
    /// The shutdown signal is observed at the top of each iteration, never
    /// mid-cycle. Cycle failures follow [`failure_policy`].
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "👀 Monitor '{}' watching {} every {}s",
            self.config.name, self.config.table, self.config.poll_interval_secs
        );
        self.status.set_state(MonitorState::Polling).await;

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(CycleOutcome::SkippedUnchanged) => {
                    self.status.record_skipped().await;
                    info!("💓 {} unchanged, nothing to do", self.config.table);
                }
                Ok(CycleOutcome::Suppressed { new_records }) => {
                    let rows = self.store.len().await;
                    let modified = self.store.last_modified().await;
                    self.status.record_cycle(rows, modified, false, false).await;
                    info!(
                        "💓 {} baseline established ({} records, notification suppressed)",
                        self.config.table, new_records
                    );
                }
                Ok(CycleOutcome::Completed { dispatch }) => {
                    let rows = self.store.len().await;
                    let modified = self.store.last_modified().await;
                    let delivered = matches!(dispatch, DispatchOutcome::Delivered { .. });
                    let failed = matches!(dispatch, DispatchOutcome::Failed { .. });
                    self.status.record_cycle(rows, modified, delivered, failed).await;
                    if matches!(dispatch, DispatchOutcome::Skipped) {
                        info!("💓 {} alive, no changes ({} rows)", self.config.table, rows);
                    }
                }
                Err(e) => {
                    self.status.record_error(e.to_string()).await;
                    match failure_policy(&e) {
                        CyclePolicy::Continue => {
                            warn!(
                                "🔁 Cycle failed for '{}' ({}); retrying next interval",
                                self.config.name, e
                            );
                        }
                        CyclePolicy::Abort => {
                            error!("Monitor '{}' aborting: {}", self.config.name, e);
                            break;
                        }
                    }
                }
            }
        }

        self.status.set_state(MonitorState::Stopped).await;
        info!("🛑 Monitor '{}' stopped", self.config.name);
    }
}
