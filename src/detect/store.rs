//! Snapshot Store
//!
//! Holds the most recent materialized view of one monitored table: enriched
//! records keyed by primary key, each with the fingerprint of its unenriched
//! row, plus the last observed source modification time. The whole snapshot
//! is swapped atomically at the end of every successful detection cycle; a
//! failed cycle never leaves a partial merge behind.

use crate::enrich::EnrichedRecord;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// One snapshotted row: the enriched record and its content fingerprint.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub record: EnrichedRecord,
    pub fingerprint: String,
}

/// The full materialized state of a table as of the last successful cycle.
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    pub entries: BTreeMap<String, SnapshotEntry>,
    pub source_modified: Option<DateTime<Utc>>,
}

/// Store owning a table's snapshot. One per monitor; never shared mutably.
pub struct SnapshotStore {
    inner: RwLock<TableSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TableSnapshot::default()),
        }
    }

    /// The current snapshot.
    pub async fn current(&self) -> TableSnapshot {
        self.inner.read().await.clone()
    }

    /// Atomically replace the snapshot. Visible to every subsequent
    /// `current()` call; the old snapshot is discarded wholesale.
    pub async fn replace(
        &self,
        entries: BTreeMap<String, SnapshotEntry>,
        source_modified: Option<DateTime<Utc>>,
    ) {
        let mut inner = self.inner.write().await;
        debug!(
            rows = entries.len(),
            "Snapshot swapped ({} -> {} rows)",
            inner.entries.len(),
            entries.len()
        );
        *inner = TableSnapshot {
            entries,
            source_modified,
        };
    }

    /// Last observed modification time of the source table, if any.
    pub async fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.source_modified
    }

    /// Number of rows in the current snapshot.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::RecordHasher;
    use crate::record::{FieldValue, Record};
    use pretty_assertions::assert_eq;

    fn entry(id: f64) -> (String, SnapshotEntry) {
        let mut rec = Record::new();
        rec.insert("id", FieldValue::Number(id));
        let fingerprint = RecordHasher::fingerprint(&rec);
        (
            rec.key_text("id").unwrap(),
            SnapshotEntry {
                record: EnrichedRecord::bare(rec),
                fingerprint,
            },
        )
    }

    #[tokio::test]
    async fn test_store_starts_empty() {
        let store = SnapshotStore::new();
        assert_eq!(store.len().await, 0);
        assert!(store.last_modified().await.is_none());
    }

    #[tokio::test]
    async fn test_replace_swaps_whole_snapshot() {
        let store = SnapshotStore::new();
        let t1 = Utc::now();

        let first: BTreeMap<_, _> = [entry(1.0), entry(2.0)].into_iter().collect();
        store.replace(first, Some(t1)).await;
        assert_eq!(store.len().await, 2);
        assert_eq!(store.last_modified().await, Some(t1));

        // Old entries are discarded, not merged.
        let second: BTreeMap<_, _> = [entry(3.0)].into_iter().collect();
        store.replace(second, Some(t1)).await;

        let current = store.current().await;
        assert_eq!(current.entries.len(), 1);
        assert!(current.entries.contains_key("3"));
        assert!(!current.entries.contains_key("1"));
    }

    #[tokio::test]
    async fn test_current_is_a_stable_copy() {
        let store = SnapshotStore::new();
        let first: BTreeMap<_, _> = [entry(1.0)].into_iter().collect();
        store.replace(first, None).await;

        let copy = store.current().await;
        store.replace(BTreeMap::new(), None).await;

        // The copy taken before the swap is unaffected.
        assert_eq!(copy.entries.len(), 1);
        assert_eq!(store.len().await, 0);
    }
}
