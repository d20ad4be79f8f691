//! Row Diff Engine
//!
//! Compares a freshly read view of the primary table against the previous
//! snapshot and classifies every row as new, modified, deleted, or
//! unchanged. Fingerprints are computed over the unenriched row, so a
//! change in related data alone never produces a delta entry.

use crate::detect::store::SnapshotEntry;
use crate::enrich::EnrichedRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// A row whose content changed between two snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct ModifiedRecord {
    pub key: String,
    pub old: EnrichedRecord,
    pub new: EnrichedRecord,
}

/// Classified differences between two snapshots of one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    pub new: Vec<EnrichedRecord>,
    pub modified: Vec<ModifiedRecord>,
    pub deleted: Vec<EnrichedRecord>,
}

/// Summary counts for a delta.
#[derive(Debug, Clone, Serialize)]
pub struct DeltaSummary {
    pub new_records: usize,
    pub modified_records: usize,
    pub deleted_records: usize,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn summary(&self) -> DeltaSummary {
        DeltaSummary {
            new_records: self.new.len(),
            modified_records: self.modified.len(),
            deleted_records: self.deleted.len(),
        }
    }
}

/// The detector that partitions rows between two snapshots.
pub struct ChangeDetector;

impl ChangeDetector {
    /// Classify `current` against `previous`.
    ///
    /// Returns the delta together with the freshly built snapshot mapping,
    /// ready to be swapped into the store. Rows whose derived primary key is
    /// empty are excluded from both - not new, not deleted, not snapshotted.
    pub fn detect(
        previous: &BTreeMap<String, SnapshotEntry>,
        current: Vec<SnapshotEntry>,
        key_field: &str,
    ) -> (Delta, BTreeMap<String, SnapshotEntry>) {
        let mut snapshot: BTreeMap<String, SnapshotEntry> = BTreeMap::new();
        for entry in current {
            if let Some(key) = entry.record.fields.key_text(key_field) {
                snapshot.insert(key, entry);
            }
        }

        let mut delta = Delta::default();

        for (key, entry) in &snapshot {
            match previous.get(key) {
                None => delta.new.push(entry.record.clone()),
                Some(prior) if prior.fingerprint != entry.fingerprint => {
                    delta.modified.push(ModifiedRecord {
                        key: key.clone(),
                        old: prior.record.clone(),
                        new: entry.record.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        for (key, entry) in previous {
            if !snapshot.contains_key(key) {
                delta.deleted.push(entry.record.clone());
            }
        }

        (delta, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::RecordHasher;
    use crate::record::{FieldValue, Record};
    use pretty_assertions::assert_eq;

    fn row(id: f64, name: &str) -> Record {
        let mut rec = Record::new();
        rec.insert("id", FieldValue::Number(id));
        rec.insert("name", FieldValue::from(name));
        rec
    }

    fn entry(rec: Record) -> SnapshotEntry {
        SnapshotEntry {
            fingerprint: RecordHasher::fingerprint(&rec),
            record: EnrichedRecord::bare(rec),
        }
    }

    #[test]
    fn test_first_run_classifies_everything_as_new() {
        let previous = BTreeMap::new();
        let current = vec![entry(row(1.0, "A")), entry(row(2.0, "B"))];

        let (delta, snapshot) = ChangeDetector::detect(&previous, current, "id");

        assert_eq!(delta.new.len(), 2);
        assert!(delta.modified.is_empty());
        assert!(delta.deleted.is_empty());
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_modified_row_carries_old_and_new() {
        let (_, previous) = ChangeDetector::detect(
            &BTreeMap::new(),
            vec![entry(row(1.0, "A")), entry(row(2.0, "B"))],
            "id",
        );

        let current = vec![entry(row(1.0, "A")), entry(row(2.0, "C"))];
        let (delta, _) = ChangeDetector::detect(&previous, current, "id");

        assert!(delta.new.is_empty());
        assert!(delta.deleted.is_empty());
        assert_eq!(delta.modified.len(), 1);

        let change = &delta.modified[0];
        assert_eq!(change.key, "2");
        assert_eq!(change.old.fields.get("name"), Some(&FieldValue::from("B")));
        assert_eq!(change.new.fields.get("name"), Some(&FieldValue::from("C")));
    }

    #[test]
    fn test_absent_row_classified_as_deleted() {
        let (_, previous) = ChangeDetector::detect(
            &BTreeMap::new(),
            vec![entry(row(1.0, "A")), entry(row(2.0, "B"))],
            "id",
        );

        let current = vec![entry(row(2.0, "B"))];
        let (delta, snapshot) = ChangeDetector::detect(&previous, current, "id");

        assert_eq!(delta.deleted.len(), 1);
        assert_eq!(
            delta.deleted[0].fields.get("name"),
            Some(&FieldValue::from("A"))
        );
        assert!(!snapshot.contains_key("1"));
    }

    #[test]
    fn test_partition_is_complete_and_exclusive() {
        let (_, previous) = ChangeDetector::detect(
            &BTreeMap::new(),
            vec![entry(row(1.0, "A")), entry(row(2.0, "B")), entry(row(3.0, "C"))],
            "id",
        );

        // 1 unchanged, 2 modified, 3 deleted, 4 new.
        let current = vec![entry(row(1.0, "A")), entry(row(2.0, "B2")), entry(row(4.0, "D"))];
        let (delta, snapshot) = ChangeDetector::detect(&previous, current, "id");

        assert_eq!(delta.new.len(), 1);
        assert_eq!(delta.modified.len(), 1);
        assert_eq!(delta.deleted.len(), 1);

        // Every key in previous ∪ current lands in exactly one class.
        let classified = delta.new.len() + delta.modified.len() + delta.deleted.len();
        let unchanged = snapshot
            .keys()
            .filter(|k| previous.contains_key(*k))
            .count()
            - delta.modified.len();
        assert_eq!(classified + unchanged, 4);
    }

    #[test]
    fn test_unchanged_rows_produce_nothing() {
        let rows = vec![entry(row(1.0, "A")), entry(row(2.0, "B"))];
        let (_, previous) = ChangeDetector::detect(&BTreeMap::new(), rows.clone(), "id");
        let (delta, snapshot) = ChangeDetector::detect(&previous, rows, "id");

        assert!(delta.is_empty());
        assert_eq!(snapshot.len(), previous.len());
    }

    #[test]
    fn test_empty_key_rows_are_excluded_everywhere() {
        let mut keyless = Record::new();
        keyless.insert("name", FieldValue::from("ghost"));
        let mut null_key = Record::new();
        null_key.insert("id", FieldValue::Null);
        null_key.insert("name", FieldValue::from("phantom"));

        let current = vec![entry(row(1.0, "A")), entry(keyless), entry(null_key)];
        let (delta, snapshot) = ChangeDetector::detect(&BTreeMap::new(), current, "id");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(delta.new.len(), 1);
        assert!(delta.modified.is_empty());
        assert!(delta.deleted.is_empty());

        // Next cycle without the keyless rows: still nothing reported for them.
        let (delta2, _) = ChangeDetector::detect(&snapshot, vec![entry(row(1.0, "A"))], "id");
        assert!(delta2.is_empty());
    }

    #[test]
    fn test_enrichment_change_alone_is_not_a_modification() {
        let raw = row(1.0, "A");
        let fingerprint = RecordHasher::fingerprint(&raw);

        let mut before = EnrichedRecord::bare(raw.clone());
        let mut customer = Record::new();
        customer.insert("name", FieldValue::from("Acme"));
        before.related.insert("customer".to_string(), customer);

        let mut after = EnrichedRecord::bare(raw);
        let mut renamed = Record::new();
        renamed.insert("name", FieldValue::from("Acme Corp"));
        after.related.insert("customer".to_string(), renamed);

        let (_, previous) = ChangeDetector::detect(
            &BTreeMap::new(),
            vec![SnapshotEntry {
                record: before,
                fingerprint: fingerprint.clone(),
            }],
            "id",
        );
        let (delta, _) = ChangeDetector::detect(
            &previous,
            vec![SnapshotEntry {
                record: after,
                fingerprint,
            }],
            "id",
        );

        assert!(delta.is_empty());
    }

    #[test]
    fn test_delta_summary_counts() {
        let (_, previous) =
            ChangeDetector::detect(&BTreeMap::new(), vec![entry(row(1.0, "A"))], "id");
        let current = vec![entry(row(1.0, "A2")), entry(row(2.0, "B"))];
        let (delta, _) = ChangeDetector::detect(&previous, current, "id");

        let summary = delta.summary();
        assert_eq!(summary.new_records, 1);
        assert_eq!(summary.modified_records, 1);
        assert_eq!(summary.deleted_records, 0);
    }
}
