//! Record Fingerprinting
//!
//! Computes a stable content digest for a record, used purely for equality
//! comparison between polling cycles. The digest covers the raw record only;
//! enrichment never participates, so a change in a related table alone can
//! never register as a change on the primary row.

use crate::record::Record;
use sha2::{Digest, Sha256};

/// Computes content fingerprints for records.
pub struct RecordHasher;

impl RecordHasher {
    /// Digest a record's fields in sorted order.
    ///
    /// Deterministic and independent of field insertion order. Stable across
    /// process restarts for identical field content.
    pub fn fingerprint(record: &Record) -> String {
        let mut hasher = Sha256::new();

        for (name, value) in record.iter() {
            hasher.update(format!("{}={};", name, value.canonical()).as_bytes());
        }

        let result = hasher.finalize();
        format!("{:x}", result)
    }
}
