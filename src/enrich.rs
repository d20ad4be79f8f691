//! Record Enrichment
//!
//! Augments a primary row with fields pulled from related tables via a join
//! key. Enrichment is best-effort per row: a join that finds no match, or
//! whose lookup fails outright, simply leaves its alias off the enriched
//! record. A related-table outage must never take down a polling cycle.

use crate::record::Record;
use crate::source::RecordSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use validator::Validate;

/// Static join configuration: which related table to consult, how to match,
/// and which remote fields to copy under which alias.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct JoinSpec {
    /// Related table identity.
    #[validate(length(min = 1))]
    pub table: String,
    /// Field on the primary record holding the join value.
    #[validate(length(min = 1))]
    pub local_field: String,
    /// Key field on the related table.
    #[validate(length(min = 1))]
    pub remote_field: String,
    /// Remote fields to copy; fields absent on the match are omitted.
    pub fields: Vec<String>,
    /// Name the sub-record appears under on the enriched record.
    #[validate(length(min = 1))]
    pub alias: String,
}

/// A primary record plus the sub-records its joins produced.
///
/// Serializes flattened, so aliases appear as nested objects next to the
/// row's own fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub fields: Record,
    #[serde(flatten)]
    pub related: BTreeMap<String, Record>,
}

impl EnrichedRecord {
    #[allow(dead_code)]
    pub fn bare(fields: Record) -> Self {
        Self {
            fields,
            related: BTreeMap::new(),
        }
    }
}

/// Applies a set of [`JoinSpec`]s to primary records.
pub struct Enricher;

impl Enricher {
    /// Enrich a single record.
    ///
    /// For each spec: skip when the local join field is absent or null;
    /// otherwise look up at most one related row by exact key equality and
    /// copy the selected fields under the spec's alias. A failed lookup is
    /// treated as "no match" for that spec alone.
    pub async fn enrich<S: RecordSource + ?Sized>(
        source: &S,
        record: Record,
        specs: &[JoinSpec],
    ) -> EnrichedRecord {
        let mut related = BTreeMap::new();

        for spec in specs {
            let local = match record.get(&spec.local_field) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };

            let matched = match source.read_one(&spec.table, &spec.remote_field, local).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(
                        table = %spec.table,
                        alias = %spec.alias,
                        "Join lookup failed, leaving alias off: {}",
                        e
                    );
                    None
                }
            };

            if let Some(row) = matched {
                let subset: Record = spec
                    .fields
                    .iter()
                    .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
                    .collect();
                related.insert(spec.alias.clone(), subset);
            }
        }

        EnrichedRecord {
            fields: record,
            related,
        }
    }
}
