//! Change Detection Module
//!
//! The heart of tablewatch - working out what changed in a table between
//! two polls. This module provides:
//! - Snapshots (the last materialized view of the primary table)
//! - The change detector (classifying rows as new / modified / deleted)

pub mod diff;
pub mod store;

pub use diff::{ChangeDetector, Delta, DeltaSummary};
#[allow(unused_imports)]
pub use diff::ModifiedRecord;
pub use store::{SnapshotEntry, SnapshotStore};
#[allow(unused_imports)]
pub use store::TableSnapshot;
