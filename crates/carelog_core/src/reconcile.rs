//! Snapshot reconciliation: attaching changelog history to sync snapshots.
//!
//! The sync snapshot phase materializes the rows a session is about to send;
//! the reconciler decorates each of those rows with the changelog entries
//! that fall inside the session's tick window, so the receiving side gets
//! the full mutation history alongside the final row state.

use crate::entry::ChangeEntry;
use crate::store::ChangeLogStore;
use std::collections::HashSet;

/// One row materialized by the snapshot phase of a sync session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Table the row belongs to; matches `ChangeEntry::table_name`.
    pub record_type: String,
    /// Row id as schema-agnostic text.
    pub record_id: String,
}

impl SnapshotRecord {
    /// Creates a snapshot record.
    pub fn new(record_type: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            record_id: record_id.into(),
        }
    }
}

/// A snapshot record decorated with its changelog history.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    /// The snapshot record as given.
    pub record: SnapshotRecord,
    /// Matching changelog entries in deterministic order; empty when the
    /// window holds no history for this row.
    pub changelog_records: Vec<ChangeEntry>,
}

/// Window and filter options for a reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Lower tick bound, inclusive.
    pub min_source_tick: u64,
    /// Upper tick bound, inclusive; unbounded when `None`.
    pub max_source_tick: Option<u64>,
    /// When set, only entries from these tables are attached; rows from
    /// other tables come back with an empty changelog.
    pub table_whitelist: Option<HashSet<String>>,
}

impl ReconcileOptions {
    /// Options with a lower bound only.
    #[must_use]
    pub fn since(min_source_tick: u64) -> Self {
        Self {
            min_source_tick,
            ..Self::default()
        }
    }

    /// Sets the inclusive upper tick bound.
    #[must_use]
    pub fn until(mut self, max_source_tick: u64) -> Self {
        self.max_source_tick = Some(max_source_tick);
        self
    }

    /// Restricts attachment to the given tables.
    #[must_use]
    pub fn tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_whitelist = Some(tables.into_iter().map(Into::into).collect());
        self
    }
}

/// Attaches changelog history to a batch of snapshot records.
///
/// Issues one batched window query for the whole batch rather than one
/// lookup per row. Output is 1:1 with input and preserves input order;
/// a row with no matching history still appears, with an empty changelog.
/// Empty input returns immediately without touching the store.
#[must_use]
pub fn attach_changelog_to_snapshot_records(
    store: &ChangeLogStore,
    records: Vec<SnapshotRecord>,
    options: &ReconcileOptions,
) -> Vec<ReconciledRecord> {
    if records.is_empty() {
        return Vec::new();
    }

    let keys: Vec<(String, String)> = records
        .iter()
        .map(|r| (r.record_type.clone(), r.record_id.clone()))
        .collect();
    let mut grouped = store.entries_for_records(
        &keys,
        options.min_source_tick,
        options.max_source_tick,
        options.table_whitelist.as_ref(),
    );

    records
        .into_iter()
        .zip(keys)
        .map(|(record, key)| ReconciledRecord {
            record,
            // Duplicate keys in the input share one query result; later
            // occurrences get an empty changelog.
            changelog_records: grouped.remove(&key).unwrap_or_default(),
        })
        .collect()
}
