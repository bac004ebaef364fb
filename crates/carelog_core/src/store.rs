//! Append-only changelog storage and its idempotent insertion gateway.

use crate::entry::ChangeEntry;
use crate::error::{CoreError, CoreResult};
use crate::tick::SyncTick;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Where a batch of entries originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Entries produced by a local committed transaction.
    Local,
    /// Entries applied from a remote sync pull; their tick is overridden
    /// with [`SyncTick::UpdatedElsewhere`] so they are never re-propagated.
    Remote,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Entries in insertion order.
    entries: Vec<ChangeEntry>,
    /// Ids present, for idempotent insertion.
    ids: HashSet<Uuid>,
    /// (table_name, record_id) -> indexes into `entries`.
    by_record: HashMap<(String, String), Vec<usize>>,
}

/// The append-only changelog.
///
/// Storage is immutable per entry: there is no update or delete surface,
/// and re-inserting an existing id is a silent no-op on that id, so the
/// first stored payload wins permanently. The store serves both the capture
/// layer (writes at commit) and the reconciler and sync session (batched
/// reads), and is safe to share across writer threads.
#[derive(Debug, Default)]
pub struct ChangeLogStore {
    inner: RwLock<StoreInner>,
}

impl ChangeLogStore {
    /// Creates an empty changelog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The insertion gateway.
    ///
    /// Validates every candidate up front (one malformed entry rejects the
    /// whole batch with nothing inserted), canonicalizes `record_data` to
    /// canonical JSON text, filters out ids that already exist, overrides
    /// the tick with the sentinel when `origin` is remote, then bulk-appends
    /// the remainder. Empty input returns without touching storage. Safe to
    /// call repeatedly with overlapping batches.
    ///
    /// Returns the number of entries actually inserted.
    pub fn insert(&self, entries: Vec<ChangeEntry>, origin: ChangeOrigin) -> CoreResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut prepared = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.validate()?;
            entry.record_data = canonicalize(&entry.record_data)?;
            if origin == ChangeOrigin::Remote {
                entry.record_sync_tick = SyncTick::UpdatedElsewhere;
            }
            prepared.push(entry);
        }

        let mut inner = self.inner.write();
        let mut inserted = 0;
        for entry in prepared {
            // First payload for an id wins permanently, within and across
            // batches.
            if !inner.ids.insert(entry.id) {
                continue;
            }
            let index = inner.entries.len();
            let key = (entry.table_name.clone(), entry.record_id.clone());
            inner.by_record.entry(key).or_default().push(index);
            inner.entries.push(entry);
            inserted += 1;
        }

        tracing::debug!(inserted, origin = ?origin, "changelog batch inserted");
        Ok(inserted)
    }

    /// Returns the entry with the given id, if present.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<ChangeEntry> {
        let inner = self.inner.read();
        inner.entries.iter().find(|e| e.id == id).cloned()
    }

    /// Returns true if an entry with this id exists.
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.read().ids.contains(&id)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns true if the changelog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Batched window query for the reconciler.
    ///
    /// For each `(table_name, record_id)` key, returns the entries whose
    /// real tick falls in `[min_tick, max_tick]` inclusive (unbounded above
    /// when `max_tick` is `None`) and whose table passes the whitelist.
    /// Sentinel-tagged entries never match. One pass over the index serves
    /// all keys; results are sorted by tick, then `logged_at`, then id.
    #[must_use]
    pub fn entries_for_records(
        &self,
        keys: &[(String, String)],
        min_tick: u64,
        max_tick: Option<u64>,
        table_whitelist: Option<&HashSet<String>>,
    ) -> HashMap<(String, String), Vec<ChangeEntry>> {
        let inner = self.inner.read();
        let mut result = HashMap::with_capacity(keys.len());

        for key in keys {
            if result.contains_key(key) {
                continue;
            }
            let allowed = table_whitelist.is_none_or(|w| w.contains(&key.0));
            let mut matches: Vec<ChangeEntry> = if allowed {
                inner
                    .by_record
                    .get(key)
                    .map(|indexes| {
                        indexes
                            .iter()
                            .map(|&i| &inner.entries[i])
                            .filter(|e| e.record_sync_tick.in_window(min_tick, max_tick))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            } else {
                Vec::new()
            };
            sort_deterministic(&mut matches);
            result.insert(key.clone(), matches);
        }

        result
    }

    /// Entries eligible for a push: real tick strictly greater than
    /// `after_tick`, up to `limit`, in tick order.
    ///
    /// Sentinel-tagged entries carry no real tick and are excluded by
    /// construction, which is what keeps pulled changes from echoing back.
    #[must_use]
    pub fn entries_after_tick(&self, after_tick: u64, limit: usize) -> Vec<ChangeEntry> {
        let inner = self.inner.read();
        let mut matches: Vec<ChangeEntry> = inner
            .entries
            .iter()
            .filter(|e| e.record_sync_tick.real().is_some_and(|t| t > after_tick))
            .cloned()
            .collect();
        sort_deterministic(&mut matches);
        matches.truncate(limit);
        matches
    }

    /// Highest real tick present in the changelog, if any.
    #[must_use]
    pub fn max_real_tick(&self) -> Option<u64> {
        let inner = self.inner.read();
        inner
            .entries
            .iter()
            .filter_map(|e| e.record_sync_tick.real())
            .max()
    }
}

/// Re-serializes a row snapshot into canonical JSON text.
fn canonicalize(data: &str) -> CoreResult<String> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| CoreError::malformed_entry(format!("record_data is not valid JSON: {e}")))?;
    Ok(serde_json::to_string(&value)?)
}

/// Deterministic ordering: tick, then logged_at, then id.
fn sort_deterministic(entries: &mut [ChangeEntry]) {
    entries.sort_by(|a, b| {
        let tick_a = a.record_sync_tick.real();
        let tick_b = b.record_sync_tick.real();
        tick_a
            .cmp(&tick_b)
            .then(a.logged_at.cmp(&b.logged_at))
            .then(a.id.cmp(&b.id))
    });
}
