//! Change capture: commit-scoped staging of changelog entries.
//!
//! The backing store's deferred trigger semantics are modeled as explicit
//! transaction-lifecycle calls: writes stage candidate entries in a
//! per-transaction buffer, [`CaptureSession::commit`] flushes them through
//! the insertion gateway, and [`CaptureSession::rollback`] discards them:
//! genuinely absent, not merely hidden. Savepoints scope the same guarantee
//! to a nested portion of the transaction.

use crate::config::CaptureConfig;
use crate::entry::{now_millis, ChangeEntry, TimestampMs};
use crate::error::{CoreError, CoreResult};
use crate::pause::AuditPauseController;
use crate::settings::Settings;
use crate::store::{ChangeLogStore, ChangeOrigin};
use crate::tick::{SyncTick, TickAllocator};
use serde::Serialize;
use std::sync::Arc;

/// Kind of row mutation being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A new row.
    Insert,
    /// A mutation of an existing row. Row removals are staged as updates
    /// carrying the caller's final snapshot; no tombstone type exists.
    Update,
}

/// State of a capture transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is open and can stage changes.
    Active,
    /// Transaction committed; staged entries were flushed.
    Committed,
    /// Transaction rolled back; staged entries were discarded.
    RolledBack,
}

/// A candidate entry staged inside a transaction, before a tick exists.
#[derive(Debug, Clone)]
struct StagedChange {
    table_schema: String,
    table_name: String,
    table_oid: u32,
    record_id: String,
    kind: ChangeKind,
    created_at: TimestampMs,
    updated_at: TimestampMs,
    record_data: String,
}

/// A marker for a nested scope within a capture transaction.
///
/// Rolling back to a savepoint discards every change staged after it was
/// taken, leaving earlier staging intact.
#[derive(Debug, Clone, Copy)]
pub struct Savepoint {
    mark: usize,
}

/// The per-transaction side of change capture.
///
/// Holds the staging buffer, the per-transaction audit-pause flag and the
/// responsible user. The buffer is private to the transaction: nothing is
/// visible in the changelog until commit, and nothing survives rollback.
/// The pause flag dies with the transaction and never leaks to siblings.
#[derive(Debug)]
pub struct CaptureTransaction {
    staged: Vec<StagedChange>,
    state: TransactionState,
    audit_paused: bool,
    user_id: Option<String>,
}

impl CaptureTransaction {
    /// Creates a fresh, unsuppressed transaction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            staged: Vec::new(),
            state: TransactionState::Active,
            audit_paused: false,
            user_id: None,
        }
    }

    /// Sets the user responsible for this transaction's writes.
    pub fn set_user(&mut self, user_id: impl Into<String>) {
        self.user_id = Some(user_id.into());
    }

    /// Current transaction state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true while the transaction can still stage changes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of staged candidate entries.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Returns true if this transaction has been audit-paused.
    #[must_use]
    pub fn audit_paused(&self) -> bool {
        self.audit_paused
    }

    pub(crate) fn set_audit_paused(&mut self) {
        self.audit_paused = true;
    }

    /// Takes a savepoint covering everything staged so far.
    #[must_use]
    pub fn savepoint(&self) -> Savepoint {
        Savepoint {
            mark: self.staged.len(),
        }
    }

    /// Discards every change staged after the savepoint was taken.
    pub fn rollback_to(&mut self, savepoint: Savepoint) -> CoreResult<()> {
        self.ensure_active()?;
        if savepoint.mark > self.staged.len() {
            return Err(CoreError::invalid_operation(
                "savepoint does not belong to this transaction state",
            ));
        }
        self.staged.truncate(savepoint.mark);
        Ok(())
    }

    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::RolledBack => Err(CoreError::invalid_operation(
                "transaction already rolled back",
            )),
        }
    }
}

impl Default for CaptureTransaction {
    fn default() -> Self {
        Self::new()
    }
}

/// The change-capture layer.
///
/// One session per node, shared across writer transactions. Staging checks
/// the watched-table registry and the pause state; commit allocates one
/// tick for the whole transaction and flushes through the insertion
/// gateway. If capture cannot proceed at commit, the commit fails: a write
/// and its audit trail are one atomic unit.
#[derive(Debug)]
pub struct CaptureSession {
    store: Arc<ChangeLogStore>,
    ticks: Arc<TickAllocator>,
    pause: AuditPauseController,
    config: CaptureConfig,
}

impl CaptureSession {
    /// Creates a capture session over the shared store, clock and settings.
    #[must_use]
    pub fn new(
        store: Arc<ChangeLogStore>,
        ticks: Arc<TickAllocator>,
        settings: Arc<Settings>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            store,
            ticks,
            pause: AuditPauseController::new(settings),
            config,
        }
    }

    /// The pause controller bound to this session's settings.
    #[must_use]
    pub fn pause_controller(&self) -> &AuditPauseController {
        &self.pause
    }

    /// Begins a capture transaction.
    #[must_use]
    pub fn begin(&self) -> CaptureTransaction {
        CaptureTransaction::new()
    }

    /// Stages one candidate entry for a modified row.
    ///
    /// Returns `Ok(true)` when staged, `Ok(false)` when suppressed (table
    /// not watched, transaction paused, or capture globally disabled).
    /// Serialization failure is an error: the caller's write must fail
    /// rather than silently lose its audit trail.
    ///
    /// Row timestamps default to the staging time; callers mutating a
    /// pre-existing row use [`stage_with_timestamps`](Self::stage_with_timestamps)
    /// to carry the row's original creation and update times.
    pub fn stage<T: Serialize>(
        &self,
        txn: &mut CaptureTransaction,
        table_name: &str,
        record_id: &str,
        kind: ChangeKind,
        row: &T,
    ) -> CoreResult<bool> {
        let now = now_millis();
        self.stage_with_timestamps(txn, table_name, record_id, kind, row, now, now)
    }

    /// Stages one candidate entry carrying the row's original timestamps.
    ///
    /// `created_at` and `updated_at` are the row's own timestamps as held
    /// by the storage layer, not the time of this staging call; they travel
    /// on the committed entry as `record_created_at`/`record_updated_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn stage_with_timestamps<T: Serialize>(
        &self,
        txn: &mut CaptureTransaction,
        table_name: &str,
        record_id: &str,
        kind: ChangeKind,
        row: &T,
        created_at: TimestampMs,
        updated_at: TimestampMs,
    ) -> CoreResult<bool> {
        txn.ensure_active()?;

        let Some(table) = self.config.watched(table_name) else {
            return Ok(false);
        };
        if self.pause.is_suppressed(txn) {
            return Ok(false);
        }

        let record_data = ChangeEntry::snapshot_of(row)?;
        txn.staged.push(StagedChange {
            table_schema: table.schema.clone(),
            table_name: table.name.clone(),
            table_oid: table.oid,
            record_id: record_id.to_string(),
            kind,
            created_at,
            updated_at,
            record_data,
        });
        Ok(true)
    }

    /// Stages a new-row entry. See [`stage`](Self::stage).
    pub fn stage_insert<T: Serialize>(
        &self,
        txn: &mut CaptureTransaction,
        table_name: &str,
        record_id: &str,
        row: &T,
    ) -> CoreResult<bool> {
        self.stage(txn, table_name, record_id, ChangeKind::Insert, row)
    }

    /// Stages an updated-row entry. See [`stage`](Self::stage).
    pub fn stage_update<T: Serialize>(
        &self,
        txn: &mut CaptureTransaction,
        table_name: &str,
        record_id: &str,
        row: &T,
    ) -> CoreResult<bool> {
        self.stage(txn, table_name, record_id, ChangeKind::Update, row)
    }

    /// Commits the transaction, flushing staged entries to the changelog.
    ///
    /// A change-producing transaction receives exactly one tick from the
    /// global sequence; every entry it staged shares it. Multiple stagings
    /// of the same row collapse to one entry: the latest snapshot wins, the
    /// insert/update flag comes from the first staging. Returns the
    /// allocated tick, or `None` when nothing was staged.
    pub fn commit(&self, txn: &mut CaptureTransaction) -> CoreResult<Option<SyncTick>> {
        txn.ensure_active()?;

        if txn.staged.is_empty() {
            txn.state = TransactionState::Committed;
            return Ok(None);
        }

        let tick = self.ticks.allocate();
        let entries = collapse_per_row(&txn.staged, tick, txn.user_id.as_deref());
        self.store.insert(entries, ChangeOrigin::Local)?;

        txn.staged.clear();
        txn.state = TransactionState::Committed;
        tracing::debug!(tick = %tick, "capture transaction committed");
        Ok(Some(tick))
    }

    /// Rolls the transaction back, discarding everything it staged,
    /// including entries staged before a later failure.
    pub fn rollback(&self, txn: &mut CaptureTransaction) -> CoreResult<()> {
        txn.ensure_active()?;
        txn.staged.clear();
        txn.state = TransactionState::RolledBack;
        Ok(())
    }
}

/// Collapses staged changes to exactly one entry per modified row.
fn collapse_per_row(
    staged: &[StagedChange],
    tick: SyncTick,
    user_id: Option<&str>,
) -> Vec<ChangeEntry> {
    use std::collections::HashMap;

    // (table, record) -> index into `rows`, preserving first-staged order.
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut rows: Vec<(&StagedChange, &StagedChange)> = Vec::new();

    for change in staged {
        let key = (change.table_name.as_str(), change.record_id.as_str());
        match index.get(&key) {
            Some(&i) => rows[i].1 = change,
            None => {
                index.insert(key, rows.len());
                rows.push((change, change));
            }
        }
    }

    let logged_at = now_millis();
    rows.into_iter()
        .map(|(first, last)| ChangeEntry {
            id: uuid::Uuid::new_v4(),
            table_schema: last.table_schema.clone(),
            table_name: last.table_name.clone(),
            table_oid: last.table_oid,
            record_id: last.record_id.clone(),
            record_sync_tick: tick,
            record_update: first.kind == ChangeKind::Update,
            record_created_at: first.created_at,
            record_updated_at: last.updated_at,
            logged_at,
            updated_by_user_id: user_id.map(str::to_string),
            record_data: last.record_data.clone(),
        })
        .collect()
}
