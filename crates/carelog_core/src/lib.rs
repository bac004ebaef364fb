//! # CareLog Core
//!
//! Change-capture core for the CareLog clinical data platform.
//!
//! This crate provides:
//! - Append-only changelog storage with an idempotent insertion gateway
//! - Commit-scoped change capture with savepoints and audit pause
//! - A strictly monotonic tick allocator for transaction ordering
//! - Snapshot reconciliation for attaching history to sync batches
//!
//! ## Key Invariants
//!
//! - Changelog entries are immutable; re-inserting an id is a no-op
//! - One tick per committed change-producing transaction
//! - Remote-origin entries carry the `updated_elsewhere` sentinel and are
//!   never re-propagated
//! - Capture writes and the committing transaction succeed or fail together

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod capture;
mod config;
mod entry;
mod error;
mod pause;
mod reconcile;
mod settings;
mod store;
mod tick;

pub use capture::{CaptureSession, CaptureTransaction, ChangeKind, Savepoint, TransactionState};
pub use config::{CaptureConfig, WatchedTable};
pub use entry::{now_millis, ChangeEntry, TimestampMs};
pub use error::{CoreError, CoreResult};
pub use pause::AuditPauseController;
pub use reconcile::{
    attach_changelog_to_snapshot_records, ReconcileOptions, ReconciledRecord, SnapshotRecord,
};
pub use settings::{Settings, AUDIT_CHANGES_ENABLED};
pub use store::{ChangeLogStore, ChangeOrigin};
pub use tick::{ParseTickError, SyncTick, TickAllocator};
