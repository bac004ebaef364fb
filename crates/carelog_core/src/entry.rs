//! Change entries: immutable records of committed row mutations.

use crate::error::{CoreError, CoreResult};
use crate::tick::SyncTick;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Millisecond unix timestamp used for row and log times.
pub type TimestampMs = i64;

/// Returns the current time as millisecond unix timestamp.
#[must_use]
pub fn now_millis() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as TimestampMs)
        .unwrap_or(0)
}

/// One committed row mutation in the append-only changelog.
///
/// Entries are immutable: once inserted they are never mutated or
/// overwritten, and an insertion attempt for an existing id is a silent
/// no-op on that id. `record_data` holds the canonical JSON snapshot of the
/// row as it stood at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// Schema of the watched table.
    pub table_schema: String,
    /// Name of the watched table.
    pub table_name: String,
    /// Structural id of the table in the backing store.
    pub table_oid: u32,
    /// Id of the mutated row, as schema-agnostic text.
    pub record_id: String,
    /// Tick of the committing transaction, or the remote-origin sentinel.
    pub record_sync_tick: SyncTick,
    /// False for an insert, true for an update of an existing row.
    pub record_update: bool,
    /// Original row creation timestamp.
    pub record_created_at: TimestampMs,
    /// Original row update timestamp.
    pub record_updated_at: TimestampMs,
    /// When this entry was written to the changelog.
    pub logged_at: TimestampMs,
    /// User responsible for the mutation, if known.
    pub updated_by_user_id: Option<String>,
    /// Canonical JSON snapshot of the row at commit.
    pub record_data: String,
}

impl ChangeEntry {
    /// Creates an entry for a newly inserted row.
    ///
    /// Row timestamps default to the current time; use
    /// [`row_timestamps`](Self::row_timestamps) to carry the original ones.
    pub fn insert(
        table_schema: impl Into<String>,
        table_name: impl Into<String>,
        table_oid: u32,
        record_id: impl Into<String>,
        record_sync_tick: SyncTick,
        record_data: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            table_schema: table_schema.into(),
            table_name: table_name.into(),
            table_oid,
            record_id: record_id.into(),
            record_sync_tick,
            record_update: false,
            record_created_at: now,
            record_updated_at: now,
            logged_at: now,
            updated_by_user_id: None,
            record_data: record_data.into(),
        }
    }

    /// Creates an entry for an update of an existing row.
    pub fn update(
        table_schema: impl Into<String>,
        table_name: impl Into<String>,
        table_oid: u32,
        record_id: impl Into<String>,
        record_sync_tick: SyncTick,
        record_data: impl Into<String>,
    ) -> Self {
        Self {
            record_update: true,
            ..Self::insert(
                table_schema,
                table_name,
                table_oid,
                record_id,
                record_sync_tick,
                record_data,
            )
        }
    }

    /// Sets the original row timestamps.
    #[must_use]
    pub fn row_timestamps(mut self, created_at: TimestampMs, updated_at: TimestampMs) -> Self {
        self.record_created_at = created_at;
        self.record_updated_at = updated_at;
        self
    }

    /// Sets the responsible user.
    #[must_use]
    pub fn updated_by(mut self, user_id: impl Into<String>) -> Self {
        self.updated_by_user_id = Some(user_id.into());
        self
    }

    /// Serializes a row snapshot to the canonical JSON text stored in
    /// `record_data`.
    pub fn snapshot_of<T: Serialize>(row: &T) -> CoreResult<String> {
        Ok(serde_json::to_string(row)?)
    }

    /// Key identifying the row this entry belongs to.
    #[must_use]
    pub fn record_key(&self) -> (&str, &str) {
        (&self.table_name, &self.record_id)
    }

    /// Checks that every required field is present.
    ///
    /// The insertion gateway calls this for each candidate entry before
    /// touching storage; one malformed entry rejects the whole batch.
    pub fn validate(&self) -> CoreResult<()> {
        if self.table_schema.is_empty() {
            return Err(CoreError::malformed_entry("table_schema is empty"));
        }
        if self.table_name.is_empty() {
            return Err(CoreError::malformed_entry("table_name is empty"));
        }
        if self.record_id.is_empty() {
            return Err(CoreError::malformed_entry("record_id is empty"));
        }
        if self.record_data.is_empty() {
            return Err(CoreError::malformed_entry("record_data is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_entry_defaults() {
        let entry = ChangeEntry::insert(
            "public",
            "patients",
            1001,
            "abc",
            SyncTick::Real(5),
            r#"{"name":"Ada"}"#,
        );
        assert!(!entry.record_update);
        assert_eq!(entry.record_key(), ("patients", "abc"));
        assert_eq!(entry.record_sync_tick, SyncTick::Real(5));
        assert!(entry.updated_by_user_id.is_none());
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn update_entry_sets_flag() {
        let entry = ChangeEntry::update(
            "public",
            "patients",
            1001,
            "abc",
            SyncTick::Real(6),
            r#"{"name":"Ada"}"#,
        )
        .updated_by("user-1")
        .row_timestamps(100, 200);

        assert!(entry.record_update);
        assert_eq!(entry.updated_by_user_id.as_deref(), Some("user-1"));
        assert_eq!(entry.record_created_at, 100);
        assert_eq!(entry.record_updated_at, 200);
    }

    #[test]
    fn snapshot_serialization() {
        let text = ChangeEntry::snapshot_of(&json!({"b": 2, "a": 1})).unwrap();
        // serde_json maps sort keys, giving a canonical encoding.
        assert_eq!(text, r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn validation_rejects_missing_fields() {
        let good = ChangeEntry::insert("public", "patients", 1, "r1", SyncTick::Real(1), "{}");

        let mut entry = good.clone();
        entry.record_id = String::new();
        assert!(matches!(
            entry.validate(),
            Err(CoreError::MalformedEntry { .. })
        ));

        let mut entry = good.clone();
        entry.table_name = String::new();
        assert!(entry.validate().is_err());

        let mut entry = good;
        entry.record_data = String::new();
        assert!(entry.validate().is_err());
    }

    #[test]
    fn wire_roundtrip() {
        let entry = ChangeEntry::update(
            "public",
            "encounters",
            1002,
            "enc-9",
            SyncTick::UpdatedElsewhere,
            r#"{"status":"closed"}"#,
        );
        let json = serde_json::to_string(&entry).unwrap();
        let back: ChangeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
