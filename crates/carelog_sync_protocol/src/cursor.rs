//! Per-partner sync cursors.

use crate::error::ProtocolResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Durable progress markers for one sync partner.
///
/// Cursors only ever move forward, and only after the corresponding phase
/// confirmed success: `last_pulled_tick` after pulled entries were applied
/// locally, `last_pushed_tick` after the partner acknowledged a push. A
/// failed or interrupted session leaves both untouched, so the next session
/// re-transfers the same window and relies on receiver idempotence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Partner these marks belong to.
    pub remote_id: String,
    /// Highest partner tick whose entries are applied locally.
    pub last_pulled_tick: u64,
    /// Highest local tick the partner has acknowledged.
    pub last_pushed_tick: u64,
}

impl SyncCursor {
    /// A fresh cursor that has pulled and pushed nothing.
    #[must_use]
    pub fn new(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            last_pulled_tick: 0,
            last_pushed_tick: 0,
        }
    }

    /// Advances the pull mark; ignores regressions.
    pub fn advance_pulled(&mut self, tick: u64) {
        self.last_pulled_tick = self.last_pulled_tick.max(tick);
    }

    /// Advances the push mark; ignores regressions.
    pub fn advance_pushed(&mut self, tick: u64) {
        self.last_pushed_tick = self.last_pushed_tick.max(tick);
    }
}

/// Storage for per-partner cursors.
pub trait CursorStore: Send + Sync {
    /// Loads the cursor for a partner, or a fresh one if none is stored.
    fn load(&self, remote_id: &str) -> ProtocolResult<SyncCursor>;

    /// Persists a cursor.
    fn save(&self, cursor: &SyncCursor) -> ProtocolResult<()>;
}

/// In-memory cursor store.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: RwLock<HashMap<String, SyncCursor>>,
}

impl MemoryCursorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self, remote_id: &str) -> ProtocolResult<SyncCursor> {
        Ok(self
            .cursors
            .read()
            .get(remote_id)
            .cloned()
            .unwrap_or_else(|| SyncCursor::new(remote_id)))
    }

    fn save(&self, cursor: &SyncCursor) -> ProtocolResult<()> {
        self.cursors
            .write()
            .insert(cursor.remote_id.clone(), cursor.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cursor_for_unknown_partner() {
        let store = MemoryCursorStore::new();
        let cursor = store.load("central").unwrap();
        assert_eq!(cursor.last_pulled_tick, 0);
        assert_eq!(cursor.last_pushed_tick, 0);
    }

    #[test]
    fn save_and_reload() {
        let store = MemoryCursorStore::new();
        let mut cursor = store.load("central").unwrap();
        cursor.advance_pulled(120);
        cursor.advance_pushed(80);
        store.save(&cursor).unwrap();

        let reloaded = store.load("central").unwrap();
        assert_eq!(reloaded, cursor);
        // Per-partner isolation.
        assert_eq!(store.load("other").unwrap().last_pulled_tick, 0);
    }

    #[test]
    fn cursors_never_regress() {
        let mut cursor = SyncCursor::new("central");
        cursor.advance_pulled(100);
        cursor.advance_pulled(50);
        assert_eq!(cursor.last_pulled_tick, 100);

        cursor.advance_pushed(10);
        cursor.advance_pushed(5);
        assert_eq!(cursor.last_pushed_tick, 10);
    }

    proptest::proptest! {
        #[test]
        fn advance_is_monotonic(ticks in proptest::collection::vec(0u64..10_000, 0..32)) {
            let mut cursor = SyncCursor::new("central");
            let mut high = 0;
            for tick in ticks {
                cursor.advance_pulled(tick);
                high = high.max(tick);
                proptest::prop_assert_eq!(cursor.last_pulled_tick, high);
            }
        }
    }
}
