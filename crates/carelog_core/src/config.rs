//! Capture configuration: the fixed registry of watched tables.

use std::collections::HashMap;

/// Descriptor of one table under change capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedTable {
    /// Schema the table lives in.
    pub schema: String,
    /// Table name; matches `ChangeEntry::table_name` and the reconciler's
    /// `record_type`.
    pub name: String,
    /// Structural id of the table in the backing store.
    pub oid: u32,
}

impl WatchedTable {
    /// Creates a table descriptor.
    pub fn new(schema: impl Into<String>, name: impl Into<String>, oid: u32) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            oid,
        }
    }
}

/// Configuration for the capture layer.
///
/// Capture is not a general-purpose CDC facility: only tables registered
/// here produce changelog entries, everything else is ignored silently.
#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    tables: HashMap<String, WatchedTable>,
}

impl CaptureConfig {
    /// Creates an empty configuration (nothing watched).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table for capture.
    #[must_use]
    pub fn watch(mut self, table: WatchedTable) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Looks up a watched table by name.
    #[must_use]
    pub fn watched(&self, table_name: &str) -> Option<&WatchedTable> {
        self.tables.get(table_name)
    }

    /// Returns true if the table is under capture.
    #[must_use]
    pub fn is_watched(&self, table_name: &str) -> bool {
        self.tables.contains_key(table_name)
    }

    /// Number of watched tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_and_lookup() {
        let config = CaptureConfig::new()
            .watch(WatchedTable::new("public", "patients", 1001))
            .watch(WatchedTable::new("public", "encounters", 1002));

        assert_eq!(config.len(), 2);
        assert!(config.is_watched("patients"));
        assert!(!config.is_watched("invoices"));
        assert_eq!(config.watched("encounters").unwrap().oid, 1002);
    }

    #[test]
    fn empty_by_default() {
        let config = CaptureConfig::new();
        assert!(config.is_empty());
        assert!(!config.is_watched("patients"));
    }
}
