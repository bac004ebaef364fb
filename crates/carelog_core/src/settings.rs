//! Process-wide key/value settings surface.
//!
//! The capture layer consults `audit.changes.enabled` on every staging call,
//! so a toggle takes effect for the next staged write. Reads always hit the
//! live map; there is no cached copy to invalidate.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Key of the global audit-capture toggle.
pub const AUDIT_CHANGES_ENABLED: &str = "audit.changes.enabled";

/// Process-wide mutable configuration state.
///
/// Modeled as an explicit store with a getter and setter rather than
/// ambient global access; callers hold it behind an `Arc`.
#[derive(Debug, Default)]
pub struct Settings {
    values: RwLock<HashMap<String, Value>>,
}

impl Settings {
    /// Creates an empty settings store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key to an arbitrary JSON value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Returns the raw value for a key, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Returns a boolean setting, or `default` when unset or non-boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    /// Whether changelog capture is globally enabled.
    ///
    /// Defaults to true when the key has never been set.
    #[must_use]
    pub fn audit_changes_enabled(&self) -> bool {
        self.get_bool(AUDIT_CHANGES_ENABLED, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_enabled_by_default() {
        let settings = Settings::new();
        assert!(settings.audit_changes_enabled());
    }

    #[test]
    fn toggle_is_immediately_visible() {
        let settings = Settings::new();
        settings.set(AUDIT_CHANGES_ENABLED, false);
        assert!(!settings.audit_changes_enabled());

        settings.set(AUDIT_CHANGES_ENABLED, true);
        assert!(settings.audit_changes_enabled());
    }

    #[test]
    fn arbitrary_values() {
        let settings = Settings::new();
        settings.set("sync.pull_batch_size", 500);
        assert_eq!(
            settings.get("sync.pull_batch_size"),
            Some(serde_json::json!(500))
        );
        // Non-boolean values fall back to the default.
        assert!(settings.get_bool("sync.pull_batch_size", true));
    }
}
