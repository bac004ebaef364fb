//! Audit pause: per-transaction and process-wide capture suppression.

use crate::capture::CaptureTransaction;
use crate::settings::Settings;
use std::sync::Arc;

/// Controls suppression of changelog capture.
///
/// Two mechanisms compose via OR: the process-wide
/// `audit.changes.enabled` setting (false suppresses every transaction) and
/// a per-transaction pause flag that marks one transaction as
/// capture-suppressed for its remaining lifetime. Pausing one transaction
/// does not affect sibling, parallel, or subsequent transactions; the flag
/// is discarded with the transaction.
#[derive(Debug, Clone)]
pub struct AuditPauseController {
    settings: Arc<Settings>,
}

impl AuditPauseController {
    /// Creates a controller over the shared settings store.
    #[must_use]
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Marks this transaction as capture-suppressed for the rest of its
    /// lifetime.
    pub fn pause(&self, txn: &mut CaptureTransaction) {
        txn.set_audit_paused();
    }

    /// Returns true if capture is suppressed for this transaction, either
    /// by its own pause flag or by the global setting.
    #[must_use]
    pub fn is_suppressed(&self, txn: &CaptureTransaction) -> bool {
        txn.audit_paused() || !self.settings.audit_changes_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureTransaction;
    use crate::settings::AUDIT_CHANGES_ENABLED;

    #[test]
    fn neither_active_means_capture() {
        let controller = AuditPauseController::new(Arc::new(Settings::new()));
        let txn = CaptureTransaction::new();
        assert!(!controller.is_suppressed(&txn));
    }

    #[test]
    fn per_transaction_pause_suppresses_only_that_transaction() {
        let controller = AuditPauseController::new(Arc::new(Settings::new()));
        let mut paused = CaptureTransaction::new();
        let sibling = CaptureTransaction::new();

        controller.pause(&mut paused);

        assert!(controller.is_suppressed(&paused));
        assert!(!controller.is_suppressed(&sibling));

        // A subsequent transaction starts unsuppressed.
        let next = CaptureTransaction::new();
        assert!(!controller.is_suppressed(&next));
    }

    #[test]
    fn global_disable_suppresses_everything() {
        let settings = Arc::new(Settings::new());
        let controller = AuditPauseController::new(Arc::clone(&settings));
        let txn = CaptureTransaction::new();

        settings.set(AUDIT_CHANGES_ENABLED, false);
        assert!(controller.is_suppressed(&txn));

        settings.set(AUDIT_CHANGES_ENABLED, true);
        assert!(!controller.is_suppressed(&txn));
    }
}
