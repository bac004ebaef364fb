//! Pull-then-push sync sessions.

use crate::config::SessionConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use carelog_core::{ChangeLogStore, ChangeOrigin};
use carelog_sync_protocol::{CursorStore, HandshakeRequest, PullRequest, PushRequest};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The current state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session running.
    Idle,
    /// Opening the connection.
    Connecting,
    /// Applying remote changes.
    Pulling,
    /// Sending local changes.
    Pushing,
    /// Last cycle completed successfully.
    Synced,
    /// Last cycle failed.
    Error,
    /// Waiting before a retry attempt.
    RetryWait,
}

/// Statistics across the lifetime of a session handle.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Completed sync cycles.
    pub cycles_completed: u64,
    /// Entries received across all pulls.
    pub entries_pulled: u64,
    /// Entries acknowledged across all pushes.
    pub entries_pushed: u64,
    /// Retry attempts made.
    pub retries: u64,
    /// Message of the last failure, cleared on success.
    pub last_error: Option<String>,
}

/// Result of one completed sync cycle.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Entries received and applied during the pull phase.
    pub pulled: u64,
    /// Entries acknowledged during the push phase.
    pub pushed: u64,
    /// Duration of the cycle.
    pub duration: Duration,
}

/// A sync session against one partner.
///
/// Each cycle pulls first and pushes second, so incoming changes land
/// before local ones are offered. Cursors move only after the
/// corresponding phase confirmed success; any failure aborts the cycle,
/// leaves the unconfirmed cursor where it was, and the next cycle
/// re-transfers the same window. Delivery is therefore at-least-once,
/// with the receiving side's idempotent insertion absorbing duplicates.
///
/// At most one cycle per session handle runs at a time; a second caller
/// gets [`SyncError::SessionActive`] instead of interleaved phases.
/// Construct exactly one handle per partner and share it (it is `Sync`):
/// the guard lives on the handle, so two handles for the same partner over
/// a shared cursor store would race cursor advancement. Sessions against
/// different partners are independent and may run concurrently.
pub struct SyncSession<T: SyncTransport, C: CursorStore> {
    config: SessionConfig,
    store: Arc<ChangeLogStore>,
    transport: Arc<T>,
    cursors: Arc<C>,
    state: RwLock<SessionState>,
    stats: RwLock<SessionStats>,
    cancelled: AtomicBool,
    running: Mutex<()>,
}

impl<T: SyncTransport, C: CursorStore> SyncSession<T, C> {
    /// Creates a session over the given changelog, transport, and cursors.
    pub fn new(
        config: SessionConfig,
        store: Arc<ChangeLogStore>,
        transport: Arc<T>,
        cursors: Arc<C>,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            cursors,
            state: RwLock::new(SessionState::Idle),
            stats: RwLock::new(SessionStats::default()),
            cancelled: AtomicBool::new(false),
            running: Mutex::new(()),
        }
    }

    /// The session's configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Snapshot of the lifetime statistics.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    /// Requests cancellation of the cycle in flight.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    /// Runs one pull-then-push cycle.
    pub fn run_once(&self) -> SyncResult<SessionOutcome> {
        let _guard = self
            .running
            .try_lock()
            .ok_or_else(|| SyncError::SessionActive {
                remote_id: self.config.remote_id.clone(),
            })?;
        self.cancelled.store(false, Ordering::SeqCst);
        let start = Instant::now();

        let result = self.run_cycle();
        match &result {
            Ok((pulled, pushed)) => {
                self.set_state(SessionState::Synced);
                let mut stats = self.stats.write();
                stats.cycles_completed += 1;
                stats.entries_pulled += pulled;
                stats.entries_pushed += pushed;
                stats.last_error = None;
                tracing::info!(
                    remote_id = %self.config.remote_id,
                    pulled,
                    pushed,
                    "sync cycle complete"
                );
            }
            Err(e) => {
                self.set_state(SessionState::Error);
                self.stats.write().last_error = Some(e.to_string());
                tracing::warn!(remote_id = %self.config.remote_id, error = %e, "sync cycle failed");
            }
        }

        result.map(|(pulled, pushed)| SessionOutcome {
            pulled,
            pushed,
            duration: start.elapsed(),
        })
    }

    /// Runs one cycle, retrying transient failures with backoff.
    pub fn run_with_retry(&self) -> SyncResult<SessionOutcome> {
        let retry = self.config.retry.clone();
        let mut last_error = None;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                self.set_state(SessionState::RetryWait);
                std::thread::sleep(retry.delay_for_attempt(attempt));
                self.stats.write().retries += 1;
            }

            match self.run_once() {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    if e.is_retryable() && attempt + 1 < retry.max_attempts {
                        tracing::debug!(attempt, error = %e, "retrying after transient failure");
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SyncError::transport_fatal("no sync attempts made")))
    }

    fn run_cycle(&self) -> SyncResult<(u64, u64)> {
        self.set_state(SessionState::Connecting);
        self.handshake()?;
        self.check_cancelled()?;

        self.set_state(SessionState::Pulling);
        let pulled = self.pull_all()?;
        self.check_cancelled()?;

        self.set_state(SessionState::Pushing);
        let pushed = self.push_all()?;

        Ok((pulled, pushed))
    }

    fn handshake(&self) -> SyncResult<()> {
        let request = HandshakeRequest::new(self.config.identity.clone());
        let response = self.transport.handshake(&request)?;
        tracing::debug!(
            remote_id = %self.config.remote_id,
            remote_tick = response.current_tick,
            "handshake complete"
        );
        Ok(())
    }

    /// Pulls until the partner reports nothing further.
    ///
    /// Each batch is applied with remote origin, so every entry lands with
    /// the `updated_elsewhere` sentinel; the pull cursor advances after the
    /// batch is applied, one save per batch.
    fn pull_all(&self) -> SyncResult<u64> {
        let mut total = 0u64;

        loop {
            self.check_cancelled()?;

            let mut cursor = self.cursors.load(&self.config.remote_id)?;
            let request = PullRequest {
                remote_id: self.config.remote_id.clone(),
                since_tick: cursor.last_pulled_tick,
                limit: self.config.pull_batch_size,
            };
            let response = self.transport.pull(&request)?;

            if !response.entries.is_empty() {
                total += response.entries.len() as u64;
                self.store.insert(response.entries, ChangeOrigin::Remote)?;
            }
            if let Some(max_tick) = response.max_tick {
                cursor.advance_pulled(max_tick);
                self.cursors.save(&cursor)?;
            }

            if !response.has_more {
                break;
            }
        }

        Ok(total)
    }

    /// Pushes local entries in batches until none remain past the cursor.
    ///
    /// Sentinel-tagged entries carry no real tick and are never selected,
    /// which keeps pulled changes from echoing back to their origin. The
    /// push cursor advances only to the tick the partner acknowledged.
    fn push_all(&self) -> SyncResult<u64> {
        let mut total = 0u64;

        loop {
            self.check_cancelled()?;

            let mut cursor = self.cursors.load(&self.config.remote_id)?;
            let batch = self
                .store
                .entries_after_tick(cursor.last_pushed_tick, self.config.push_batch_size);
            if batch.is_empty() {
                break;
            }

            let request = PushRequest {
                remote_id: self.config.remote_id.clone(),
                entries: batch,
            };
            let response = self.transport.push(&request)?;

            let acked = response.acked_tick.ok_or_else(|| {
                SyncError::ServerError("push not acknowledged".to_string())
            })?;
            total += response.accepted as u64;
            cursor.advance_pushed(acked);
            self.cursors.save(&cursor)?;
        }

        Ok(total)
    }
}
