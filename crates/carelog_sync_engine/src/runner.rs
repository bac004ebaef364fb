//! Background session runner.

use crate::session::SyncSession;
use crate::transport::SyncTransport;
use carelog_sync_protocol::CursorStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Runs sync cycles on a background thread at the session's poll interval.
///
/// Cycle failures are logged and do not stop the runner; the next interval
/// simply tries again from the cursors left by the failed cycle.
pub struct SessionRunner {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SessionRunner {
    /// Spawns the runner thread.
    pub fn spawn<T, C>(session: Arc<SyncSession<T, C>>) -> Self
    where
        T: SyncTransport + 'static,
        C: CursorStore + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                if let Err(e) = session.run_with_retry() {
                    tracing::warn!(error = %e, "background sync cycle failed");
                }
                sleep_interruptible(session.config().poll_interval, &flag);
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Returns true if the runner thread is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the runner and waits for the thread to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Sleeps in short slices so a stop request takes effect promptly.
fn sleep_interruptible(total: Duration, stop: &AtomicBool) {
    let slice = Duration::from_millis(20);
    let mut waited = Duration::ZERO;
    while waited < total && !stop.load(Ordering::SeqCst) {
        let step = slice.min(total - waited);
        std::thread::sleep(step);
        waited += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryConfig, SessionConfig};
    use crate::transport::MockTransport;
    use carelog_core::ChangeLogStore;
    use carelog_sync_protocol::{
        HandshakeResponse, MemoryCursorStore, PullResponse, SessionIdentity, PROTOCOL_VERSION,
    };

    #[test]
    fn runner_completes_cycles_and_survives_failures() {
        let transport = Arc::new(MockTransport::new());
        // One successful cycle; everything after fails on the exhausted
        // queue and must be absorbed by the runner.
        transport.enqueue_handshake(Ok(HandshakeResponse {
            protocol_version: PROTOCOL_VERSION,
            current_tick: 0,
        }));
        transport.enqueue_pull(Ok(PullResponse::empty()));

        let config = SessionConfig::new("central", SessionIdentity::new("device-1", "token"))
            .with_retry(RetryConfig::no_retry())
            .with_poll_interval(Duration::from_millis(5));
        let session = Arc::new(SyncSession::new(
            config,
            Arc::new(ChangeLogStore::new()),
            transport,
            Arc::new(MemoryCursorStore::new()),
        ));

        let runner = SessionRunner::spawn(Arc::clone(&session));
        std::thread::sleep(Duration::from_millis(100));
        assert!(runner.is_running());
        runner.stop();

        let stats = session.stats();
        assert!(stats.cycles_completed >= 1);
        // Later cycles failed but did not kill the runner.
        assert!(stats.last_error.is_some());
    }
}
