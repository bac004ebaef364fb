//! In-process central node for tests and single-process deployments.

use crate::error::SyncResult;
use crate::transport::SyncTransport;
use carelog_core::{ChangeLogStore, ChangeOrigin, SyncTick, TickAllocator};
use carelog_sync_protocol::{
    HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest, PushResponse,
    PROTOCOL_VERSION,
};
use std::sync::Arc;

/// A central sync node served over an in-process transport.
///
/// The central keeps its own changelog and tick sequence. Pushed batches
/// are re-stamped with one fresh central tick and stored as local-origin
/// entries, so they fan out to every other facility that pulls; the
/// originating facility is protected from its own echo by id-idempotent
/// insertion, not by filtering here.
#[derive(Debug)]
pub struct LoopbackCentral {
    store: Arc<ChangeLogStore>,
    ticks: Arc<TickAllocator>,
}

impl LoopbackCentral {
    /// Creates a central node over the given changelog and tick sequence.
    pub fn new(store: Arc<ChangeLogStore>, ticks: Arc<TickAllocator>) -> Self {
        Self { store, ticks }
    }

    /// The central's changelog.
    #[must_use]
    pub fn store(&self) -> &Arc<ChangeLogStore> {
        &self.store
    }
}

impl SyncTransport for LoopbackCentral {
    fn handshake(&self, request: &HandshakeRequest) -> SyncResult<HandshakeResponse> {
        request.check_version()?;
        tracing::debug!(device_id = %request.identity.device_id, "facility connected");
        Ok(HandshakeResponse {
            protocol_version: PROTOCOL_VERSION,
            current_tick: self.store.max_real_tick().unwrap_or(0),
        })
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        // Over-fetch by one to learn whether another page remains.
        let mut entries = self
            .store
            .entries_after_tick(request.since_tick, request.limit.saturating_add(1));
        let has_more = entries.len() > request.limit;
        entries.truncate(request.limit);

        let max_tick = entries
            .iter()
            .filter_map(|e| e.record_sync_tick.real())
            .max();
        Ok(PullResponse {
            entries,
            max_tick,
            has_more,
        })
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        let acked_tick = request.max_tick();
        let tick = self.ticks.allocate();

        // One central tick per pushed batch; entry ids are preserved so the
        // origin's eventual pull of its own rows is a no-op.
        let restamped = request
            .entries
            .iter()
            .cloned()
            .map(|mut entry| {
                entry.record_sync_tick = tick;
                entry
            })
            .collect();
        let accepted = self.store.insert(restamped, ChangeOrigin::Local)?;

        tracing::debug!(remote_id = %request.remote_id, accepted, "push applied");
        Ok(PushResponse {
            accepted,
            acked_tick,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelog_core::ChangeEntry;
    use carelog_sync_protocol::SessionIdentity;

    fn entry(record: &str, tick: u64) -> ChangeEntry {
        ChangeEntry::insert(
            "public",
            "patients",
            1,
            record,
            SyncTick::Real(tick),
            format!(r#"{{"id":"{record}"}}"#),
        )
    }

    fn central() -> LoopbackCentral {
        LoopbackCentral::new(
            Arc::new(ChangeLogStore::new()),
            Arc::new(TickAllocator::new()),
        )
    }

    #[test]
    fn handshake_reports_current_tick() {
        let central = central();
        let request = HandshakeRequest::new(SessionIdentity::new("facility-a", "token"));
        assert_eq!(central.handshake(&request).unwrap().current_tick, 0);

        central
            .push(&PushRequest {
                remote_id: "facility-a".into(),
                entries: vec![entry("p1", 9)],
            })
            .unwrap();
        assert_eq!(central.handshake(&request).unwrap().current_tick, 1);
    }

    #[test]
    fn push_restamps_batch_with_one_central_tick() {
        let central = central();
        let response = central
            .push(&PushRequest {
                remote_id: "facility-a".into(),
                entries: vec![entry("p1", 40), entry("p2", 41)],
            })
            .unwrap();

        assert_eq!(response.accepted, 2);
        // Acknowledgement covers the sender's ticks, not the central's.
        assert_eq!(response.acked_tick, Some(41));

        let stored = central.store().entries_after_tick(0, 10);
        assert_eq!(stored.len(), 2);
        assert!(stored
            .iter()
            .all(|e| e.record_sync_tick == SyncTick::Real(1)));
    }

    #[test]
    fn duplicate_push_is_absorbed() {
        let central = central();
        let e = entry("p1", 40);
        let request = PushRequest {
            remote_id: "facility-a".into(),
            entries: vec![e],
        };

        assert_eq!(central.push(&request).unwrap().accepted, 1);
        // Redelivery after a lost acknowledgement.
        assert_eq!(central.push(&request).unwrap().accepted, 0);
        assert_eq!(central.store().len(), 1);
    }

    #[test]
    fn pull_pages_with_has_more() {
        let central = central();
        for i in 1..=3 {
            central
                .push(&PushRequest {
                    remote_id: "facility-a".into(),
                    entries: vec![entry(&format!("p{i}"), i)],
                })
                .unwrap();
        }

        let first = central
            .pull(&PullRequest {
                remote_id: "central".into(),
                since_tick: 0,
                limit: 2,
            })
            .unwrap();
        assert_eq!(first.entries.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.max_tick, Some(2));

        let second = central
            .pull(&PullRequest {
                remote_id: "central".into(),
                since_tick: first.max_tick.unwrap(),
                limit: 2,
            })
            .unwrap();
        assert_eq!(second.entries.len(), 1);
        assert!(!second.has_more);
    }

    #[test]
    fn stale_protocol_version_is_rejected() {
        let central = central();
        let request = HandshakeRequest {
            protocol_version: 0,
            identity: SessionIdentity::new("facility-a", "token"),
        };
        assert!(central.handshake(&request).is_err());
    }
}
