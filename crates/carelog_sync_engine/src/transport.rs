//! Transport abstraction for sync sessions.

use crate::error::{SyncError, SyncResult};
use carelog_sync_protocol::{
    HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest, PushResponse,
};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A sync transport carries protocol messages to one partner.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process loopback, mock for testing).
pub trait SyncTransport: Send + Sync {
    /// Opens a session with the partner.
    fn handshake(&self, request: &HandshakeRequest) -> SyncResult<HandshakeResponse>;

    /// Pulls changelog entries from the partner.
    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;

    /// Pushes changelog entries to the partner.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;
}

/// A scripted transport for testing.
///
/// Responses are queued per operation and consumed in order, so a test can
/// script a multi-batch pull (`has_more` pages) or a failure followed by a
/// success. An exhausted queue fails the call.
#[derive(Debug, Default)]
pub struct MockTransport {
    handshake_responses: Mutex<VecDeque<SyncResult<HandshakeResponse>>>,
    pull_responses: Mutex<VecDeque<SyncResult<PullResponse>>>,
    push_responses: Mutex<VecDeque<SyncResult<PushResponse>>>,
    pull_requests: Mutex<Vec<PullRequest>>,
    push_requests: Mutex<Vec<PushRequest>>,
}

impl MockTransport {
    /// Creates a transport with empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a handshake outcome.
    pub fn enqueue_handshake(&self, response: SyncResult<HandshakeResponse>) {
        self.handshake_responses.lock().push_back(response);
    }

    /// Queues a pull outcome.
    pub fn enqueue_pull(&self, response: SyncResult<PullResponse>) {
        self.pull_responses.lock().push_back(response);
    }

    /// Queues a push outcome.
    pub fn enqueue_push(&self, response: SyncResult<PushResponse>) {
        self.push_responses.lock().push_back(response);
    }

    /// Pull requests seen so far.
    #[must_use]
    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.pull_requests.lock().clone()
    }

    /// Push requests seen so far.
    #[must_use]
    pub fn push_requests(&self) -> Vec<PushRequest> {
        self.push_requests.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn handshake(&self, _request: &HandshakeRequest) -> SyncResult<HandshakeResponse> {
        self.handshake_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport_fatal("no scripted handshake response")))
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pull_requests.lock().push(request.clone());
        self.pull_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport_fatal("no scripted pull response")))
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.push_requests.lock().push(request.clone());
        self.push_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport_fatal("no scripted push response")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelog_sync_protocol::SessionIdentity;

    #[test]
    fn responses_are_consumed_in_order() {
        let transport = MockTransport::new();
        transport.enqueue_pull(Ok(PullResponse {
            entries: Vec::new(),
            max_tick: Some(1),
            has_more: true,
        }));
        transport.enqueue_pull(Ok(PullResponse::empty()));

        let request = PullRequest {
            remote_id: "central".into(),
            since_tick: 0,
            limit: 10,
        };
        assert!(transport.pull(&request).unwrap().has_more);
        assert!(!transport.pull(&request).unwrap().has_more);
        assert!(transport.pull(&request).is_err());
        assert_eq!(transport.pull_requests().len(), 3);
    }

    #[test]
    fn exhausted_handshake_queue_fails() {
        let transport = MockTransport::new();
        let request = HandshakeRequest::new(SessionIdentity::new("d", "t"));
        assert!(matches!(
            transport.handshake(&request),
            Err(SyncError::Transport {
                retryable: false,
                ..
            })
        ));
    }
}
