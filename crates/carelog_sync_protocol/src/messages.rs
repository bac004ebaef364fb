//! Protocol messages for changelog sync.
//!
//! Messages are plain serde structs carried as JSON; encoding is delegated
//! to `encode`/`decode` on each message so transports only ever see bytes.

use crate::error::{ProtocolError, ProtocolResult};
use carelog_core::ChangeEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Protocol version this crate speaks.
pub const PROTOCOL_VERSION: u16 = 1;

fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

fn decode_message<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Identity a device presents when opening a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Stable device identifier.
    pub device_id: String,
    /// Opaque bearer token for the central node.
    pub token: String,
}

impl SessionIdentity {
    /// Creates a session identity.
    pub fn new(device_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            token: token.into(),
        }
    }
}

/// Opening message of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Protocol version the client speaks.
    pub protocol_version: u16,
    /// Who is connecting.
    pub identity: SessionIdentity,
}

impl HandshakeRequest {
    /// Creates a handshake at the current protocol version.
    #[must_use]
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            identity,
        }
    }

    /// Encodes to wire bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode_message(self)
    }

    /// Decodes from wire bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode_message(bytes)
    }

    /// Rejects handshakes from peers at a different protocol version.
    pub fn check_version(&self) -> ProtocolResult<()> {
        if self.protocol_version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                got: self.protocol_version,
                expected: PROTOCOL_VERSION,
            });
        }
        Ok(())
    }
}

/// Server's answer to a handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Protocol version the server speaks.
    pub protocol_version: u16,
    /// Highest real tick present on the server.
    pub current_tick: u64,
}

impl HandshakeResponse {
    /// Encodes to wire bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode_message(self)
    }

    /// Decodes from wire bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode_message(bytes)
    }
}

/// Request for changelog entries the client has not seen yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Partner the cursor belongs to.
    pub remote_id: String,
    /// Return entries with real tick strictly greater than this.
    pub since_tick: u64,
    /// Maximum entries per response.
    pub limit: usize,
}

impl PullRequest {
    /// Encodes to wire bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode_message(self)
    }

    /// Decodes from wire bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode_message(bytes)
    }
}

/// Batch of changelog entries answering a pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Entries in tick order.
    pub entries: Vec<ChangeEntry>,
    /// Highest real tick in this batch; the client's next cursor position.
    /// `None` when the batch is empty.
    pub max_tick: Option<u64>,
    /// True when more entries remain beyond this batch.
    pub has_more: bool,
}

impl PullResponse {
    /// An empty response with nothing further to pull.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            max_tick: None,
            has_more: false,
        }
    }

    /// Encodes to wire bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode_message(self)
    }

    /// Decodes from wire bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode_message(bytes)
    }
}

/// Batch of local changelog entries offered to the central node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Partner the cursor belongs to.
    pub remote_id: String,
    /// Entries in tick order; every tick is real on the sending side.
    pub entries: Vec<ChangeEntry>,
}

impl PushRequest {
    /// Highest real tick among the offered entries.
    #[must_use]
    pub fn max_tick(&self) -> Option<u64> {
        self.entries
            .iter()
            .filter_map(|e| e.record_sync_tick.real())
            .max()
    }

    /// Encodes to wire bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode_message(self)
    }

    /// Decodes from wire bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode_message(bytes)
    }
}

/// Acknowledgement of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Entries the server actually stored (duplicates excluded).
    pub accepted: usize,
    /// Highest sender-side tick covered by this acknowledgement; the
    /// sender's next push cursor position. `None` for an empty push.
    pub acked_tick: Option<u64>,
}

impl PushResponse {
    /// Encodes to wire bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode_message(self)
    }

    /// Decodes from wire bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode_message(bytes)
    }
}
