//! # CareLog Sync Protocol
//!
//! Sync protocol types and JSON codecs for CareLog.
//!
//! This crate provides:
//! - Handshake, pull, and push messages
//! - JSON encoding/decoding over byte transports
//! - Per-partner sync cursors and cursor storage
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod error;
mod messages;

pub use cursor::{CursorStore, MemoryCursorStore, SyncCursor};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest, PushResponse,
    SessionIdentity, PROTOCOL_VERSION,
};
