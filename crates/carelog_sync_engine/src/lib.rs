//! # CareLog Sync Engine
//!
//! Pull-then-push sync sessions for CareLog changelogs.
//!
//! This crate provides:
//! - Sync sessions with per-partner cursors
//! - Retry with exponential backoff
//! - A transport abstraction with mock and in-process implementations
//! - A background runner for periodic sessions
//!
//! ## Architecture
//!
//! A session runs **pull-then-push** against one partner:
//! 1. Pull the partner's changes and apply them with remote origin
//! 2. Push local changes the partner has not acknowledged
//!
//! ## Key Invariants
//!
//! - Pull always happens before push
//! - Cursors advance only after the phase confirmed success
//! - Delivery is at-least-once; receivers absorb duplicates idempotently
//! - Remote-origin entries are never pushed back out

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod loopback;
mod runner;
mod session;
mod transport;

pub use config::{RetryConfig, SessionConfig};
pub use error::{SyncError, SyncResult};
pub use loopback::LoopbackCentral;
pub use runner::SessionRunner;
pub use session::{SessionOutcome, SessionState, SessionStats, SyncSession};
pub use transport::{MockTransport, SyncTransport};
