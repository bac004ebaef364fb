//! Sync ticks: the global logical clock ordering all captured changes.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Wire spelling of the sentinel tick.
const UPDATED_ELSEWHERE_TEXT: &str = "updated_elsewhere";

/// A logical clock value attached to every change entry.
///
/// Real ticks come from a single global strictly-increasing sequence (never
/// per-table), so concurrent commits are still totally ordered. The
/// `UpdatedElsewhere` sentinel tags entries that were applied from a remote
/// sync pull; it is a distinct tagged value rather than a reserved number,
/// so it can never collide with a genuine tick. Push selection works on real
/// ticks only, which is what keeps remotely-originated entries from echoing
/// back out.
///
/// Encoded on the wire as a decimal string for real ticks and the literal
/// `"updated_elsewhere"` for the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTick {
    /// A genuine tick from the global sequence.
    Real(u64),
    /// This entry originated from a remote node; do not re-propagate.
    UpdatedElsewhere,
}

impl SyncTick {
    /// Returns the real tick value, or `None` for the sentinel.
    #[must_use]
    pub const fn real(self) -> Option<u64> {
        match self {
            SyncTick::Real(tick) => Some(tick),
            SyncTick::UpdatedElsewhere => None,
        }
    }

    /// Returns true if this is the remote-origin sentinel.
    #[must_use]
    pub const fn is_updated_elsewhere(self) -> bool {
        matches!(self, SyncTick::UpdatedElsewhere)
    }

    /// Returns true if this real tick falls in `[min, max]` inclusive.
    ///
    /// The sentinel never falls inside a real tick window.
    #[must_use]
    pub fn in_window(self, min: u64, max: Option<u64>) -> bool {
        match self.real() {
            Some(tick) => tick >= min && max.is_none_or(|m| tick <= m),
            None => false,
        }
    }
}

impl fmt::Display for SyncTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTick::Real(tick) => write!(f, "{tick}"),
            SyncTick::UpdatedElsewhere => f.write_str(UPDATED_ELSEWHERE_TEXT),
        }
    }
}

/// Error returned when parsing a tick from its wire encoding fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTickError(String);

impl fmt::Display for ParseTickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid sync tick: {:?}", self.0)
    }
}

impl std::error::Error for ParseTickError {}

impl FromStr for SyncTick {
    type Err = ParseTickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == UPDATED_ELSEWHERE_TEXT {
            return Ok(SyncTick::UpdatedElsewhere);
        }
        s.parse::<u64>()
            .map(SyncTick::Real)
            .map_err(|_| ParseTickError(s.to_string()))
    }
}

impl Serialize for SyncTick {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SyncTick {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TickVisitor;

        impl Visitor<'_> for TickVisitor {
            type Value = SyncTick;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal tick string or \"updated_elsewhere\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<SyncTick, E> {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(TickVisitor)
    }
}

/// Issues ticks from one global strictly-increasing sequence.
///
/// Exactly one tick is allocated per committed change-producing transaction;
/// every entry staged in that transaction shares it. Allocation is a single
/// atomic fetch-add, so concurrent committers always receive distinct,
/// totally-ordered values.
#[derive(Debug)]
pub struct TickAllocator {
    next: AtomicU64,
}

impl TickAllocator {
    /// Creates an allocator whose first tick is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates an allocator resuming from persisted state.
    ///
    /// `next` is the value the next call to [`allocate`](Self::allocate)
    /// will return.
    #[must_use]
    pub fn starting_at(next: u64) -> Self {
        Self {
            next: AtomicU64::new(next),
        }
    }

    /// Allocates the next tick in the global sequence.
    pub fn allocate(&self) -> SyncTick {
        SyncTick::Real(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the most recently allocated tick value, or 0 if none.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::SeqCst).saturating_sub(1)
    }
}

impl Default for TickAllocator {
    fn default() -> Self {
        Self::new()
    }
}
