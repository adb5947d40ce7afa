//! Process-wide unique identifiers.
//!
//! A [`SimpleGuid`] is a 64-bit value handed out by a monotonically increasing
//! process-wide counter. The value `0` is reserved as the "invalid" sentinel
//! meaning "unset / no reference", so the counter starts at 1.
//!
//! Identifiers are never reused within a process lifetime. Ids that enter the
//! process from outside (a realm file, a clipboard payload) must be passed to
//! [`SimpleGuid::observe`] so that later calls to [`SimpleGuid::generate`]
//! skip past them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Next value returned by [`SimpleGuid::generate`].
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// SimpleGuid
// ---------------------------------------------------------------------------

/// A process-unique identifier with a reserved invalid value.
///
/// Totally ordered and hashable so it can key `BTreeMap`s and `HashMap`s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimpleGuid(u64);

impl SimpleGuid {
    /// The "unset / no reference" sentinel.
    pub const INVALID: SimpleGuid = SimpleGuid(0);

    /// Draw a fresh identifier from the process-wide counter.
    pub fn generate() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The invalid sentinel. Equivalent to [`SimpleGuid::INVALID`].
    #[inline]
    pub fn invalid() -> Self {
        Self::INVALID
    }

    /// Record an identifier that was created elsewhere (e.g. read from disk).
    ///
    /// Guarantees that every later [`generate`](Self::generate) returns a
    /// value strictly greater than `id`.
    pub fn observe(id: SimpleGuid) {
        if id.is_valid() {
            NEXT_ID.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
        }
    }

    /// Rebuild an identifier from its raw value.
    ///
    /// This does not register the value with the generator; callers that
    /// import foreign ids should follow up with [`observe`](Self::observe).
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for SimpleGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "SimpleGuid({})", self.0)
        } else {
            write!(f, "SimpleGuid(invalid)")
        }
    }
}

impl fmt::Display for SimpleGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
