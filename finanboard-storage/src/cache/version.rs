//! Entry versions.
//!
//! Every change to a cache entry's payload stamps it with the next value of
//! a cache-wide counter. Versions are therefore unique across entries and
//! strictly increasing, so a mutation that remembers the version it
//! installed can later tell whether anyone else wrote the entry since.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A point in an entry's write history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryVersion(u64);

impl EntryVersion {
    /// Version of an entry whose payload was never written.
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn sequence(&self) -> u64 {
        self.0
    }

    /// Check if this version is newer than another.
    pub fn is_newer_than(&self, other: &EntryVersion) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for EntryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Source of fresh versions, shared by every entry of one cache.
#[derive(Debug, Default)]
pub(crate) struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    pub(crate) fn next(&self) -> EntryVersion {
        EntryVersion(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_strictly_increasing() {
        let clock = VersionClock::default();
        let a = clock.next();
        let b = clock.next();
        assert!(b.is_newer_than(&a));
        assert!(a.is_newer_than(&EntryVersion::zero()));
        assert_eq!(a.sequence(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(EntryVersion::zero().to_string(), "v0");
    }
}
