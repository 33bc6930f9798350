//! Name hashing
//!
//! Clip and parameter names are looked up through a 64-bit xxh3 hash of the
//! name string. Hashes are computed once at load/bind time so the per-frame
//! path never touches strings.

use xxhash_rust::xxh3::xxh3_64;

/// 64-bit hash of a resource name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NameHash(u64);

impl NameHash {
    /// Hashes a name.
    #[inline]
    #[must_use]
    pub fn of(name: &str) -> Self {
        Self(xxh3_64(name.as_bytes()))
    }

    #[inline]
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<&str> for NameHash {
    fn from(name: &str) -> Self {
        Self::of(name)
    }
}
