//! Deterministic name-based class identity.
//!
//! [`TypeHash`] is a 64-bit hash of an exported class name. Two registries
//! that export the same name agree on its hash, so is-a queries from script
//! code can be answered by name without holding a reference to the class.
//!
//! ```
//! use lualite_core::TypeHash;
//!
//! let a = TypeHash::from_name("Counter");
//! let b = TypeHash::from_name("Counter");
//! assert_eq!(a, b);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain marker for class-name hashes.
const CLASS: u64 = 0x2fac10b63a6cc57c;

/// A deterministic 64-bit hash of an exported class name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash an exported class name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(CLASS ^ xxh64(name.as_bytes(), 0))
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_hash_determinism() {
        assert_eq!(TypeHash::from_name("Counter"), TypeHash::from_name("Counter"));
        assert_eq!(
            TypeHash::from_name("game.Player"),
            TypeHash::from_name("game.Player")
        );
    }

    #[test]
    fn type_hash_uniqueness() {
        let base = TypeHash::from_name("Base");
        let derived = TypeHash::from_name("Derived");
        assert_ne!(base, derived);
        assert!(!base.is_empty());
    }

    #[test]
    fn empty_hash() {
        assert!(TypeHash::EMPTY.is_empty());
        assert_eq!(TypeHash::EMPTY.as_u64(), 0);
    }

    #[test]
    fn hash_display() {
        let hash = TypeHash(0x1234);
        assert_eq!(format!("{hash}"), "0x0000000000001234");
        assert_eq!(format!("{hash:?}"), "TypeHash(0x0000000000001234)");
    }
}
