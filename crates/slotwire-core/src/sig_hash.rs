//! Deterministic hash-based signature identity.
//!
//! This module provides [`SigHash`], a 64-bit hash computed from a normalized
//! signature's name and ordered type tags. Hashes are deterministic, so the
//! same signature text always maps to the same table key regardless of
//! registration order, and signal/slot catalogs need no secondary
//! name-to-index maps.
//!
//! # Examples
//!
//! ```
//! use slotwire_core::{SigHash, Signature};
//!
//! let a = SigHash::of(&Signature::parse("ping(int)").unwrap());
//! let b = SigHash::of(&Signature::parse("ping( int )").unwrap());
//! assert_eq!(a, b); // normalization makes whitespace irrelevant
//!
//! let c = SigHash::of(&Signature::parse("ping(string)").unwrap());
//! assert_ne!(a, c); // parameter types are part of the identity
//! ```

use std::fmt;

use xxhash_rust::xxh64::xxh64;

use crate::signature::Signature;

/// Domain seed for signature hashes.
const SIGNATURE_DOMAIN: u64 = 0x6c1f3a9d84e2b570;

/// Per-position mixing seed so parameter order matters.
const PARAM_STEP: u64 = 0x9e3779b97f4a7c15;

/// 64-bit identity of a normalized signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SigHash(u64);

impl SigHash {
    /// Compute the hash of a parsed signature.
    pub fn of(signature: &Signature) -> Self {
        let mut hash = xxh64(signature.name().as_bytes(), SIGNATURE_DOMAIN);
        for (position, tag) in signature.params().iter().enumerate() {
            let seed = SIGNATURE_DOMAIN.wrapping_add(PARAM_STEP.wrapping_mul(position as u64 + 1));
            hash ^= xxh64(tag.as_bytes(), seed);
        }
        Self(hash)
    }

    /// Get the raw hash value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(text: &str) -> SigHash {
        SigHash::of(&Signature::parse(text).unwrap())
    }

    #[test]
    fn deterministic() {
        assert_eq!(hash("ping(int,string)"), hash("ping(int,string)"));
    }

    #[test]
    fn name_is_part_of_identity() {
        assert_ne!(hash("ping(int)"), hash("pong(int)"));
    }

    #[test]
    fn parameter_order_matters() {
        assert_ne!(hash("f(int,string)"), hash("f(string,int)"));
    }

    #[test]
    fn arity_matters() {
        assert_ne!(hash("f()"), hash("f(int)"));
        assert_ne!(hash("f(int)"), hash("f(int,int)"));
    }
}
