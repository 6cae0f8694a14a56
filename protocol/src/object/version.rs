//! Version (epoch) tokens.
//!
//! A [`Version`] stamps one generation of transfer capabilities for one
//! item. Capabilities snapshot the version at issuance; bumping the version
//! on the item's bookkeeping record invalidates every outstanding copy at
//! once, without anyone having to find them.
//!
//! Versions are not counters. Each one is
//! `BLAKE3-derive_key(ctx, item_id || 32 random bytes)`, so a token cannot be
//! predicted, cannot recur after wraparound, and cannot be confused with a
//! version of a different item. Only equality is meaningful.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::config::{VERSION_DERIVATION_CONTEXT, VERSION_ENTROPY_LENGTH, VERSION_TOKEN_LENGTH};
use crate::crypto::{domain_separated_hash, random_bytes};

use super::id::ObjectId;

/// An opaque epoch token for an item's capability generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version([u8; VERSION_TOKEN_LENGTH]);

impl Version {
    /// Mints a fresh version token bound to `item_id`.
    pub fn fresh(item_id: &ObjectId) -> Self {
        let entropy: [u8; VERSION_ENTROPY_LENGTH] = random_bytes();
        Self(domain_separated_hash(
            VERSION_DERIVATION_CONTEXT,
            &[item_id.as_bytes(), &entropy],
        ))
    }

    /// Returns the hex-encoded token.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fresh_versions_never_repeat() {
        let item = ObjectId::random();
        let minted: HashSet<Version> = (0..1_000).map(|_| Version::fresh(&item)).collect();
        assert_eq!(minted.len(), 1_000);
    }

    #[test]
    fn versions_of_different_items_differ() {
        let a = Version::fresh(&ObjectId::random());
        let b = Version::fresh(&ObjectId::random());
        assert_ne!(a, b);
    }

    #[test]
    fn copies_compare_equal() {
        let v = Version::fresh(&ObjectId::random());
        let snapshot = v;
        assert_eq!(v, snapshot);
    }
}
