//! # Hashing & Entropy Utilities
//!
//! BLAKE3 is the only hash function in the Safe protocol. It derives version
//! tokens, and its `derive_key` mode gives us domain separation for free.
//! Randomness comes from the operating system via `rand::rngs::OsRng`;
//! identifiers and version entropy must be unpredictable to callers, so we
//! never use a seeded or thread-local PRNG here.

use rand::rngs::OsRng;
use rand::RngCore;

/// Compute a domain-separated hash over several byte slices.
///
/// Uses BLAKE3's `derive_key` mode with `context` as the context string, so
/// digests computed under different contexts never collide even when the
/// parts are identical. Parts are fed sequentially into the hasher without
/// an intermediate buffer.
///
/// # Example
///
/// ```
/// use safe_protocol::crypto::domain_separated_hash;
///
/// let a = domain_separated_hash("safe protocol example", &[b"item", b"entropy"]);
/// let b = domain_separated_hash("safe protocol example", &[b"item", b"entropy"]);
/// assert_eq!(a, b);
/// ```
pub fn domain_separated_hash(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Returns `N` bytes of operating-system entropy.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}
