//! # Cryptographic Primitives
//!
//! Thin wrappers around BLAKE3 and OS entropy. Identifiers and version
//! tokens are built from these and nothing else.

pub mod hash;

pub use hash::{domain_separated_hash, random_bytes};
