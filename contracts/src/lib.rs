//! # Safe Protocol Contracts
//!
//! Policy contracts that plug into the safe protocol's seams:
//!
//! - **Allowlist**: the registry of transferable collections and approved
//!   marketplace authorities, consulted by safes on every withdrawal of a
//!   policy-tracked item.
//!
//! ## Design Principles
//!
//! 1. Contracts hold policy, never items. Custody stays in the safe.
//! 2. Every mutation is gated by an admin capability minted at creation.
//! 3. Gate checks are pure lookups with no side effects.
//! 4. Configuration is serializable (serde) so deployments can be seeded
//!    from JSON.

pub mod allowlist;

pub use allowlist::{Allowlist, AllowlistAdminCap, AllowlistConfig, AllowlistError};
