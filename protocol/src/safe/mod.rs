//! # Safe Module: Custody & Transfer Capabilities
//!
//! A safe keeps items under its owner's custody while letting third parties
//! (marketplaces, orderbooks) move a specific item out of it. The third
//! party holds a [`TransferCap`], never the item.
//!
//! ## Architecture
//!
//! ```text
//! item_ref.rs   : per-item bookkeeping: version, grant count, exclusivity
//! vault.rs      : the Safe: deposits, issuance, withdrawal, delisting
//! capability.rs : OwnerCap and TransferCap bearer tokens
//! gate.rs       : the AuthorizationGate consulted on withdrawal
//! transfer.rs   : withdraw-then-deliver compositions
//! events.rs     : Deposited / Withdrawn notifications
//! error.rs      : SafeError and the Rejected<T> hand-back wrapper
//! ```
//!
//! ## Revocation without a revocation list
//!
//! Capabilities are never looked up or enumerated. Each one snapshots the
//! item's [`Version`](crate::object::Version) at issuance, and withdrawal
//! compares the snapshot against the live version. Delisting, exclusive
//! issuance, or withdrawal moves the version (or removes the record), and
//! every outstanding copy fails closed from then on.

pub mod capability;
pub mod error;
pub mod events;
pub mod gate;
pub mod item_ref;
pub mod transfer;
pub mod vault;

pub use capability::{
    assert_exclusive_transfer_cap, assert_item_of_transfer_cap, OwnerCap, TransferCap,
};
pub use error::{Rejected, SafeError};
pub use events::SafeEvent;
pub use gate::AuthorizationGate;
pub use item_ref::ItemRef;
pub use transfer::{transfer_to_recipient, transfer_to_safe, Recipient};
pub use vault::Safe;
