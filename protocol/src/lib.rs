// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Safe Protocol: Core Library
//!
//! Custody vaults for uniquely identified items, with revocable and
//! optionally exclusive transfer rights that can be handed to third
//! parties without handing over the items themselves.
//!
//! An owner deposits items into a [`Safe`] and holds its [`OwnerCap`]. To
//! let a marketplace sell an item, the owner issues a [`TransferCap`]: a
//! bearer token the marketplace later redeems to move the item out. Caps
//! are revoked by moving the item's version, never by tracking the caps.
//!
//! ## Architecture
//!
//! - **object**: Object ids, custody addresses, versions, and the `Item` trait.
//! - **safe**: The vault, its capabilities, and the authorization gate seam.
//! - **ledger**: Shared safes and address custody for multi-party flows.
//! - **crypto**: BLAKE3 derivation and OS entropy.
//! - **config**: Protocol constants plus safe and ledger configuration.
//! - **logging**: `tracing` subscriber setup.
//!
//! ## Design Philosophy
//!
//! 1. A failed operation changes nothing. Consumed capabilities come back in
//!    [`Rejected`].
//! 2. Capabilities cannot be forged or copied outside this crate.
//! 3. Every state transition is journaled as a [`SafeEvent`].

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod logging;
pub mod object;
pub mod safe;

pub use ledger::Ledger;
pub use object::{Address, Item, ObjectId, TypeName, Version};
pub use safe::{
    AuthorizationGate, ItemRef, OwnerCap, Rejected, Safe, SafeError, SafeEvent, TransferCap,
};
