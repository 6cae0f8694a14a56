//! Error types for safe operations.
//!
//! Every precondition failure maps to exactly one [`SafeError`] variant so
//! marketplaces can branch on the cause. Operations that take a bearer
//! value (a capability or an item) by move hand it back inside
//! [`Rejected`] when they fail: an aborted operation never destroys the
//! caller's token.

use std::fmt;

use thiserror::Error;

use crate::object::{Address, ObjectId, TypeName};

/// Errors that can occur during safe operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafeError {
    /// The owner capability is bound to a different safe.
    #[error("owner capability is bound to safe {cap_safe}, not {safe}")]
    OwnerMismatch {
        /// The safe the operation targeted.
        safe: ObjectId,
        /// The safe the capability is bound to.
        cap_safe: ObjectId,
    },

    /// The item is not stored in this safe.
    #[error("item {0} not found in safe")]
    ItemNotFound(ObjectId),

    /// An item with this identifier is already stored in the safe.
    #[error("item {0} is already stored in this safe")]
    ItemAlreadyPresent(ObjectId),

    /// The transfer capability is bound to a different safe.
    #[error("transfer capability is bound to safe {cap_safe}, not {safe}")]
    CapabilityVaultMismatch {
        /// The safe the capability was presented to.
        safe: ObjectId,
        /// The safe the capability is bound to.
        cap_safe: ObjectId,
    },

    /// The transfer capability is bound to a different item.
    #[error("transfer capability is bound to item {cap_item}, not {item}")]
    CapabilityItemMismatch {
        /// The item the caller presented.
        item: ObjectId,
        /// The item the capability is bound to.
        cap_item: ObjectId,
    },

    /// The capability's version snapshot no longer matches the item.
    #[error("transfer capability for item {0} has expired")]
    CapabilityExpired(ObjectId),

    /// An exclusive capability for the item is outstanding.
    #[error("item {0} is exclusively listed")]
    AlreadyExclusivelyListed(ObjectId),

    /// The operation requires an exclusive listing.
    #[error("item {0} is not exclusively listed")]
    NotExclusivelyListed(ObjectId),

    /// The allowlist does not contain the item's type.
    #[error("item type {0} is not allowed")]
    TypeNotAllowed(TypeName),

    /// The allowlist does not contain the caller's authority.
    #[error("authority {0} is not allowed")]
    AuthorityNotAllowed(TypeName),

    /// The safe does not accept deposits of this item type.
    #[error("deposits of {0} are restricted in this safe")]
    DepositsRestricted(TypeName),

    /// The stored item is not of the requested type.
    #[error("item {item} is a {stored}, not a {requested}")]
    ItemTypeMismatch {
        /// The item in question.
        item: ObjectId,
        /// The type recorded at deposit.
        stored: TypeName,
        /// The type the caller asked for.
        requested: TypeName,
    },

    /// Issuing another capability would overflow the grant counter.
    #[error("outstanding grant counter for item {0} would overflow")]
    GrantOverflow(ObjectId),

    /// The receiving address already holds an item with this identifier.
    #[error("address {owner} already holds item {item}")]
    ItemAlreadyOwned {
        /// The item being delivered.
        item: ObjectId,
        /// The receiving address.
        owner: Address,
    },

    /// No shared safe with this id is published on the ledger.
    #[error("safe {0} is not published on the ledger")]
    SafeNotFound(ObjectId),
}

/// A failed operation, carrying back the value it was given by move.
///
/// Mirrors `std::sync::mpsc::SendError`: the caller decides whether to
/// retry with the returned value or drop it.
pub struct Rejected<T> {
    /// Why the operation was aborted.
    pub error: SafeError,
    /// The capability or item the caller passed in, untouched.
    pub value: T,
}

impl<T> Rejected<T> {
    pub(crate) fn new(error: SafeError, value: T) -> Self {
        Self { error, value }
    }

    /// Returns the cause of the rejection.
    pub fn error(&self) -> &SafeError {
        &self.error
    }

    /// Splits the rejection into its cause and the returned value.
    pub fn into_parts(self) -> (SafeError, T) {
        (self.error, self.value)
    }

    /// Discards the returned value, keeping only the cause.
    pub fn into_error(self) -> SafeError {
        self.error
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation rejected: {}", self.error)
    }
}

impl<T> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T> From<Rejected<T>> for SafeError {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.error
    }
}
