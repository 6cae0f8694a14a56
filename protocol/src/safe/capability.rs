//! Bearer capabilities.
//!
//! Both capability types are unforgeable outside this crate (private
//! fields, crate-only constructors) and deliberately not `Clone`:
//! possession is the authorization, and a [`TransferCap`] is consumed by
//! move when it is exercised or burned.

use crate::object::{ObjectId, TypeName, Version};

use super::error::SafeError;

// ---------------------------------------------------------------------------
// OwnerCap
// ---------------------------------------------------------------------------

/// Authorizes privileged administration of exactly one safe.
#[derive(Debug, PartialEq, Eq)]
pub struct OwnerCap {
    id: ObjectId,
    safe_id: ObjectId,
}

impl OwnerCap {
    pub(crate) fn new(safe_id: ObjectId) -> Self {
        Self {
            id: ObjectId::random(),
            safe_id,
        }
    }

    /// The capability's own identifier.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The safe this capability administers.
    pub fn safe_id(&self) -> ObjectId {
        self.safe_id
    }
}

// ---------------------------------------------------------------------------
// TransferCap
// ---------------------------------------------------------------------------

/// Authorizes withdrawal of one item from one safe, at one version.
#[derive(Debug, PartialEq, Eq)]
pub struct TransferCap {
    id: ObjectId,
    safe_id: ObjectId,
    item_id: ObjectId,
    version: Version,
    exclusive: bool,
    declared_type: TypeName,
    policy_tracked: bool,
}

impl TransferCap {
    pub(crate) fn new(
        safe_id: ObjectId,
        item_id: ObjectId,
        version: Version,
        exclusive: bool,
        declared_type: TypeName,
        policy_tracked: bool,
    ) -> Self {
        Self {
            id: ObjectId::random(),
            safe_id,
            item_id,
            version,
            exclusive,
            declared_type,
            policy_tracked,
        }
    }

    /// The capability's own identifier.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The safe holding the item.
    pub fn safe_id(&self) -> ObjectId {
        self.safe_id
    }

    /// The item this capability can move.
    pub fn item_id(&self) -> ObjectId {
        self.item_id
    }

    /// The version snapshot taken at issuance.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether this is the sole, exclusive capability for the item.
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// The item's declared type.
    pub fn declared_type(&self) -> &TypeName {
        &self.declared_type
    }

    /// Whether withdrawing with this capability consults the allowlist.
    pub fn is_policy_tracked(&self) -> bool {
        self.policy_tracked
    }
}

/// Fails unless `item_id` is the item `cap` is bound to.
pub fn assert_item_of_transfer_cap(item_id: &ObjectId, cap: &TransferCap) -> Result<(), SafeError> {
    if cap.item_id != *item_id {
        return Err(SafeError::CapabilityItemMismatch {
            item: *item_id,
            cap_item: cap.item_id,
        });
    }
    Ok(())
}

/// Fails unless `cap` is an exclusive capability.
///
/// Settlement layers that must not be front-run by a sibling listing call
/// this before accepting a capability.
pub fn assert_exclusive_transfer_cap(cap: &TransferCap) -> Result<(), SafeError> {
    if !cap.exclusive {
        return Err(SafeError::NotExclusivelyListed(cap.item_id));
    }
    Ok(())
}
