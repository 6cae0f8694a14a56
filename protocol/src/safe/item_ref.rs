//! Per-item bookkeeping.
//!
//! An [`ItemRef`] exists for exactly as long as its item sits in a safe.
//! It carries the live [`Version`], the count of outstanding shared grants
//! and the exclusivity flag. All transitions go through the methods here so
//! the invariant `exclusive ⇒ outstanding_grants == 1` is kept in one place.

use serde::Serialize;

use crate::object::{ObjectId, TypeName, Version};

use super::error::SafeError;

/// Bookkeeping record for one stored item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    version: Version,
    outstanding_grants: u64,
    exclusive: bool,
    declared_type: TypeName,
    policy_tracked: bool,
}

impl ItemRef {
    /// A fresh record: new version, no grants, not exclusive.
    pub(crate) fn new(item_id: &ObjectId, declared_type: TypeName, policy_tracked: bool) -> Self {
        Self {
            version: Version::fresh(item_id),
            outstanding_grants: 0,
            exclusive: false,
            declared_type,
            policy_tracked,
        }
    }

    /// The live version token.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Number of live grants referencing the current version.
    pub fn outstanding_grants(&self) -> u64 {
        self.outstanding_grants
    }

    /// Whether an exclusive capability is outstanding.
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// The item's type, captured at deposit.
    pub fn declared_type(&self) -> &TypeName {
        &self.declared_type
    }

    /// Whether withdrawals consult the authorization gate.
    pub fn is_policy_tracked(&self) -> bool {
        self.policy_tracked
    }

    pub(crate) fn assert_not_exclusive(&self, item_id: &ObjectId) -> Result<(), SafeError> {
        if self.exclusive {
            return Err(SafeError::AlreadyExclusivelyListed(*item_id));
        }
        Ok(())
    }

    /// Records one more shared grant and returns the version it binds to.
    ///
    /// The first grant of a batch mints a new version, separating this batch
    /// from any earlier one that was withdrawn or delisted.
    pub(crate) fn grant_shared(&mut self, item_id: &ObjectId) -> Result<Version, SafeError> {
        self.assert_not_exclusive(item_id)?;

        let grants = self
            .outstanding_grants
            .checked_add(1)
            .ok_or(SafeError::GrantOverflow(*item_id))?;

        if self.outstanding_grants == 0 {
            self.version = Version::fresh(item_id);
        }
        self.outstanding_grants = grants;
        Ok(self.version)
    }

    /// Locks the item to a single exclusive grant under a new version.
    pub(crate) fn grant_exclusive(&mut self, item_id: &ObjectId) -> Result<Version, SafeError> {
        self.assert_not_exclusive(item_id)?;

        self.version = Version::fresh(item_id);
        self.outstanding_grants = 1;
        self.exclusive = true;
        Ok(self.version)
    }

    /// Releases one grant taken under `snapshot`.
    ///
    /// Grants from an older version were already invalidated wholesale, so
    /// releasing them leaves the record untouched.
    pub(crate) fn release(&mut self, snapshot: &Version) -> bool {
        if self.version != *snapshot {
            return false;
        }

        self.outstanding_grants = self.outstanding_grants.saturating_sub(1);
        if self.outstanding_grants == 0 {
            self.exclusive = false;
        }
        true
    }

    /// Invalidates every outstanding shared grant.
    pub(crate) fn invalidate(&mut self, item_id: &ObjectId) -> Result<(), SafeError> {
        self.assert_not_exclusive(item_id)?;

        self.version = Version::fresh(item_id);
        self.outstanding_grants = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (ObjectId, ItemRef) {
        let id = ObjectId::random();
        let r = ItemRef::new(&id, TypeName::from("punks::Punk"), true);
        (id, r)
    }

    #[test]
    fn new_record_has_no_grants() {
        let (_, r) = fresh();
        assert_eq!(r.outstanding_grants(), 0);
        assert!(!r.is_exclusive());
        assert!(r.is_policy_tracked());
    }

    #[test]
    fn shared_grants_share_one_version() {
        let (id, mut r) = fresh();
        let initial = r.version();
        let v1 = r.grant_shared(&id).unwrap();
        let v2 = r.grant_shared(&id).unwrap();
        assert_ne!(v1, initial);
        assert_eq!(v1, v2);
        assert_eq!(r.outstanding_grants(), 2);
    }

    #[test]
    fn new_batch_after_full_release_gets_new_version() {
        let (id, mut r) = fresh();
        let v1 = r.grant_shared(&id).unwrap();
        assert!(r.release(&v1));
        assert_eq!(r.outstanding_grants(), 0);
        let v2 = r.grant_shared(&id).unwrap();
        assert_ne!(v1, v2);
    }

    #[test]
    fn exclusive_grant_locks_record() {
        let (id, mut r) = fresh();
        let shared = r.grant_shared(&id).unwrap();
        let exclusive = r.grant_exclusive(&id).unwrap();
        assert_ne!(shared, exclusive);
        assert_eq!(r.outstanding_grants(), 1);
        assert!(r.is_exclusive());
        assert_eq!(
            r.grant_shared(&id),
            Err(SafeError::AlreadyExclusivelyListed(id))
        );
        assert_eq!(
            r.grant_exclusive(&id),
            Err(SafeError::AlreadyExclusivelyListed(id))
        );
        assert_eq!(r.invalidate(&id), Err(SafeError::AlreadyExclusivelyListed(id)));
    }

    #[test]
    fn releasing_exclusive_grant_unlocks() {
        let (id, mut r) = fresh();
        let v = r.grant_exclusive(&id).unwrap();
        assert!(r.release(&v));
        assert!(!r.is_exclusive());
        assert_eq!(r.outstanding_grants(), 0);
        r.grant_shared(&id).unwrap();
    }

    #[test]
    fn releasing_stale_grant_is_noop() {
        let (id, mut r) = fresh();
        let stale = r.grant_shared(&id).unwrap();
        let live = r.grant_exclusive(&id).unwrap();
        assert!(!r.release(&stale));
        assert!(r.is_exclusive());
        assert_eq!(r.outstanding_grants(), 1);
        assert_eq!(r.version(), live);
    }

    #[test]
    fn invalidate_resets_grants() {
        let (id, mut r) = fresh();
        let v = r.grant_shared(&id).unwrap();
        r.grant_shared(&id).unwrap();
        r.invalidate(&id).unwrap();
        assert_eq!(r.outstanding_grants(), 0);
        assert_ne!(r.version(), v);
    }

    #[test]
    fn grant_counter_overflow_is_reported() {
        let (id, mut r) = fresh();
        r.grant_shared(&id).unwrap();
        r.outstanding_grants = u64::MAX;
        let before = r.version();
        assert_eq!(r.grant_shared(&id), Err(SafeError::GrantOverflow(id)));
        assert_eq!(r.version(), before);
    }
}
