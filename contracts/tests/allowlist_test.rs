//! Integration tests for the allowlist contract as a withdrawal gate.
//!
//! These tests put real safes behind an allowlist and check that the
//! allowlist decides withdrawals of policy-tracked items, that untracked
//! item types bypass it, and that rejected withdrawals leave the caller
//! holding a usable capability.

use safe_contracts::allowlist::{Allowlist, AllowlistAdminCap, AllowlistConfig, AllowlistError};
use safe_protocol::object::{Item, ObjectId, TypeName};
use safe_protocol::safe::{OwnerCap, Safe, SafeError};

#[derive(Debug)]
struct Punk(ObjectId);

impl Item for Punk {
    fn id(&self) -> ObjectId {
        self.0
    }
}

/// An in-game item the protocol does not police.
#[derive(Debug)]
struct Potion(ObjectId);

impl Item for Potion {
    const POLICY_TRACKED: bool = false;

    fn id(&self) -> ObjectId {
        self.0
    }
}

struct Orderbook;
struct ShadyMarket;

/// Helper: an allowlist admitting punks through the orderbook only.
fn punk_allowlist() -> (Allowlist, AllowlistAdminCap) {
    let (mut allowlist, cap) = Allowlist::new();
    allowlist.insert_collection::<Punk>(&cap).unwrap();
    allowlist.insert_authority::<Orderbook>(&cap).unwrap();
    (allowlist, cap)
}

/// Helper: a safe holding one item of type `T`.
fn safe_with<T: Item>(item: T) -> (Safe, OwnerCap, ObjectId) {
    let (mut safe, owner) = Safe::new();
    let id = item.id();
    safe.deposit(item).map_err(|r| r.error).unwrap();
    (safe, owner, id)
}

// ---------------------------------------------------------------------------
// Gate Decisions
// ---------------------------------------------------------------------------

#[test]
fn registered_collection_and_authority_withdraw() {
    let (allowlist, _cap) = punk_allowlist();
    let (mut safe, owner, id) = safe_with(Punk(ObjectId::random()));
    let transfer = safe.issue_transfer_cap(&id, &owner).unwrap();

    let punk: Punk = safe.withdraw(transfer, &Orderbook, &allowlist).unwrap();
    assert_eq!(punk.id(), id);
}

#[test]
fn unregistered_authority_is_rejected() {
    let (allowlist, _cap) = punk_allowlist();
    let (mut safe, owner, id) = safe_with(Punk(ObjectId::random()));
    let transfer = safe.issue_transfer_cap(&id, &owner).unwrap();

    let rejected = safe
        .withdraw::<Punk, _, _>(transfer, &ShadyMarket, &allowlist)
        .unwrap_err();
    assert_eq!(
        rejected.error,
        SafeError::AuthorityNotAllowed(TypeName::of::<ShadyMarket>())
    );
    assert!(safe.has_item(&id));

    // The rejected capability still works for an approved authority.
    assert!(safe
        .withdraw::<Punk, _, _>(rejected.value, &Orderbook, &allowlist)
        .is_ok());
}

#[test]
fn removed_collection_blocks_withdrawal() {
    let (mut allowlist, cap) = punk_allowlist();
    let (mut safe, owner, id) = safe_with(Punk(ObjectId::random()));
    let transfer = safe.issue_transfer_cap(&id, &owner).unwrap();

    allowlist.remove_collection::<Punk>(&cap).unwrap();
    assert!(!allowlist.can_be_transferred::<Punk>());
    let rejected = safe
        .withdraw::<Punk, _, _>(transfer, &Orderbook, &allowlist)
        .unwrap_err();
    assert_eq!(
        rejected.error,
        SafeError::TypeNotAllowed(TypeName::of::<Punk>())
    );
}

#[test]
fn untracked_items_ignore_the_allowlist() {
    let (allowlist, _cap) = Allowlist::from_config(&AllowlistConfig {
        collections: vec![],
        authorities: Some(vec![]),
    });
    let (mut safe, owner, id) = safe_with(Potion(ObjectId::random()));
    let transfer = safe.issue_transfer_cap(&id, &owner).unwrap();
    assert!(!transfer.is_policy_tracked());
    assert!(allowlist.can_be_transferred::<Potion>());

    let potion: Potion = safe.withdraw(transfer, &ShadyMarket, &allowlist).unwrap();
    assert_eq!(potion.id(), id);
}

#[test]
fn cleared_authorities_admit_anyone() {
    let (mut allowlist, cap) = punk_allowlist();
    allowlist.clear_authorities(&cap).unwrap();
    let (mut safe, owner, id) = safe_with(Punk(ObjectId::random()));
    let transfer = safe.issue_transfer_cap(&id, &owner).unwrap();

    assert!(safe
        .withdraw::<Punk, _, _>(transfer, &ShadyMarket, &allowlist)
        .is_ok());
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[test]
fn admin_cap_is_bound_to_its_allowlist() {
    let (mut first, first_cap) = Allowlist::new();
    let (mut second, second_cap) = Allowlist::new();
    assert_ne!(first_cap.allowlist_id(), second_cap.allowlist_id());

    assert!(matches!(
        first.insert_authority::<Orderbook>(&second_cap),
        Err(AllowlistError::AdminMismatch { .. })
    ));
    assert!(matches!(
        second.clear_authorities(&first_cap),
        Err(AllowlistError::AdminMismatch { .. })
    ));
    assert!(first.insert_authority::<Orderbook>(&first_cap).is_ok());
}

#[test]
fn config_seeds_and_exports_contents() {
    let (allowlist, _cap) = punk_allowlist();
    let exported = allowlist.to_config();
    assert_eq!(exported.collections, vec![TypeName::of::<Punk>()]);
    assert_eq!(exported.authorities, Some(vec![TypeName::of::<Orderbook>()]));

    let json = serde_json::to_string(&exported).unwrap();
    let (restored, _cap) = Allowlist::from_config(&AllowlistConfig::from_json(&json).unwrap());
    assert!(restored.can_be_transferred::<Punk>());
    assert!(restored.contains_authority(&TypeName::of::<Orderbook>()));
    assert!(!restored.contains_authority(&TypeName::of::<ShadyMarket>()));
}
