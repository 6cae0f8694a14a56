//! # Ledger: Shared Safes & Address Custody
//!
//! Safes are shared objects: many parties hold capabilities against the same
//! safe, and every mutation must be serialized. The [`Ledger`] plays the role
//! of the external ordering authority for in-process use. It publishes safes
//! as `Arc<RwLock<Safe>>`, runs each operation as one transition under the
//! safe's write lock, and appends the resulting notifications to a single
//! sequenced log.
//!
//! Items handed to an [`Address`] leave the safe system entirely and sit in
//! the ledger's custody table until their owner takes them.
//!
//! ## Design
//!
//! - `DashMap` indexes safes and custody by key; lookups never block each
//!   other.
//! - `parking_lot::RwLock` guards each safe. Two-safe transfers acquire both
//!   locks in `ObjectId` order, so concurrent transfers in opposite
//!   directions cannot deadlock.
//! - Closures passed to [`Ledger::execute`] must not call back into the
//!   ledger for the same safe; the write lock is not reentrant.

mod custody;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::object::{Address, Item, ObjectId, TypeName};
use crate::safe::{
    transfer_to_recipient, transfer_to_safe, AuthorizationGate, OwnerCap, Rejected, Safe,
    SafeError, SafeEvent, TransferCap,
};

pub use custody::AddressCustody;
use custody::OwnedObject;

type SharedSafe = Arc<RwLock<Safe>>;

// ---------------------------------------------------------------------------
// LedgerEvent
// ---------------------------------------------------------------------------

/// A safe notification stamped with its position in the ledger's total order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    /// Monotonic position in the log, starting at 1.
    pub sequence: u64,
    /// When the ledger recorded the event.
    pub timestamp: DateTime<Utc>,
    /// The notification itself.
    pub event: SafeEvent,
}

#[derive(Debug, Default)]
struct EventLog {
    last_sequence: u64,
    entries: VecDeque<LedgerEvent>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Registry of shared safes and address-owned items.
pub struct Ledger {
    safes: DashMap<ObjectId, SharedSafe>,
    custody: DashMap<Address, HashMap<ObjectId, OwnedObject>>,
    log: RwLock<EventLog>,
    config: LedgerConfig,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("safes", &self.safes.len())
            .field("custodians", &self.custody.len())
            .field("last_sequence", &self.log.read().last_sequence)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            safes: DashMap::new(),
            custody: DashMap::new(),
            log: RwLock::new(EventLog::default()),
            config,
        }
    }

    /// Creates a safe with the ledger's default policy, publishes it as
    /// shared, and returns its owner capability.
    pub fn create_safe(&self) -> OwnerCap {
        let (safe, owner_cap) = Safe::with_config(&self.config.safe);
        self.share_safe(safe);
        owner_cap
    }

    /// Publishes an existing safe. Any notifications it journaled before
    /// publication are recorded first.
    pub fn share_safe(&self, mut safe: Safe) -> ObjectId {
        let safe_id = safe.id();
        self.record(safe.drain_events());
        self.safes.insert(safe_id, Arc::new(RwLock::new(safe)));
        info!(safe = %safe_id, "safe shared");
        safe_id
    }

    fn shared(&self, safe_id: &ObjectId) -> Option<SharedSafe> {
        self.safes.get(safe_id).map(|s| Arc::clone(s.value()))
    }

    /// Whether a safe with this id is published.
    pub fn contains_safe(&self, safe_id: &ObjectId) -> bool {
        self.safes.contains_key(safe_id)
    }

    /// Runs `op` against a read lock on a published safe.
    ///
    /// Mutations only happen through [`execute`](Self::execute) and the
    /// transfer methods, which record notifications as they commit.
    pub fn inspect<R>(
        &self,
        safe_id: &ObjectId,
        op: impl FnOnce(&Safe) -> R,
    ) -> Result<R, SafeError> {
        let shared = self
            .shared(safe_id)
            .ok_or(SafeError::SafeNotFound(*safe_id))?;
        let safe = shared.read();
        Ok(op(&*safe))
    }

    /// Number of published safes.
    pub fn safe_count(&self) -> usize {
        self.safes.len()
    }

    /// Runs `op` as one serialized transition on a published safe.
    ///
    /// # Errors
    ///
    /// Returns [`SafeError::SafeNotFound`] if no such safe is published.
    pub fn execute<R>(
        &self,
        safe_id: &ObjectId,
        op: impl FnOnce(&mut Safe) -> R,
    ) -> Result<R, SafeError> {
        let shared = self
            .shared(safe_id)
            .ok_or(SafeError::SafeNotFound(*safe_id))?;
        let mut safe = shared.write();
        let out = op(&mut *safe);
        self.record(safe.drain_events());
        Ok(out)
    }

    /// Withdraws the item `cap` is bound to and places it in `recipient`'s
    /// custody.
    pub fn transfer_to_address<T, W, G>(
        &self,
        safe_id: &ObjectId,
        cap: TransferCap,
        authority: &W,
        gate: &G,
        recipient: &Address,
    ) -> Result<(), Rejected<TransferCap>>
    where
        T: Item,
        W: 'static,
        G: AuthorizationGate + ?Sized,
    {
        let Some(shared) = self.shared(safe_id) else {
            return Err(Rejected::new(SafeError::SafeNotFound(*safe_id), cap));
        };
        let mut safe = shared.write();
        if let Err(e) = safe.assert_withdrawable::<T, W, G>(&cap, gate) {
            return Err(Rejected::new(e, cap));
        }

        // Safe lock first, then the custody shard; `take_owned` only ever
        // holds the latter.
        let mut custody = AddressCustody::new(
            recipient.clone(),
            self.custody.entry(recipient.clone()).or_default(),
        );
        if custody.holds(&cap.item_id()) {
            let e = SafeError::ItemAlreadyOwned {
                item: cap.item_id(),
                owner: recipient.clone(),
            };
            return Err(Rejected::new(e, cap));
        }

        let result =
            transfer_to_recipient::<T, W, G, _>(cap, authority, gate, &mut *safe, &mut custody);
        drop(custody);
        self.record(safe.drain_events());
        result
    }

    /// Moves the item `cap` is bound to between two published safes.
    ///
    /// Both safes stay locked for the whole transition, so no observer can
    /// see the item in neither or both of them.
    pub fn transfer_between_safes<T, W, G>(
        &self,
        source_id: &ObjectId,
        target_id: &ObjectId,
        cap: TransferCap,
        authority: &W,
        gate: &G,
    ) -> Result<(), Rejected<TransferCap>>
    where
        T: Item,
        W: 'static,
        G: AuthorizationGate + ?Sized,
    {
        let Some(source) = self.shared(source_id) else {
            return Err(Rejected::new(SafeError::SafeNotFound(*source_id), cap));
        };
        let Some(target) = self.shared(target_id) else {
            return Err(Rejected::new(SafeError::SafeNotFound(*target_id), cap));
        };

        if source_id == target_id {
            let mut safe = source.write();
            let result = Self::redeposit::<T, W, G>(&mut *safe, cap, authority, gate);
            self.record(safe.drain_events());
            return result;
        }

        let (mut source, mut target) = if source_id < target_id {
            let s = source.write();
            let t = target.write();
            (s, t)
        } else {
            let t = target.write();
            let s = source.write();
            (s, t)
        };

        let result =
            transfer_to_safe::<T, W, G>(cap, authority, gate, &mut *source, &mut *target);
        self.record(source.drain_events());
        self.record(target.drain_events());
        result
    }

    /// Withdraws an item and deposits it back into the same safe, which
    /// resets its bookkeeping.
    fn redeposit<T, W, G>(
        safe: &mut Safe,
        cap: TransferCap,
        authority: &W,
        gate: &G,
    ) -> Result<(), Rejected<TransferCap>>
    where
        T: Item,
        W: 'static,
        G: AuthorizationGate + ?Sized,
    {
        let check = safe
            .assert_withdrawable::<T, W, G>(&cap, gate)
            .and_then(|_| safe.assert_can_deposit::<T>());
        if let Err(e) = check {
            return Err(Rejected::new(e, cap));
        }
        let item: T = safe.withdraw(cap, authority, gate)?;
        safe.store(item);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Address custody
    // -----------------------------------------------------------------------

    /// Identifiers of items in `address`'s custody, sorted.
    pub fn owned_by(&self, address: &Address) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .custody
            .get(address)
            .map(|objects| objects.keys().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Declared type of an item in `address`'s custody.
    pub fn owned_type(&self, address: &Address, item_id: &ObjectId) -> Option<TypeName> {
        self.custody
            .get(address)
            .and_then(|objects| objects.get(item_id).map(|o| o.declared_type().clone()))
    }

    /// Removes an item from `address`'s custody if it is a `T`.
    pub fn take_owned<T: Item>(&self, address: &Address, item_id: &ObjectId) -> Option<T> {
        let mut objects = self.custody.get_mut(address)?;
        let owned = objects.remove(item_id)?;
        match owned.into_inner::<T>() {
            Ok(item) => {
                debug!(owner = %address, item = %item_id, "item taken from custody");
                Some(item)
            }
            Err(owned) => {
                objects.insert(*item_id, owned);
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Event log
    // -----------------------------------------------------------------------

    /// Sequence number of the most recent event, or 0 if none.
    pub fn last_sequence(&self) -> u64 {
        self.log.read().last_sequence
    }

    /// Retained events with a sequence number greater than `sequence`.
    pub fn events_since(&self, sequence: u64) -> Vec<LedgerEvent> {
        self.log
            .read()
            .entries
            .iter()
            .filter(|e| e.sequence > sequence)
            .cloned()
            .collect()
    }

    fn record(&self, events: Vec<SafeEvent>) {
        if events.is_empty() {
            return;
        }

        let mut log = self.log.write();
        let now = Utc::now();
        for event in events {
            log.last_sequence += 1;
            let sequence = log.last_sequence;
            log.entries.push_back(LedgerEvent {
                sequence,
                timestamp: now,
                event,
            });
        }
        while log.entries.len() > self.config.event_log_capacity {
            log.entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafeConfig;

    #[derive(Debug)]
    struct Punk(ObjectId);

    impl Item for Punk {
        fn id(&self) -> ObjectId {
            self.0
        }
    }

    struct Market;
    struct OpenGate;

    impl AuthorizationGate for OpenGate {
        fn assert_item_type_allowed(&self, _: &TypeName) -> Result<(), SafeError> {
            Ok(())
        }

        fn assert_authority_allowed(&self, _: &TypeName) -> Result<(), SafeError> {
            Ok(())
        }
    }

    fn ledger_with_punk() -> (Ledger, OwnerCap, ObjectId) {
        let ledger = Ledger::default();
        let owner = ledger.create_safe();
        let id = ObjectId::random();
        ledger
            .execute(&owner.safe_id(), |safe| safe.deposit(Punk(id)))
            .unwrap()
            .unwrap();
        (ledger, owner, id)
    }

    #[test]
    fn create_safe_publishes_shared_safe() {
        let ledger = Ledger::default();
        let owner = ledger.create_safe();
        assert_eq!(ledger.safe_count(), 1);
        assert!(ledger.contains_safe(&owner.safe_id()));
        assert_eq!(
            ledger.inspect(&owner.safe_id(), |safe| safe.id()),
            Ok(owner.safe_id())
        );
    }

    #[test]
    fn events_are_sequenced_in_commit_order_across_safes() {
        let ledger = Ledger::default();
        let first = ledger.create_safe();
        let second = ledger.create_safe();
        let (a, b) = (ObjectId::random(), ObjectId::random());

        ledger
            .execute(&first.safe_id(), |safe| safe.deposit(Punk(a)))
            .unwrap()
            .unwrap();
        assert_eq!(ledger.last_sequence(), 1);
        ledger
            .execute(&second.safe_id(), |safe| safe.deposit(Punk(b)))
            .unwrap()
            .unwrap();

        let logged: Vec<(u64, ObjectId)> = ledger
            .events_since(0)
            .iter()
            .map(|e| (e.sequence, e.event.safe_id()))
            .collect();
        assert_eq!(
            logged,
            vec![(1, first.safe_id()), (2, second.safe_id())]
        );
        assert_eq!(
            ledger.inspect(&first.safe_id(), |safe| safe.has_item(&a)),
            Ok(true)
        );
    }

    #[test]
    fn address_custody_refuses_a_second_item_with_the_same_id() {
        let ledger = Ledger::default();
        let first = ledger.create_safe();
        let second = ledger.create_safe();
        let id = ObjectId::random();
        for owner in [&first, &second] {
            ledger
                .execute(&owner.safe_id(), |safe| safe.deposit(Punk(id)))
                .unwrap()
                .unwrap();
        }
        let bob = Address::new("0xb0b");

        let cap = ledger
            .execute(&first.safe_id(), |safe| safe.issue_transfer_cap(&id, &first))
            .unwrap()
            .unwrap();
        ledger
            .transfer_to_address::<Punk, _, _>(&first.safe_id(), cap, &Market, &OpenGate, &bob)
            .unwrap();

        let cap = ledger
            .execute(&second.safe_id(), |safe| safe.issue_transfer_cap(&id, &second))
            .unwrap()
            .unwrap();
        let rejected = ledger
            .transfer_to_address::<Punk, _, _>(&second.safe_id(), cap, &Market, &OpenGate, &bob)
            .unwrap_err();
        assert_eq!(
            rejected.error,
            SafeError::ItemAlreadyOwned {
                item: id,
                owner: bob.clone(),
            }
        );
        assert_eq!(
            ledger.inspect(&second.safe_id(), |safe| safe.has_item(&id)),
            Ok(true)
        );
        assert_eq!(ledger.owned_by(&bob), vec![id]);
        assert_eq!(ledger.last_sequence(), 3);
    }

    #[test]
    fn stale_cap_to_address_reports_source_cause_first() {
        let (ledger, owner, id) = ledger_with_punk();
        let safe_id = owner.safe_id();
        let bob = Address::new("0xb0b");
        let cap = ledger
            .execute(&safe_id, |safe| safe.issue_transfer_cap(&id, &owner))
            .unwrap()
            .unwrap();
        ledger
            .execute(&safe_id, |safe| safe.delist(&id, &owner))
            .unwrap()
            .unwrap();

        let rejected = ledger
            .transfer_to_address::<Punk, _, _>(&safe_id, cap, &Market, &OpenGate, &bob)
            .unwrap_err();
        assert_eq!(rejected.error, SafeError::CapabilityExpired(id));
        assert!(ledger.owned_by(&bob).is_empty());
    }

    #[test]
    fn execute_on_unknown_safe_fails() {
        let ledger = Ledger::default();
        let missing = ObjectId::random();
        assert_eq!(
            ledger.execute(&missing, |safe| safe.len()),
            Err(SafeError::SafeNotFound(missing))
        );
    }

    #[test]
    fn execute_records_sequenced_events() {
        let (ledger, owner, id) = ledger_with_punk();
        let events = ledger.events_since(0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(
            events[0].event,
            SafeEvent::Deposited {
                safe_id: owner.safe_id(),
                item_id: id
            }
        );
        assert_eq!(ledger.last_sequence(), 1);
        assert!(ledger.events_since(1).is_empty());
    }

    #[test]
    fn transfer_to_address_moves_item_into_custody() {
        let (ledger, owner, id) = ledger_with_punk();
        let safe_id = owner.safe_id();
        let cap = ledger
            .execute(&safe_id, |safe| safe.issue_transfer_cap(&id, &owner))
            .unwrap()
            .unwrap();
        let bob = Address::new("0xb0b");

        ledger
            .transfer_to_address::<Punk, _, _>(&safe_id, cap, &Market, &OpenGate, &bob)
            .unwrap();
        assert_eq!(ledger.owned_by(&bob), vec![id]);
        assert_eq!(ledger.owned_type(&bob, &id), Some(TypeName::of::<Punk>()));
        assert!(!ledger.execute(&safe_id, |safe| safe.has_item(&id)).unwrap());

        let punk: Punk = ledger.take_owned(&bob, &id).unwrap();
        assert_eq!(punk.0, id);
        assert!(ledger.owned_by(&bob).is_empty());
    }

    #[test]
    fn take_owned_with_wrong_type_leaves_item() {
        struct Other;
        impl Item for Other {
            fn id(&self) -> ObjectId {
                ObjectId::from_bytes([0; 32])
            }
        }

        let (ledger, owner, id) = ledger_with_punk();
        let safe_id = owner.safe_id();
        let cap = ledger
            .execute(&safe_id, |safe| safe.issue_exclusive_transfer_cap(&id, &owner))
            .unwrap()
            .unwrap();
        let bob = Address::new("0xb0b");
        ledger
            .transfer_to_address::<Punk, _, _>(&safe_id, cap, &Market, &OpenGate, &bob)
            .unwrap();

        assert!(ledger.take_owned::<Other>(&bob, &id).is_none());
        assert_eq!(ledger.owned_by(&bob), vec![id]);
    }

    #[test]
    fn transfer_to_unknown_safe_returns_cap() {
        let (ledger, owner, id) = ledger_with_punk();
        let cap = ledger
            .execute(&owner.safe_id(), |safe| safe.issue_transfer_cap(&id, &owner))
            .unwrap()
            .unwrap();
        let missing = ObjectId::random();

        let rejected = ledger
            .transfer_to_address::<Punk, _, _>(&missing, cap, &Market, &OpenGate, &"0xb0b".into())
            .unwrap_err();
        assert_eq!(rejected.error, SafeError::SafeNotFound(missing));
        assert_eq!(rejected.value.item_id(), id);
    }

    #[test]
    fn transfer_between_safes_in_both_lock_orders() {
        let (ledger, owner_a, id) = ledger_with_punk();
        let owner_b = ledger.create_safe();
        let (a, b) = (owner_a.safe_id(), owner_b.safe_id());

        let cap = ledger
            .execute(&a, |safe| safe.issue_transfer_cap(&id, &owner_a))
            .unwrap()
            .unwrap();
        ledger
            .transfer_between_safes::<Punk, _, _>(&a, &b, cap, &Market, &OpenGate)
            .unwrap();
        assert!(ledger.execute(&b, |safe| safe.has_item(&id)).unwrap());

        let cap = ledger
            .execute(&b, |safe| safe.issue_transfer_cap(&id, &owner_b))
            .unwrap()
            .unwrap();
        ledger
            .transfer_between_safes::<Punk, _, _>(&b, &a, cap, &Market, &OpenGate)
            .unwrap();
        assert!(ledger.execute(&a, |safe| safe.has_item(&id)).unwrap());
        assert!(!ledger.execute(&b, |safe| safe.has_item(&id)).unwrap());
    }

    #[test]
    fn transfer_within_same_safe_resets_bookkeeping() {
        let (ledger, owner, id) = ledger_with_punk();
        let safe_id = owner.safe_id();
        let (cap, sibling) = ledger
            .execute(&safe_id, |safe| {
                (
                    safe.issue_transfer_cap(&id, &owner).unwrap(),
                    safe.issue_transfer_cap(&id, &owner).unwrap(),
                )
            })
            .unwrap();

        ledger
            .transfer_between_safes::<Punk, _, _>(&safe_id, &safe_id, cap, &Market, &OpenGate)
            .unwrap();

        ledger
            .execute(&safe_id, |safe| {
                assert!(safe.has_item(&id));
                assert_eq!(safe.item_ref(&id).unwrap().outstanding_grants(), 0);
                assert_eq!(
                    safe.assert_version_match(&sibling),
                    Err(SafeError::CapabilityExpired(id))
                );
            })
            .unwrap();
    }

    #[test]
    fn event_log_is_bounded() {
        let config = LedgerConfig {
            event_log_capacity: 2,
            safe: SafeConfig::default(),
        };
        let ledger = Ledger::new(config);
        let owner = ledger.create_safe();
        for _ in 0..3 {
            ledger
                .execute(&owner.safe_id(), |safe| safe.deposit(Punk(ObjectId::random())))
                .unwrap()
                .unwrap();
        }
        let events = ledger.events_since(0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, 2);
        assert_eq!(ledger.last_sequence(), 3);
    }
}
