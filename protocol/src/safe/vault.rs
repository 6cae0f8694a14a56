//! # The Safe
//!
//! A [`Safe`] holds items of any type together with their [`ItemRef`]
//! bookkeeping. Items and records share one keyed store, so an id is in the
//! bookkeeping table exactly when its item is physically held.
//!
//! ## Lifecycle of a listing
//!
//! 1. **Deposit**: the item enters with a fresh version and no grants.
//! 2. **Issue**: the owner hands out shared capabilities (all bound to one
//!    version) or a single exclusive one (bound to its own version).
//! 3. **Withdraw**: the first capability exercised takes the item; every
//!    sibling is left pointing at a record that no longer exists.
//! 4. **Delist / burn**: the owner bumps the version to kill a shared batch,
//!    or a holder returns its grant.

use std::any::Any;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

use tracing::{debug, info, warn};

use crate::config::{SafeConfig, MIN_EVENT_JOURNAL_CAPACITY};
use crate::object::{Item, ObjectId, TypeName};

use super::capability::{OwnerCap, TransferCap};
use super::error::{Rejected, SafeError};
use super::events::SafeEvent;
use super::gate::{authorize, AuthorizationGate};
use super::item_ref::ItemRef;

/// A stored item and its bookkeeping record.
struct Entry {
    item_ref: ItemRef,
    item: Box<dyn Any + Send + Sync>,
}

/// A custody vault for uniquely identified items.
pub struct Safe {
    id: ObjectId,
    entries: HashMap<ObjectId, Entry>,
    enable_any_deposit: bool,
    enabled_collections: BTreeSet<TypeName>,
    events: VecDeque<SafeEvent>,
    journal_capacity: usize,
    evicted_events: u64,
}

impl fmt::Debug for Safe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Safe")
            .field("id", &self.id)
            .field("items", &self.entries.len())
            .field("enable_any_deposit", &self.enable_any_deposit)
            .field("enabled_collections", &self.enabled_collections)
            .finish()
    }
}

impl Safe {
    /// Creates an empty safe accepting any deposit, and its owner capability.
    pub fn new() -> (Self, OwnerCap) {
        Self::with_config(&SafeConfig::default())
    }

    /// Creates an empty safe with the given deposit policy.
    pub fn with_config(config: &SafeConfig) -> (Self, OwnerCap) {
        let safe = Self {
            id: ObjectId::random(),
            entries: HashMap::new(),
            enable_any_deposit: config.enable_any_deposit,
            enabled_collections: config.enabled_collections.iter().cloned().collect(),
            events: VecDeque::new(),
            journal_capacity: config
                .event_journal_capacity
                .max(MIN_EVENT_JOURNAL_CAPACITY),
            evicted_events: 0,
        };
        let owner_cap = OwnerCap::new(safe.id);
        debug!(safe = %safe.id, "safe created");
        (safe, owner_cap)
    }

    /// The safe's identifier.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the safe holds no items.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers of all held items, in no particular order.
    pub fn item_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries.keys().copied()
    }

    // -----------------------------------------------------------------------
    // Deposits
    // -----------------------------------------------------------------------

    /// Deposits an item, subject to the safe's deposit restrictions.
    ///
    /// # Errors
    ///
    /// Returns the item with [`SafeError::DepositsRestricted`] if the safe
    /// does not accept its type, or [`SafeError::ItemAlreadyPresent`] if an
    /// item with the same id is already held.
    pub fn deposit<T: Item>(&mut self, item: T) -> Result<(), Rejected<T>> {
        if let Err(e) = self.assert_accepts::<T>(&item.id(), false) {
            return Err(Rejected::new(e, item));
        }
        self.store(item);
        Ok(())
    }

    /// Deposits an item on behalf of the owner, ignoring deposit restrictions.
    pub fn deposit_privileged<T: Item>(
        &mut self,
        item: T,
        owner_cap: &OwnerCap,
    ) -> Result<(), Rejected<T>> {
        let check = self
            .assert_owner_cap(owner_cap)
            .and_then(|_| self.assert_accepts::<T>(&item.id(), true));
        if let Err(e) = check {
            return Err(Rejected::new(e, item));
        }
        self.store(item);
        Ok(())
    }

    /// Whether a non-privileged deposit of a `T` would pass the restrictions.
    pub fn can_deposit<T: Item>(&self) -> bool {
        self.enable_any_deposit || self.enabled_collections.contains(&TypeName::of::<T>())
    }

    /// Fails unless deposits of `T` are accepted.
    pub fn assert_can_deposit<T: Item>(&self) -> Result<(), SafeError> {
        if !self.can_deposit::<T>() {
            return Err(SafeError::DepositsRestricted(TypeName::of::<T>()));
        }
        Ok(())
    }

    /// Stops accepting deposits except for explicitly enabled collections.
    pub fn restrict_deposits(&mut self, owner_cap: &OwnerCap) -> Result<(), SafeError> {
        self.assert_owner_cap(owner_cap)?;
        self.enable_any_deposit = false;
        Ok(())
    }

    /// Accepts deposits of every item type again.
    pub fn enable_any_deposit(&mut self, owner_cap: &OwnerCap) -> Result<(), SafeError> {
        self.assert_owner_cap(owner_cap)?;
        self.enable_any_deposit = true;
        Ok(())
    }

    /// Accepts deposits of `T` while the safe is restricted.
    pub fn enable_deposits_of<T: Item>(&mut self, owner_cap: &OwnerCap) -> Result<(), SafeError> {
        self.assert_owner_cap(owner_cap)?;
        self.enabled_collections.insert(TypeName::of::<T>());
        Ok(())
    }

    /// Stops accepting deposits of `T` while the safe is restricted.
    pub fn disable_deposits_of<T: Item>(&mut self, owner_cap: &OwnerCap) -> Result<(), SafeError> {
        self.assert_owner_cap(owner_cap)?;
        self.enabled_collections.remove(&TypeName::of::<T>());
        Ok(())
    }

    /// Checks that a deposit of a `T` with `item_id` would succeed.
    pub(crate) fn assert_accepts<T: Item>(
        &self,
        item_id: &ObjectId,
        privileged: bool,
    ) -> Result<(), SafeError> {
        if !privileged {
            self.assert_can_deposit::<T>()?;
        }
        if self.entries.contains_key(item_id) {
            return Err(SafeError::ItemAlreadyPresent(*item_id));
        }
        Ok(())
    }

    /// Stores an item that already passed [`assert_accepts`](Self::assert_accepts).
    pub(crate) fn store<T: Item>(&mut self, item: T) {
        let item_id = item.id();
        let declared_type = TypeName::of::<T>();
        let item_ref = ItemRef::new(&item_id, declared_type, T::POLICY_TRACKED);
        self.entries.insert(
            item_id,
            Entry {
                item_ref,
                item: Box::new(item),
            },
        );
        self.journal(SafeEvent::Deposited {
            safe_id: self.id,
            item_id,
        });
        info!(safe = %self.id, item = %item_id, "item deposited");
    }

    // -----------------------------------------------------------------------
    // Capability issuance
    // -----------------------------------------------------------------------

    /// Issues a shared transfer capability for `item_id`.
    ///
    /// All shared capabilities issued since the last invalidation bind to
    /// the same version and die together.
    ///
    /// # Errors
    ///
    /// [`SafeError::OwnerMismatch`], [`SafeError::ItemNotFound`],
    /// [`SafeError::AlreadyExclusivelyListed`], [`SafeError::GrantOverflow`].
    pub fn issue_transfer_cap(
        &mut self,
        item_id: &ObjectId,
        owner_cap: &OwnerCap,
    ) -> Result<TransferCap, SafeError> {
        self.assert_owner_cap(owner_cap)?;
        let safe_id = self.id;
        let item_ref = self.item_ref_mut(item_id)?;
        let version = item_ref.grant_shared(item_id)?;

        debug!(
            safe = %safe_id,
            item = %item_id,
            grants = item_ref.outstanding_grants(),
            "shared transfer capability issued"
        );
        Ok(TransferCap::new(
            safe_id,
            *item_id,
            version,
            false,
            item_ref.declared_type().clone(),
            item_ref.is_policy_tracked(),
        ))
    }

    /// Issues the sole, exclusive transfer capability for `item_id`.
    ///
    /// Any shared capabilities outstanding for the item are invalidated, and
    /// no further capability can be issued until this one is burned or
    /// exercised.
    pub fn issue_exclusive_transfer_cap(
        &mut self,
        item_id: &ObjectId,
        owner_cap: &OwnerCap,
    ) -> Result<TransferCap, SafeError> {
        self.assert_owner_cap(owner_cap)?;
        let safe_id = self.id;
        let item_ref = self.item_ref_mut(item_id)?;
        let version = item_ref.grant_exclusive(item_id)?;

        debug!(safe = %safe_id, item = %item_id, "exclusive transfer capability issued");
        Ok(TransferCap::new(
            safe_id,
            *item_id,
            version,
            true,
            item_ref.declared_type().clone(),
            item_ref.is_policy_tracked(),
        ))
    }

    // -----------------------------------------------------------------------
    // Withdrawal & revocation
    // -----------------------------------------------------------------------

    /// Withdraws the item `cap` is bound to, consuming `cap`.
    ///
    /// The witness value proves the caller can construct a `W`; only its type
    /// reaches the gate.
    /// Policy-tracked items must pass both gate checks; other items skip the
    /// gate.
    ///
    /// # Errors
    ///
    /// On any failure the capability is handed back unchanged inside
    /// [`Rejected`], with one of [`SafeError::CapabilityVaultMismatch`],
    /// [`SafeError::ItemNotFound`], [`SafeError::CapabilityExpired`],
    /// [`SafeError::ItemTypeMismatch`], [`SafeError::TypeNotAllowed`] or
    /// [`SafeError::AuthorityNotAllowed`].
    pub fn withdraw<T, W, G>(
        &mut self,
        cap: TransferCap,
        _witness: &W,
        gate: &G,
    ) -> Result<T, Rejected<TransferCap>>
    where
        T: Item,
        W: 'static,
        G: AuthorizationGate + ?Sized,
    {
        match self.take::<T, W, G>(&cap, gate) {
            Ok(item) => Ok(item),
            Err(e) => {
                warn!(safe = %self.id, item = %cap.item_id(), error = %e, "withdrawal rejected");
                Err(Rejected::new(e, cap))
            }
        }
    }

    /// Validates `cap` and removes its item. Leaves the safe untouched on error.
    pub(crate) fn take<T, W, G>(&mut self, cap: &TransferCap, gate: &G) -> Result<T, SafeError>
    where
        T: Item,
        W: 'static,
        G: AuthorizationGate + ?Sized,
    {
        self.assert_withdrawable::<T, W, G>(cap, gate)?;

        // Presence and type were both checked above, so the entry is a `T`.
        let item_id = cap.item_id();
        let item = match self.entries.remove(&item_id).map(|e| e.item.downcast::<T>()) {
            Some(Ok(item)) => *item,
            _ => return Err(SafeError::ItemNotFound(item_id)),
        };

        self.journal(SafeEvent::Withdrawn {
            safe_id: self.id,
            item_id,
        });
        info!(safe = %self.id, item = %item_id, "item withdrawn");
        Ok(item)
    }

    /// Runs every withdrawal precondition without mutating anything.
    pub(crate) fn assert_withdrawable<T, W, G>(
        &self,
        cap: &TransferCap,
        gate: &G,
    ) -> Result<(), SafeError>
    where
        T: Item,
        W: 'static,
        G: AuthorizationGate + ?Sized,
    {
        self.assert_transfer_cap_of_safe(cap)?;
        let item_id = cap.item_id();
        let entry = self
            .entries
            .get(&item_id)
            .ok_or(SafeError::ItemNotFound(item_id))?;

        if entry.item_ref.version() != cap.version() {
            return Err(SafeError::CapabilityExpired(item_id));
        }

        if !entry.item.is::<T>() {
            return Err(SafeError::ItemTypeMismatch {
                item: item_id,
                stored: entry.item_ref.declared_type().clone(),
                requested: TypeName::of::<T>(),
            });
        }

        authorize(
            gate,
            entry.item_ref.is_policy_tracked(),
            entry.item_ref.declared_type(),
            &TypeName::of::<W>(),
        )
    }

    /// Destroys `cap`, returning its grant if it is still live.
    ///
    /// Burning a capability whose version was already superseded (or whose
    /// item is gone) only destroys the token.
    pub fn burn_transfer_cap(&mut self, cap: TransferCap) -> Result<(), Rejected<TransferCap>> {
        if let Err(e) = self.assert_transfer_cap_of_safe(&cap) {
            return Err(Rejected::new(e, cap));
        }

        let item_id = cap.item_id();
        let released = match self.entries.get_mut(&item_id) {
            Some(entry) => entry.item_ref.release(&cap.version()),
            None => false,
        };
        debug!(safe = %self.id, item = %item_id, released, "transfer capability burned");
        Ok(())
    }

    /// Invalidates every outstanding shared capability for `item_id`.
    ///
    /// # Errors
    ///
    /// [`SafeError::OwnerMismatch`], [`SafeError::ItemNotFound`], or
    /// [`SafeError::AlreadyExclusivelyListed`] while an exclusive grant is
    /// outstanding.
    pub fn delist(&mut self, item_id: &ObjectId, owner_cap: &OwnerCap) -> Result<(), SafeError> {
        self.assert_owner_cap(owner_cap)?;
        let safe_id = self.id;
        self.item_ref_mut(item_id)?.invalidate(item_id)?;
        info!(safe = %safe_id, item = %item_id, "item delisted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether the safe holds `item_id`.
    pub fn has_item(&self, item_id: &ObjectId) -> bool {
        self.entries.contains_key(item_id)
    }

    /// Borrows a held item as a `T`.
    pub fn borrow_item<T: Item>(&self, item_id: &ObjectId) -> Result<&T, SafeError> {
        let entry = self
            .entries
            .get(item_id)
            .ok_or(SafeError::ItemNotFound(*item_id))?;
        entry
            .item
            .downcast_ref::<T>()
            .ok_or_else(|| SafeError::ItemTypeMismatch {
                item: *item_id,
                stored: entry.item_ref.declared_type().clone(),
                requested: TypeName::of::<T>(),
            })
    }

    /// The bookkeeping record for `item_id`.
    pub fn item_ref(&self, item_id: &ObjectId) -> Option<&ItemRef> {
        self.entries.get(item_id).map(|e| &e.item_ref)
    }

    fn item_ref_mut(&mut self, item_id: &ObjectId) -> Result<&mut ItemRef, SafeError> {
        self.entries
            .get_mut(item_id)
            .map(|e| &mut e.item_ref)
            .ok_or(SafeError::ItemNotFound(*item_id))
    }

    /// Takes all notifications journaled since the last drain, in order.
    pub fn drain_events(&mut self) -> Vec<SafeEvent> {
        self.events.drain(..).collect()
    }

    /// Notifications evicted because the journal was full, over the safe's
    /// lifetime.
    pub fn evicted_events(&self) -> u64 {
        self.evicted_events
    }

    /// Appends to the journal, evicting the oldest entry once it is full.
    fn journal(&mut self, event: SafeEvent) {
        if self.events.len() >= self.journal_capacity {
            self.events.pop_front();
            self.evicted_events += 1;
            debug!(safe = %self.id, evicted = self.evicted_events, "event journal full");
        }
        self.events.push_back(event);
    }

    // -----------------------------------------------------------------------
    // Assertions
    // -----------------------------------------------------------------------

    /// Fails unless `owner_cap` administers this safe.
    pub fn assert_owner_cap(&self, owner_cap: &OwnerCap) -> Result<(), SafeError> {
        if owner_cap.safe_id() != self.id {
            return Err(SafeError::OwnerMismatch {
                safe: self.id,
                cap_safe: owner_cap.safe_id(),
            });
        }
        Ok(())
    }

    /// Fails unless `cap` was issued by this safe.
    pub fn assert_transfer_cap_of_safe(&self, cap: &TransferCap) -> Result<(), SafeError> {
        if cap.safe_id() != self.id {
            return Err(SafeError::CapabilityVaultMismatch {
                safe: self.id,
                cap_safe: cap.safe_id(),
            });
        }
        Ok(())
    }

    /// Fails unless the safe holds `item_id`.
    pub fn assert_contains_item(&self, item_id: &ObjectId) -> Result<(), SafeError> {
        if !self.has_item(item_id) {
            return Err(SafeError::ItemNotFound(*item_id));
        }
        Ok(())
    }

    /// Fails if an exclusive capability for `item_id` is outstanding.
    pub fn assert_not_exclusively_listed(&self, item_id: &ObjectId) -> Result<(), SafeError> {
        self.item_ref(item_id)
            .ok_or(SafeError::ItemNotFound(*item_id))?
            .assert_not_exclusive(item_id)
    }

    /// Fails unless `cap` still matches its item's live version.
    pub fn assert_version_match(&self, cap: &TransferCap) -> Result<(), SafeError> {
        self.assert_transfer_cap_of_safe(cap)?;
        let item_ref = self
            .item_ref(&cap.item_id())
            .ok_or(SafeError::ItemNotFound(cap.item_id()))?;
        if item_ref.version() != cap.version() {
            return Err(SafeError::CapabilityExpired(cap.item_id()));
        }
        Ok(())
    }
}
