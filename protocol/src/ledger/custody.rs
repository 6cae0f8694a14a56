//! Address custody for items that leave the safe system.

use std::any::Any;
use std::collections::HashMap;

use dashmap::mapref::one::RefMut;
use tracing::info;

use crate::object::{Address, Item, ObjectId, TypeName};
use crate::safe::Recipient;

/// A type-erased item held by an address.
pub(crate) struct OwnedObject {
    declared_type: TypeName,
    value: Box<dyn Any + Send + Sync>,
}

impl OwnedObject {
    fn new<T: Item>(item: T) -> Self {
        Self {
            declared_type: TypeName::of::<T>(),
            value: Box::new(item),
        }
    }

    pub(crate) fn declared_type(&self) -> &TypeName {
        &self.declared_type
    }

    /// Unwraps the item as a `T`, or hands the object back unchanged.
    pub(crate) fn into_inner<T: Item>(self) -> Result<T, Self> {
        match self.value.downcast::<T>() {
            Ok(item) => Ok(*item),
            Err(value) => Err(Self {
                declared_type: self.declared_type,
                value,
            }),
        }
    }
}

/// Delivers withdrawn items into one address's custody on a
/// [`Ledger`](super::Ledger).
///
/// Holds the address's custody entry locked for its whole lifetime, so a
/// uniqueness check and the delivery that follows it cannot interleave with
/// another transfer to the same address.
pub struct AddressCustody<'a> {
    address: Address,
    objects: RefMut<'a, Address, HashMap<ObjectId, OwnedObject>>,
}

impl<'a> AddressCustody<'a> {
    pub(crate) fn new(
        address: Address,
        objects: RefMut<'a, Address, HashMap<ObjectId, OwnedObject>>,
    ) -> Self {
        Self { address, objects }
    }

    /// The receiving address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Whether the address already holds an item with this id.
    pub fn holds(&self, item_id: &ObjectId) -> bool {
        self.objects.contains_key(item_id)
    }
}

impl Recipient for AddressCustody<'_> {
    fn receive<T: Item>(&mut self, item: T) {
        let item_id: ObjectId = item.id();
        self.objects.insert(item_id, OwnedObject::new(item));
        info!(owner = %self.address, item = %item_id, "item delivered to address");
    }
}
