//! # Allowlist Contract
//!
//! A registry of item collections and marketplace authorities that may move
//! policy-tracked items out of safes. Safes consult it through the
//! [`AuthorizationGate`] trait on every withdrawal.
//!
//! ## Security Model
//!
//! - **Admin gating**: Every mutation requires the [`AllowlistAdminCap`]
//!   minted together with the allowlist. A cap from another allowlist is
//!   rejected with [`AllowlistError::AdminMismatch`].
//! - **Collections**: An item type must be registered before any of its
//!   items can be withdrawn under this allowlist.
//! - **Authorities**: `None` admits every authority; once an authority is
//!   inserted, only registered witness types pass. [`Allowlist::clear_authorities`]
//!   returns to the permissive state.
//!
//! Authorities are identified by the type of the witness value a
//! marketplace passes to [`Safe::withdraw`](safe_protocol::Safe::withdraw),
//! so only code that can construct that type can act as the authority.

use std::collections::BTreeSet;

use safe_protocol::object::{Item, ObjectId, TypeName};
use safe_protocol::safe::{AuthorizationGate, SafeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during allowlist administration.
#[derive(Debug, Error)]
pub enum AllowlistError {
    /// The admin capability belongs to a different allowlist.
    #[error("admin capability is bound to allowlist {cap_allowlist}, not {allowlist}")]
    AdminMismatch {
        /// The allowlist the operation targeted.
        allowlist: ObjectId,
        /// The allowlist the capability administers.
        cap_allowlist: ObjectId,
    },

    /// The configuration document could not be parsed.
    #[error("invalid allowlist config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Authorizes administration of exactly one [`Allowlist`].
#[derive(Debug, PartialEq, Eq)]
pub struct AllowlistAdminCap {
    id: ObjectId,
    allowlist_id: ObjectId,
}

impl AllowlistAdminCap {
    /// The capability's own identifier.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The allowlist this capability administers.
    pub fn allowlist_id(&self) -> ObjectId {
        self.allowlist_id
    }
}

/// Serializable seed for an allowlist.
///
/// ```json
/// {
///   "collections": ["punks::Punk"],
///   "authorities": ["orderbook::Witness"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowlistConfig {
    /// Item types allowed to be transferred.
    pub collections: Vec<TypeName>,
    /// Allowed authorities, or `None` to admit any authority.
    pub authorities: Option<Vec<TypeName>>,
}

impl AllowlistConfig {
    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, AllowlistError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Registry of transferable collections and approved authorities.
#[derive(Debug, Clone)]
pub struct Allowlist {
    id: ObjectId,
    collections: BTreeSet<TypeName>,
    authorities: Option<BTreeSet<TypeName>>,
}

impl Allowlist {
    /// Creates an empty allowlist admitting any authority, and its admin cap.
    pub fn new() -> (Self, AllowlistAdminCap) {
        Self::from_config(&AllowlistConfig::default())
    }

    /// Creates an allowlist seeded from `config`, and its admin cap.
    pub fn from_config(config: &AllowlistConfig) -> (Self, AllowlistAdminCap) {
        let id = ObjectId::random();
        let allowlist = Self {
            id,
            collections: config.collections.iter().cloned().collect(),
            authorities: config
                .authorities
                .as_ref()
                .map(|a| a.iter().cloned().collect()),
        };
        let cap = AllowlistAdminCap {
            id: ObjectId::random(),
            allowlist_id: id,
        };
        info!(
            allowlist = %id,
            collections = allowlist.collections.len(),
            "allowlist created"
        );
        (allowlist, cap)
    }

    /// The allowlist's identifier.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Snapshot of the current contents as a serializable config.
    pub fn to_config(&self) -> AllowlistConfig {
        AllowlistConfig {
            collections: self.collections.iter().cloned().collect(),
            authorities: self
                .authorities
                .as_ref()
                .map(|a| a.iter().cloned().collect()),
        }
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Allows items of type `T` to be transferred.
    pub fn insert_collection<T: Item>(
        &mut self,
        cap: &AllowlistAdminCap,
    ) -> Result<(), AllowlistError> {
        self.assert_admin(cap)?;
        let name = TypeName::of::<T>();
        debug!(allowlist = %self.id, collection = %name, "collection allowed");
        self.collections.insert(name);
        Ok(())
    }

    /// Stops allowing items of type `T` to be transferred.
    pub fn remove_collection<T: Item>(
        &mut self,
        cap: &AllowlistAdminCap,
    ) -> Result<(), AllowlistError> {
        self.assert_admin(cap)?;
        let name = TypeName::of::<T>();
        debug!(allowlist = %self.id, collection = %name, "collection removed");
        self.collections.remove(&name);
        Ok(())
    }

    /// Registers witness type `W` as an approved authority.
    ///
    /// The first insertion switches the allowlist from admitting any
    /// authority to admitting only registered ones.
    pub fn insert_authority<W: 'static>(
        &mut self,
        cap: &AllowlistAdminCap,
    ) -> Result<(), AllowlistError> {
        self.assert_admin(cap)?;
        let name = TypeName::of::<W>();
        debug!(allowlist = %self.id, authority = %name, "authority allowed");
        self.authorities.get_or_insert_with(BTreeSet::new).insert(name);
        Ok(())
    }

    /// Unregisters witness type `W`.
    ///
    /// Removing the last authority leaves an empty set, which admits nobody.
    pub fn remove_authority<W: 'static>(
        &mut self,
        cap: &AllowlistAdminCap,
    ) -> Result<(), AllowlistError> {
        self.assert_admin(cap)?;
        let name = TypeName::of::<W>();
        if let Some(authorities) = self.authorities.as_mut() {
            authorities.remove(&name);
        }
        debug!(allowlist = %self.id, authority = %name, "authority removed");
        Ok(())
    }

    /// Drops the authority set so any authority is admitted again.
    pub fn clear_authorities(&mut self, cap: &AllowlistAdminCap) -> Result<(), AllowlistError> {
        self.assert_admin(cap)?;
        self.authorities = None;
        info!(allowlist = %self.id, "authority restrictions cleared");
        Ok(())
    }

    fn assert_admin(&self, cap: &AllowlistAdminCap) -> Result<(), AllowlistError> {
        if cap.allowlist_id != self.id {
            return Err(AllowlistError::AdminMismatch {
                allowlist: self.id,
                cap_allowlist: cap.allowlist_id,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether `collection` is registered.
    pub fn contains_collection(&self, collection: &TypeName) -> bool {
        self.collections.contains(collection)
    }

    /// Whether `authority` is admitted.
    pub fn contains_authority(&self, authority: &TypeName) -> bool {
        match &self.authorities {
            None => true,
            Some(authorities) => authorities.contains(authority),
        }
    }

    /// Whether an item of type `T` may leave a safe under this allowlist,
    /// independent of who asks.
    pub fn can_be_transferred<T: Item>(&self) -> bool {
        !T::POLICY_TRACKED || self.contains_collection(&TypeName::of::<T>())
    }
}

impl AuthorizationGate for Allowlist {
    fn assert_item_type_allowed(&self, declared_type: &TypeName) -> Result<(), SafeError> {
        if !self.contains_collection(declared_type) {
            return Err(SafeError::TypeNotAllowed(declared_type.clone()));
        }
        Ok(())
    }

    fn assert_authority_allowed(&self, authority: &TypeName) -> Result<(), SafeError> {
        if !self.contains_authority(authority) {
            return Err(SafeError::AuthorityNotAllowed(authority.clone()));
        }
        Ok(())
    }
}
