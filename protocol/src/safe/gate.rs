//! The authorization gate consulted on withdrawal.
//!
//! The safe does not own any transfer policy. It asks an
//! [`AuthorizationGate`] two questions, synchronously and without side
//! effects: may items of this type move, and may this authority move them?
//! The allowlist contract is the production implementation.

use crate::object::TypeName;

use super::error::SafeError;

/// A pure decision function over item types and caller authorities.
pub trait AuthorizationGate {
    /// Fails with [`SafeError::TypeNotAllowed`] unless `declared_type` may be
    /// transferred.
    fn assert_item_type_allowed(&self, declared_type: &TypeName) -> Result<(), SafeError>;

    /// Fails with [`SafeError::AuthorityNotAllowed`] unless `authority` may
    /// initiate transfers.
    fn assert_authority_allowed(&self, authority: &TypeName) -> Result<(), SafeError>;
}

impl<G: AuthorizationGate + ?Sized> AuthorizationGate for &G {
    fn assert_item_type_allowed(&self, declared_type: &TypeName) -> Result<(), SafeError> {
        (**self).assert_item_type_allowed(declared_type)
    }

    fn assert_authority_allowed(&self, authority: &TypeName) -> Result<(), SafeError> {
        (**self).assert_authority_allowed(authority)
    }
}

/// Runs both gate checks for a withdrawal by `authority`.
///
/// Items whose type is not policy-tracked skip the gate entirely.
pub(crate) fn authorize<G: AuthorizationGate + ?Sized>(
    gate: &G,
    policy_tracked: bool,
    declared_type: &TypeName,
    authority: &TypeName,
) -> Result<(), SafeError> {
    if !policy_tracked {
        return Ok(());
    }
    gate.assert_item_type_allowed(declared_type)?;
    gate.assert_authority_allowed(authority)
}
