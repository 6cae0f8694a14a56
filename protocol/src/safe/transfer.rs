//! Withdraw-then-deliver compositions.
//!
//! Both transfers validate everything that can fail before the item leaves
//! the source safe. Once the withdrawal commits, delivery cannot fail, so a
//! transfer is either fully applied or not applied at all.

use tracing::{info, warn};

use crate::object::Item;

use super::capability::TransferCap;
use super::error::Rejected;
use super::gate::AuthorizationGate;
use super::vault::Safe;

/// Takes custody of items handed out of a safe.
///
/// Delivery is infallible: a recipient must accept every item it is given.
pub trait Recipient {
    /// Receives a withdrawn item.
    fn receive<T: Item>(&mut self, item: T);
}

/// Withdraws the item `cap` is bound to and hands it to `recipient`.
///
/// # Errors
///
/// Any withdrawal failure; the capability comes back in [`Rejected`] and the
/// recipient is never called.
pub fn transfer_to_recipient<T, W, G, R>(
    cap: TransferCap,
    authority: &W,
    gate: &G,
    safe: &mut Safe,
    recipient: &mut R,
) -> Result<(), Rejected<TransferCap>>
where
    T: Item,
    W: 'static,
    G: AuthorizationGate + ?Sized,
    R: Recipient,
{
    let item: T = safe.withdraw(cap, authority, gate)?;
    recipient.receive(item);
    Ok(())
}

/// Moves the item `cap` is bound to from `source` into `target`.
///
/// Checks run in a fixed order: the capability against `source` first, then
/// the target's deposit restrictions and id uniqueness. Both pass before the
/// withdrawal commits, so the item is never held by both safes or by neither.
pub fn transfer_to_safe<T, W, G>(
    cap: TransferCap,
    authority: &W,
    gate: &G,
    source: &mut Safe,
    target: &mut Safe,
) -> Result<(), Rejected<TransferCap>>
where
    T: Item,
    W: 'static,
    G: AuthorizationGate + ?Sized,
{
    let check = source
        .assert_withdrawable::<T, W, G>(&cap, gate)
        .and_then(|_| target.assert_accepts::<T>(&cap.item_id(), false));
    if let Err(e) = check {
        warn!(
            source = %source.id(),
            target = %target.id(),
            item = %cap.item_id(),
            error = %e,
            "transfer rejected"
        );
        return Err(Rejected::new(e, cap));
    }

    let item: T = source.withdraw(cap, authority, gate)?;
    let item_id = item.id();
    target.store(item);
    info!(source = %source.id(), target = %target.id(), item = %item_id, "item moved between safes");
    Ok(())
}
