//! Notifications emitted by safes.
//!
//! Events are journaled on the safe at the moment of the state change and
//! handed out in order by [`Safe::drain_events`](super::Safe::drain_events).
//! Nothing inside the protocol consumes them.

use serde::{Deserialize, Serialize};

use crate::object::ObjectId;

/// An observable state change of a safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SafeEvent {
    /// An item entered the safe.
    Deposited {
        /// The receiving safe.
        safe_id: ObjectId,
        /// The deposited item.
        item_id: ObjectId,
    },
    /// An item left the safe through a transfer capability.
    Withdrawn {
        /// The releasing safe.
        safe_id: ObjectId,
        /// The withdrawn item.
        item_id: ObjectId,
    },
}

impl SafeEvent {
    /// The safe the event belongs to.
    pub fn safe_id(&self) -> ObjectId {
        match self {
            SafeEvent::Deposited { safe_id, .. } | SafeEvent::Withdrawn { safe_id, .. } => *safe_id,
        }
    }

    /// The item the event is about.
    pub fn item_id(&self) -> ObjectId {
        match self {
            SafeEvent::Deposited { item_id, .. } | SafeEvent::Withdrawn { item_id, .. } => *item_id,
        }
    }
}
