//! # Protocol Configuration & Constants
//!
//! Every fixed parameter of the Safe protocol lives here, next to the
//! tunable configuration structs for safes and the ledger. If you're
//! hardcoding a length or a domain tag somewhere else, move it here.

use serde::{Deserialize, Serialize};

use crate::object::TypeName;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The protocol version string, reported in logs and serialized snapshots.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Identifier Parameters
// ---------------------------------------------------------------------------

/// Length of every object identifier (safes, caps, items) in bytes.
pub const OBJECT_ID_LENGTH: usize = 32;

/// Length of a version (epoch) token in bytes.
pub const VERSION_TOKEN_LENGTH: usize = 32;

/// BLAKE3 `derive_key` context for version tokens. A version can never
/// collide with a plain hash of the same bytes.
pub const VERSION_DERIVATION_CONTEXT: &str = "safe-protocol 2026-01-01 item version token v1";

/// Number of random bytes mixed into each version token.
pub const VERSION_ENTROPY_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Ledger Parameters
// ---------------------------------------------------------------------------

/// Default number of notifications retained in the ledger log before the
/// oldest entries are evicted.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 10_000;

// ---------------------------------------------------------------------------
// Safe Parameters
// ---------------------------------------------------------------------------

/// Default number of undrained notifications a safe keeps before evicting
/// the oldest.
pub const DEFAULT_EVENT_JOURNAL_CAPACITY: usize = 1_024;

/// Smallest journal a safe will run with. One operation journals at most two
/// notifications (a same-safe withdraw and redeposit), and the ledger drains
/// after every operation.
pub const MIN_EVENT_JOURNAL_CAPACITY: usize = 2;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Initial deposit policy for a newly created safe.
///
/// The default accepts deposits of any item type, which is what most owners
/// want. Owners who only want specific collections landing in their safe
/// start restricted and list the collections they accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeConfig {
    /// Accept deposits of every item type.
    pub enable_any_deposit: bool,

    /// Item types accepted while `enable_any_deposit` is off.
    pub enabled_collections: Vec<TypeName>,

    /// Undrained notifications kept before the oldest are evicted. Values
    /// below [`MIN_EVENT_JOURNAL_CAPACITY`] are raised to it.
    pub event_journal_capacity: usize,
}

impl Default for SafeConfig {
    fn default() -> Self {
        Self {
            enable_any_deposit: true,
            enabled_collections: Vec::new(),
            event_journal_capacity: DEFAULT_EVENT_JOURNAL_CAPACITY,
        }
    }
}

/// Tunable parameters for the in-process [`Ledger`](crate::ledger::Ledger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum notifications kept in the sequenced event log.
    pub event_log_capacity: usize,

    /// Policy applied to safes created through [`Ledger::create_safe`](crate::ledger::Ledger::create_safe).
    pub safe: SafeConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            safe: SafeConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Parses a ledger configuration from JSON. Missing fields take their
    /// default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
