//! Items and their declared types.
//!
//! Anything that can sit in a safe implements [`Item`]. The protocol never
//! constructs items and never looks inside them beyond the identifier; the
//! declared [`TypeName`] is captured at deposit time and drives the
//! allowlist check on withdrawal.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

use super::id::ObjectId;

// ---------------------------------------------------------------------------
// TypeName
// ---------------------------------------------------------------------------

/// The runtime type tag of an item or an authority witness.
///
/// Derived from [`std::any::type_name`] for in-process values. Allowlists
/// store these, so they serialize as plain strings and can be written by
/// hand in configuration files.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    /// The type name of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// Returns the type name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TypeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A uniquely identified asset that can be deposited into a safe.
///
/// `POLICY_TRACKED` decides whether withdrawals consult the authorization
/// gate. Protocol collections leave it at `true`; arbitrary third-party
/// types set it to `false` and move freely between safes.
pub trait Item: Any + Send + Sync {
    /// Whether withdrawals of this type are gated by the allowlist.
    const POLICY_TRACKED: bool = true;

    /// The item's unique identifier.
    fn id(&self) -> ObjectId;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Punk;
    struct Sword;

    #[test]
    fn type_names_distinguish_types() {
        assert_ne!(TypeName::of::<Punk>(), TypeName::of::<Sword>());
        assert_eq!(TypeName::of::<Punk>(), TypeName::of::<Punk>());
        assert!(TypeName::of::<Punk>().as_str().ends_with("Punk"));
    }

    #[test]
    fn type_name_serializes_as_string() {
        let name = TypeName::from("punks::Punk");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"punks::Punk\"");
    }
}
