// Opaque identifier types for the rule engine domain

//! # Identifier Types
//!
//! Every addressable entity in the rule engine — rules, things, event types,
//! state types, action types, and action parameters — is identified by a
//! version-4 UUID. Each gets its own newtype so the compiler rejects passing
//! a `ThingId` where a `RuleId` is expected, the same way `circuit_breaker`
//! keeps `StateId` and `ActivityId` distinct despite both wrapping a string.
//!
//! Unlike `StateId`/`ActivityId` (string wrappers, because workflow state
//! names are human-authored), these wrap `Uuid` directly per the data
//! model's "128-bit opaque tokens" requirement.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(RuleId);
uuid_id!(ThingId);
uuid_id!(EventTypeId);
uuid_id!(StateTypeId);
uuid_id!(ActionTypeId);
uuid_id!(ParamTypeId);
