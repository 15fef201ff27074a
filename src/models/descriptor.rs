// Event and state descriptors -- the matching vocabulary rules are built from

//! # Descriptor Types
//!
//! `EventDescriptor` and `StateDescriptor` are tagged unions, following the
//! same pattern `circuit_breaker::models::rule::RuleCondition` uses for its
//! recursive condition tree: each variant carries exactly the fields that
//! form of descriptor needs, and matching is done with `match` rather than
//! virtual dispatch.

use super::ids::{ActionTypeId, EventTypeId, ParamTypeId, StateTypeId, ThingId};
use serde::{Deserialize, Serialize};

/// Comparison operator used by `ParamDescriptor` and `StateDescriptor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueOperator {
    Equals,
    NotEquals,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl ValueOperator {
    /// Apply this operator to a partially-ordered pair of JSON values.
    ///
    /// Numeric comparisons coerce both sides to `f64`; everything else falls
    /// back to structural equality, which only supports `Equals`/`NotEquals`.
    pub fn apply(&self, lhs: &serde_json::Value, rhs: &serde_json::Value) -> bool {
        if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
            return match self {
                ValueOperator::Equals => a == b,
                ValueOperator::NotEquals => a != b,
                ValueOperator::Greater => a > b,
                ValueOperator::GreaterOrEqual => a >= b,
                ValueOperator::Less => a < b,
                ValueOperator::LessOrEqual => a <= b,
            };
        }
        match self {
            ValueOperator::Equals => lhs == rhs,
            ValueOperator::NotEquals => lhs != rhs,
            // Ordering on non-numeric values (bool, string, object) is undefined;
            // treat as non-matching rather than panicking.
            _ => false,
        }
    }
}

/// References a parameter either by id or by name. Exactly one is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub id: Option<ParamTypeId>,
    pub name: Option<String>,
    pub value: serde_json::Value,
    pub operator: ValueOperator,
}

impl ParamDescriptor {
    pub fn by_id(id: ParamTypeId, value: serde_json::Value, operator: ValueOperator) -> Self {
        Self {
            id: Some(id),
            name: None,
            value,
            operator,
        }
    }

    pub fn by_name(
        name: impl Into<String>,
        value: serde_json::Value,
        operator: ValueOperator,
    ) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            value,
            operator,
        }
    }

    /// Invariant from spec §3: exactly one of `id`/`name` is populated.
    pub fn is_valid(&self) -> bool {
        self.id.is_some() != self.name.is_some()
    }
}

/// A runtime param (event param or action param) resolved to a concrete value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamValue {
    pub id: ParamTypeId,
    pub name: String,
    pub value: serde_json::Value,
}

/// A single runtime event delivered by the Thing Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type_id: EventTypeId,
    pub thing_id: ThingId,
    pub params: Vec<ParamValue>,
}

impl Event {
    pub fn param_value(&self, param_id: ParamTypeId) -> Option<&serde_json::Value> {
        self.params
            .iter()
            .find(|p| p.id == param_id)
            .map(|p| &p.value)
    }

    pub fn param_value_by_name(&self, name: &str) -> Option<&serde_json::Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

/// Matches either a thing-bound event/state-change, or any thing implementing
/// a named interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventDescriptor {
    /// Matches `eventTypeId` on a specific `thingId`. A state type's id may
    /// also appear here to match the synthetic state-change pseudo-event.
    ThingBound {
        event_type_id: EventTypeId,
        thing_id: ThingId,
        param_descriptors: Vec<ParamDescriptor>,
    },
    /// Matches any thing implementing `interface_name`, firing
    /// `interface_event`.
    InterfaceBound {
        interface_name: String,
        interface_event: String,
        param_descriptors: Vec<ParamDescriptor>,
    },
}

impl EventDescriptor {
    pub fn param_descriptors(&self) -> &[ParamDescriptor] {
        match self {
            EventDescriptor::ThingBound {
                param_descriptors, ..
            } => param_descriptors,
            EventDescriptor::InterfaceBound {
                param_descriptors, ..
            } => param_descriptors,
        }
    }
}

/// The source of a state's comparison value: a literal, or a live reference
/// to another thing's current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StateValueSource {
    Literal(serde_json::Value),
    StateRef {
        value_thing_id: ThingId,
        value_state_type_id: StateTypeId,
    },
}

/// Matches a thing's current state value against a literal or another
/// thing's live state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StateDescriptor {
    ThingBound {
        state_type_id: StateTypeId,
        thing_id: ThingId,
        operator: ValueOperator,
        value: StateValueSource,
    },
    InterfaceBound {
        interface_name: String,
        interface_state: String,
        operator: ValueOperator,
        value: StateValueSource,
    },
}

/// Identifies the action type a `RuleAction` targets, thing- or
/// interface-bound, mirroring the event/state descriptor split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTarget {
    pub action_type_id: ActionTypeId,
}
