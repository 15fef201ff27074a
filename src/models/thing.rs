// Thing Manager contract surface -- the read-only schema data the rule
// engine needs from its external collaborator, never the collaborator
// itself (spec §6.1 treats the Thing Manager as a consumed port).

use super::ids::{ActionTypeId, EventTypeId, ParamTypeId, StateTypeId, ThingId};
use serde::{Deserialize, Serialize};

/// The declared JSON type of a parameter or state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Double,
    String,
}

impl ValueType {
    /// Coerce a literal into this type, following the same permissive
    /// numeric-widening rule `RuleCondition::FieldGreaterThan` in the
    /// teacher repo relies on (`as_f64()`), extended to bool/string.
    pub fn coerce(&self, value: &serde_json::Value) -> Option<serde_json::Value> {
        match self {
            ValueType::Bool => value.as_bool().map(serde_json::Value::from),
            ValueType::Int => value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f as i64))
                .map(serde_json::Value::from),
            ValueType::Double => value.as_f64().map(serde_json::Value::from),
            ValueType::String => value.as_str().map(|s| serde_json::Value::from(s.to_string())),
        }
    }
}

/// Declares one parameter of an event, state, or action type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamTypeSpec {
    pub id: ParamTypeId,
    pub name: String,
    pub value_type: ValueType,
    pub default_value: Option<serde_json::Value>,
}

/// Declares a state type: its value domain and optional range/enumeration
/// constraints, used by rule validation (spec §4.1.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTypeSpec {
    pub id: StateTypeId,
    pub name: String,
    pub value_type: ValueType,
    pub min_value: Option<serde_json::Value>,
    pub max_value: Option<serde_json::Value>,
    pub possible_values: Vec<serde_json::Value>,
}

impl StateTypeSpec {
    /// Coerce and range/enum-check a literal per spec §4.1.4.
    pub fn validate_literal(&self, literal: &serde_json::Value) -> Option<serde_json::Value> {
        let coerced = self.value_type.coerce(literal)?;

        if !self.possible_values.is_empty() && !self.possible_values.contains(&coerced) {
            return None;
        }

        if let (Some(min), Some(v)) = (self.min_value.as_ref().and_then(|m| m.as_f64()), coerced.as_f64()) {
            if v < min {
                return None;
            }
        }
        if let (Some(max), Some(v)) = (self.max_value.as_ref().and_then(|m| m.as_f64()), coerced.as_f64()) {
            if v > max {
                return None;
            }
        }

        Some(coerced)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTypeSpec {
    pub id: EventTypeId,
    pub name: String,
    pub param_types: Vec<ParamTypeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTypeSpec {
    pub id: ActionTypeId,
    pub name: String,
    pub param_types: Vec<ParamTypeSpec>,
}

/// A thing class: the schema shared by every `Thing` instance of this class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThingClass {
    pub id: uuid::Uuid,
    pub name: String,
    pub interfaces: Vec<String>,
    pub event_types: Vec<EventTypeSpec>,
    pub state_types: Vec<StateTypeSpec>,
    pub action_types: Vec<ActionTypeSpec>,
}

impl ThingClass {
    pub fn event_type(&self, id: EventTypeId) -> Option<&EventTypeSpec> {
        self.event_types.iter().find(|e| e.id == id)
    }

    pub fn state_type(&self, id: StateTypeId) -> Option<&StateTypeSpec> {
        self.state_types.iter().find(|s| s.id == id)
    }

    pub fn action_type(&self, id: ActionTypeId) -> Option<&ActionTypeSpec> {
        self.action_types.iter().find(|a| a.id == id)
    }

    pub fn state_type_by_name(&self, name: &str) -> Option<&StateTypeSpec> {
        self.state_types.iter().find(|s| s.name == name)
    }

    pub fn event_type_by_name(&self, name: &str) -> Option<&EventTypeSpec> {
        self.event_types.iter().find(|e| e.name == name)
    }

    pub fn action_type_by_name(&self, name: &str) -> Option<&ActionTypeSpec> {
        self.action_types.iter().find(|a| a.name == name)
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }
}

/// A configured device instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing {
    pub id: ThingId,
    pub name: String,
    pub thing_class_id: uuid::Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_state() -> StateTypeSpec {
        StateTypeSpec {
            id: StateTypeId::new(),
            name: "intState".into(),
            value_type: ValueType::Int,
            min_value: Some(serde_json::json!(0)),
            max_value: Some(serde_json::json!(100)),
            possible_values: vec![],
        }
    }

    #[test]
    fn validate_literal_in_range() {
        let spec = int_state();
        assert_eq!(spec.validate_literal(&serde_json::json!(50)), Some(serde_json::json!(50)));
    }

    #[test]
    fn validate_literal_out_of_range_fails() {
        let spec = int_state();
        assert_eq!(spec.validate_literal(&serde_json::json!(200)), None);
    }

    #[test]
    fn validate_literal_enforces_possible_values() {
        let mut spec = int_state();
        spec.possible_values = vec![serde_json::json!(1), serde_json::json!(2)];
        assert_eq!(spec.validate_literal(&serde_json::json!(1)), Some(serde_json::json!(1)));
        assert_eq!(spec.validate_literal(&serde_json::json!(3)), None);
    }

    #[test]
    fn coerce_string_fails_for_int_type() {
        let spec = int_state();
        assert_eq!(spec.validate_literal(&serde_json::json!("nope")), None);
    }
}
