// The boolean algebra of state evaluation (spec §4.2)

//! # State Evaluator
//!
//! `StateEvaluator` is a recursive tree, analogous to
//! `circuit_breaker::models::rule::RuleCondition::And`/`Or`, except the
//! tree is shaped to match spec §3's "single leaf descriptor, or a list of
//! children" structure rather than an arbitrary condition enum. Children
//! are owned by value in a `Vec`, never behind a shared pointer, so the
//! tree can't contain cycles by construction (spec §9, "Tree ownership").

use super::descriptor::{Event, StateDescriptor, StateValueSource, ValueOperator};
use super::ids::ThingId;
use crate::engine::ports::ThingManager;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicOperator {
    And,
    Or,
}

/// One node of the state evaluator tree: either a leaf `StateDescriptor`, or
/// a list of child evaluators, combined with `operator`. Both a descriptor
/// and children may be absent -- that's the "empty evaluator" case, which
/// always evaluates to `true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateEvaluator {
    pub state_descriptor: Option<StateDescriptor>,
    pub child_evaluators: Vec<StateEvaluator>,
    pub operator: LogicOperatorField,
}

/// Wraps `LogicOperator` with a default of `And`, matching how an
/// evaluator built without an explicit operator should behave when
/// deserialized from persisted rules that predate an operator field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicOperatorField(pub LogicOperator);

impl Default for LogicOperatorField {
    fn default() -> Self {
        LogicOperatorField(LogicOperator::And)
    }
}

impl StateEvaluator {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn leaf(descriptor: StateDescriptor) -> Self {
        Self {
            state_descriptor: Some(descriptor),
            child_evaluators: vec![],
            operator: LogicOperatorField(LogicOperator::And),
        }
    }

    pub fn group(operator: LogicOperator, children: Vec<StateEvaluator>) -> Self {
        Self {
            state_descriptor: None,
            child_evaluators: children,
            operator: LogicOperatorField(operator),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state_descriptor.is_none() && self.child_evaluators.is_empty()
    }

    /// Side-effect free boolean evaluation against live thing state,
    /// per spec §4.2.
    pub fn evaluate(&self, things: &dyn ThingManager) -> bool {
        if self.is_empty() {
            return true;
        }

        if let Some(descriptor) = &self.state_descriptor {
            let matches = Self::evaluate_descriptor(descriptor, things);
            match self.operator.0 {
                LogicOperator::And if !matches => return false,
                LogicOperator::Or if matches => return true,
                _ => {}
            }
        }

        match self.operator.0 {
            LogicOperator::And => self
                .child_evaluators
                .iter()
                .all(|child| child.evaluate(things)),
            LogicOperator::Or => self
                .child_evaluators
                .iter()
                .any(|child| child.evaluate(things)),
        }
    }

    fn evaluate_descriptor(descriptor: &StateDescriptor, things: &dyn ThingManager) -> bool {
        match descriptor {
            StateDescriptor::ThingBound {
                state_type_id,
                thing_id,
                operator,
                value,
            } => {
                let Some(current) = things.state_value(*thing_id, *state_type_id) else {
                    tracing::warn!(%thing_id, %state_type_id, "state evaluator: state value unavailable");
                    return false;
                };
                Self::compare(&current, operator, value, things)
            }
            StateDescriptor::InterfaceBound {
                interface_name,
                interface_state,
                operator,
                value,
            } => things.things_implementing(interface_name).iter().any(|thing| {
                let Some(class) = things.thing_class(thing.thing_class_id) else {
                    return false;
                };
                let Some(state_type) = class.state_type_by_name(interface_state) else {
                    return false;
                };
                let synthesized = StateDescriptor::ThingBound {
                    state_type_id: state_type.id,
                    thing_id: thing.id,
                    operator: *operator,
                    value: value.clone(),
                };
                Self::evaluate_descriptor(&synthesized, things)
            }),
        }
    }

    fn compare(
        current: &serde_json::Value,
        operator: &ValueOperator,
        value: &StateValueSource,
        things: &dyn ThingManager,
    ) -> bool {
        match value {
            StateValueSource::Literal(literal) => operator.apply(current, literal),
            StateValueSource::StateRef {
                value_thing_id,
                value_state_type_id,
            } => match things.state_value(*value_thing_id, *value_state_type_id) {
                Some(other) => operator.apply(current, &other),
                None => {
                    tracing::warn!(
                        thing_id = %value_thing_id,
                        state_type_id = %value_state_type_id,
                        "state evaluator: referenced state unavailable"
                    );
                    false
                }
            },
        }
    }

    pub fn contains_thing(&self, id: ThingId) -> bool {
        let self_match = matches!(
            &self.state_descriptor,
            Some(StateDescriptor::ThingBound { thing_id, .. }) if *thing_id == id
        );
        self_match
            || self
                .child_evaluators
                .iter()
                .any(|child| child.contains_thing(id))
    }

    pub fn contained_things(&self) -> Vec<ThingId> {
        let mut out = vec![];
        if let Some(StateDescriptor::ThingBound { thing_id, .. }) = &self.state_descriptor {
            out.push(*thing_id);
        }
        for child in &self.child_evaluators {
            out.extend(child.contained_things());
        }
        out
    }

    /// Remove any subtree referencing `id`, recursively. Returns `true` if
    /// this node itself should be dropped by its parent (because its own
    /// descriptor referenced the thing and it has no children left).
    pub fn remove_thing(&mut self, id: ThingId) -> bool {
        let self_references = matches!(
            &self.state_descriptor,
            Some(StateDescriptor::ThingBound { thing_id, .. }) if *thing_id == id
        );
        if self_references {
            self.state_descriptor = None;
        }
        self.child_evaluators.retain_mut(|child| !child.remove_thing(id));
        self.is_empty()
    }

    /// Whether an incoming event (which may be a synthesized state-change
    /// pseudo-event) could affect this evaluator's outcome (spec §4.2).
    pub fn contains_state(&self, event: &Event, things: &dyn ThingManager) -> bool {
        let self_match = match &self.state_descriptor {
            Some(StateDescriptor::ThingBound { state_type_id, thing_id, .. }) => {
                *state_type_id == super::ids::StateTypeId::from(event.event_type_id.as_uuid())
                    && *thing_id == event.thing_id
            }
            Some(StateDescriptor::InterfaceBound { interface_name, interface_state, .. }) => {
                things.things_implementing(interface_name).iter().any(|thing| {
                    thing.id == event.thing_id
                        && things
                            .thing_class(thing.thing_class_id)
                            .map(|class| {
                                class
                                    .state_type_by_name(interface_state)
                                    .map(|state_type| {
                                        state_type.id
                                            == super::ids::StateTypeId::from(
                                                event.event_type_id.as_uuid(),
                                            )
                                    })
                                    .unwrap_or(false)
                            })
                            .unwrap_or(false)
                })
            }
            None => false,
        };
        self_match
            || self
                .child_evaluators
                .iter()
                .any(|child| child.contains_state(event, things))
    }
}
