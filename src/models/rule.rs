// The Rule aggregate and its runtime activity state (spec §3, §4.8)

use super::action::RuleAction;
use super::descriptor::EventDescriptor;
use super::evaluator::StateEvaluator;
use super::ids::{RuleId, ThingId};
use super::time::TimeDescriptor;
use serde::{Deserialize, Serialize};

/// The derived runtime flags that together decide whether a rule is
/// "active" (spec §4.8): each axis defaults to `true` when that rule has no
/// descriptor of that kind, so a rule with only event descriptors is
/// considered always state- and time-active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleActivity {
    pub states_active: bool,
    pub time_active: bool,
}

impl RuleActivity {
    pub fn active(&self) -> bool {
        self.states_active && self.time_active
    }
}

/// A persisted rule: the triggers, condition tree, and actions that make up
/// one reactive unit, plus bookkeeping fields mirroring nymea's `Rule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub enabled: bool,
    /// False once `execute_actions` has been invoked and failed validation
    /// (spec §4.1.6) badly enough to be permanently unexecutable; distinct
    /// from `enabled`, which the user controls directly.
    pub executable: bool,
    pub event_descriptors: Vec<EventDescriptor>,
    pub state_evaluator: StateEvaluator,
    pub time_descriptor: TimeDescriptor,
    pub actions: Vec<RuleAction>,
    pub exit_actions: Vec<RuleAction>,
    #[serde(default)]
    pub activity: RuleActivity,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RuleId::new(),
            name: name.into(),
            enabled: true,
            executable: true,
            event_descriptors: vec![],
            state_evaluator: StateEvaluator::empty(),
            time_descriptor: TimeDescriptor::default(),
            actions: vec![],
            exit_actions: vec![],
            activity: RuleActivity {
                states_active: true,
                time_active: true,
            },
        }
    }

    pub fn with_event_descriptors(mut self, descriptors: Vec<EventDescriptor>) -> Self {
        self.event_descriptors = descriptors;
        self
    }

    pub fn with_state_evaluator(mut self, evaluator: StateEvaluator) -> Self {
        self.state_evaluator = evaluator;
        self
    }

    pub fn with_time_descriptor(mut self, descriptor: TimeDescriptor) -> Self {
        self.time_descriptor = descriptor;
        self
    }

    pub fn with_actions(mut self, actions: Vec<RuleAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_exit_actions(mut self, exit_actions: Vec<RuleAction>) -> Self {
        self.exit_actions = exit_actions;
        self
    }

    /// True if this rule is purely event-triggered: no state evaluator and
    /// no calendar items, only (optionally) instantaneous time events. Such
    /// rules never enter a persistent "active" state -- each trigger runs
    /// entry actions once and nothing else (spec §4.8).
    pub fn is_event_based(&self) -> bool {
        self.state_evaluator.is_empty() && self.time_descriptor.calendar_items.is_empty()
    }

    pub fn contains_thing(&self, thing_id: ThingId) -> bool {
        self.event_descriptors.iter().any(|d| {
            matches!(d, EventDescriptor::ThingBound { thing_id: t, .. } if *t == thing_id)
        }) || self.state_evaluator.contains_thing(thing_id)
            || self.actions.iter().any(|a| action_references_thing(a, thing_id))
            || self
                .exit_actions
                .iter()
                .any(|a| action_references_thing(a, thing_id))
    }
}

fn action_references_thing(action: &RuleAction, thing_id: ThingId) -> bool {
    match action {
        RuleAction::Thing {
            thing_id: t, params, ..
        } => {
            *t == thing_id
                || params.iter().any(|p| {
                    matches!(p, super::action::RuleActionParam::StateBased { state_thing_id, .. } if *state_thing_id == thing_id)
                })
        }
        RuleAction::Interface { params, .. } => params.iter().any(|p| {
            matches!(p, super::action::RuleActionParam::StateBased { state_thing_id, .. } if *state_thing_id == thing_id)
        }),
        RuleAction::Browser { thing_id: t, .. } => *t == thing_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::descriptor::{StateDescriptor, StateValueSource, ValueOperator};
    use crate::models::ids::StateTypeId;

    #[test]
    fn fresh_rule_defaults_to_fully_active() {
        let rule = Rule::new("porch light on motion");
        assert!(rule.activity.active());
        assert!(rule.is_event_based());
    }

    #[test]
    fn state_based_rule_is_not_event_based() {
        let thing_id = ThingId::new();
        let rule = Rule::new("too hot").with_state_evaluator(StateEvaluator::leaf(
            StateDescriptor::ThingBound {
                state_type_id: StateTypeId::new(),
                thing_id,
                operator: ValueOperator::Greater,
                value: StateValueSource::Literal(serde_json::json!(28)),
            },
        ));
        assert!(!rule.is_event_based());
        assert!(rule.contains_thing(thing_id));
    }
}
