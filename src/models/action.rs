// Rule actions and their parameter bindings (spec §4.7)

use super::descriptor::ParamValue;
use super::ids::{ActionTypeId, EventTypeId, ParamTypeId, StateTypeId, ThingId};
use serde::{Deserialize, Serialize};

/// Where one action parameter's runtime value comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RuleActionParam {
    /// A fixed value baked into the rule.
    Value {
        param_type_id: ParamTypeId,
        value: serde_json::Value,
    },
    /// Copied from the param of the event that triggered this execution.
    /// Only valid on entry actions triggered by an event (spec §4.1.5).
    EventBased {
        param_type_id: ParamTypeId,
        event_type_id: EventTypeId,
        event_param_type_id: ParamTypeId,
    },
    /// Read live from another thing's current state at dispatch time.
    StateBased {
        param_type_id: ParamTypeId,
        state_thing_id: ThingId,
        state_type_id: StateTypeId,
    },
}

impl RuleActionParam {
    pub fn param_type_id(&self) -> ParamTypeId {
        match self {
            RuleActionParam::Value { param_type_id, .. } => *param_type_id,
            RuleActionParam::EventBased { param_type_id, .. } => *param_type_id,
            RuleActionParam::StateBased { param_type_id, .. } => *param_type_id,
        }
    }
}

/// One action a rule can perform: invoke a thing's action, invoke an
/// interface-level action on every implementing thing, or open a URL in the
/// user's browser. Mirrors nymea's `RuleAction::Type` split.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RuleAction {
    Thing {
        thing_id: ThingId,
        action_type_id: ActionTypeId,
        params: Vec<RuleActionParam>,
    },
    Interface {
        interface_name: String,
        interface_action: String,
        params: Vec<RuleActionParam>,
    },
    /// Opens a browser item registered on a thing, mirroring the original's
    /// `BrowserAction(thingId, browserItemId)`.
    Browser {
        thing_id: ThingId,
        browser_item_id: String,
    },
}

impl RuleAction {
    /// True if resolving this action's params requires a triggering event,
    /// forbidding it from appearing among exit actions (spec §4.1.5).
    pub fn is_event_based(&self) -> bool {
        let params = match self {
            RuleAction::Thing { params, .. } => params.as_slice(),
            RuleAction::Interface { params, .. } => params.as_slice(),
            RuleAction::Browser { .. } => &[],
        };
        params
            .iter()
            .any(|p| matches!(p, RuleActionParam::EventBased { .. }))
    }
}

/// A fully resolved action parameter, ready to submit.
pub type ResolvedParam = ParamValue;
