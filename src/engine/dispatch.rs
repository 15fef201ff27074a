// Action parameter resolution and submission (spec §4.7)

use crate::engine::ports::{ActionInfo, ActionStatus, ConcreteAction, LogRecord, LogSink, ThingManager};
use crate::models::{Event, ParamValue, Rule, RuleAction, RuleActionParam};
use crate::{Result, RuleEngineError};
use std::time::Duration;
use uuid::Uuid;

const ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve and submit every action in `actions` against `things`, logging
/// each attempt to `log_sink`. `triggering_event` supplies event-based
/// parameter bindings; it is `None` for exit actions and for actions fired
/// purely by a state/time change, which may not reference event params
/// (spec §4.1.5).
pub async fn dispatch_actions(
    rule: &Rule,
    actions: &[RuleAction],
    triggering_event: Option<&Event>,
    things: &dyn ThingManager,
    log_sink: &dyn LogSink,
) -> Result<Vec<ActionInfo>> {
    let mut results = Vec::with_capacity(actions.len());
    for action in actions {
        let result = dispatch_one(rule, action, triggering_event, things, log_sink).await;
        match result {
            Ok(info) => results.push(info),
            Err(err) => {
                log_sink.log(
                    LogRecord::new(Uuid::new_v4(), "rule.action.error")
                        .with("rule_id", rule.id.to_string())
                        .with("error", err.to_string()),
                );
                return Err(err);
            }
        }
    }
    Ok(results)
}

async fn dispatch_one(
    rule: &Rule,
    action: &RuleAction,
    triggering_event: Option<&Event>,
    things: &dyn ThingManager,
    log_sink: &dyn LogSink,
) -> Result<ActionInfo> {
    match action {
        RuleAction::Browser { thing_id, browser_item_id } => {
            let info = things
                .submit_browser_action(*thing_id, browser_item_id)
                .await?;
            log_sink.log(
                LogRecord::new(Uuid::new_v4(), "rule.action.browser")
                    .with("rule_id", rule.id.to_string())
                    .with("thing_id", thing_id.to_string())
                    .with("browser_item_id", browser_item_id.clone())
                    .with("status", serde_json::to_value(info.status).unwrap_or_default()),
            );
            Ok(info)
        }
        RuleAction::Thing {
            thing_id,
            action_type_id,
            params,
        } => {
            let resolved = resolve_params(params, triggering_event, things)?;
            let concrete = ConcreteAction {
                thing_id: *thing_id,
                action_type_id: *action_type_id,
                params: resolved,
            };
            submit_and_log(rule, things, log_sink, concrete).await
        }
        RuleAction::Interface {
            interface_name,
            interface_action,
            params,
        } => {
            let targets = things.things_implementing(interface_name);
            if targets.is_empty() {
                return Err(RuleEngineError::InterfaceNotFound {
                    interface: interface_name.clone(),
                });
            }
            let mut last = ActionInfo {
                status: ActionStatus::NoError,
                display_message: None,
            };
            for target in targets {
                let class = things
                    .thing_class(target.thing_class_id)
                    .ok_or_else(|| RuleEngineError::ThingNotFound { id: target.id })?;
                let action_type = class
                    .action_type_by_name(interface_action)
                    .ok_or_else(|| RuleEngineError::ActionTypeNotFound {
                        name: interface_action.clone(),
                    })?;
                let resolved = resolve_params(params, triggering_event, things)?;
                let concrete = ConcreteAction {
                    thing_id: target.id,
                    action_type_id: action_type.id,
                    params: resolved,
                };
                last = submit_and_log(rule, things, log_sink, concrete).await?;
            }
            Ok(last)
        }
    }
}

async fn submit_and_log(
    rule: &Rule,
    things: &dyn ThingManager,
    log_sink: &dyn LogSink,
    concrete: ConcreteAction,
) -> Result<ActionInfo> {
    let info = things.submit_action(concrete.clone(), ACTION_TIMEOUT).await?;
    log_sink.log(
        LogRecord::new(Uuid::new_v4(), "rule.action.dispatched")
            .with("rule_id", rule.id.to_string())
            .with("thing_id", concrete.thing_id.to_string())
            .with("action_type_id", concrete.action_type_id.to_string())
            .with("status", serde_json::to_value(info.status).unwrap_or_default()),
    );
    Ok(info)
}

fn resolve_params(
    params: &[RuleActionParam],
    triggering_event: Option<&Event>,
    things: &dyn ThingManager,
) -> Result<Vec<ParamValue>> {
    params
        .iter()
        .map(|param| resolve_one(param, triggering_event, things))
        .collect()
}

fn resolve_one(
    param: &RuleActionParam,
    triggering_event: Option<&Event>,
    things: &dyn ThingManager,
) -> Result<ParamValue> {
    match param {
        RuleActionParam::Value { param_type_id, value } => Ok(ParamValue {
            id: *param_type_id,
            name: String::new(),
            value: value.clone(),
        }),
        RuleActionParam::EventBased {
            param_type_id,
            event_type_id,
            event_param_type_id,
        } => {
            let event = triggering_event.ok_or(RuleEngineError::ContainsEventBasesAction)?;
            if event.event_type_id != *event_type_id {
                return Err(RuleEngineError::MissingParameter {
                    name: event_param_type_id.to_string(),
                });
            }
            let value = event
                .param_value(*event_param_type_id)
                .cloned()
                .ok_or(RuleEngineError::MissingParameter {
                    name: event_param_type_id.to_string(),
                })?;
            Ok(ParamValue {
                id: *param_type_id,
                name: String::new(),
                value,
            })
        }
        RuleActionParam::StateBased {
            param_type_id,
            state_thing_id,
            state_type_id,
        } => {
            let value = things
                .state_value(*state_thing_id, *state_type_id)
                .ok_or(RuleEngineError::StateTypeNotFound { id: *state_type_id })?;
            Ok(ParamValue {
                id: *param_type_id,
                name: String::new(),
                value,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ports::{ActionInfo, ActionStatus, ConcreteAction, InMemoryLogSink};
    use crate::models::{EventTypeId, ParamTypeId, StateTypeId, Thing, ThingClass, ThingId};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeThings {
        state: Mutex<HashMap<(ThingId, StateTypeId), serde_json::Value>>,
        submitted: Mutex<Vec<ConcreteAction>>,
    }

    #[async_trait]
    impl ThingManager for FakeThings {
        fn things(&self) -> Vec<Thing> {
            vec![]
        }
        fn thing(&self, _id: ThingId) -> Option<Thing> {
            None
        }
        fn thing_class(&self, _id: uuid::Uuid) -> Option<ThingClass> {
            None
        }
        fn things_implementing(&self, _interface: &str) -> Vec<Thing> {
            vec![]
        }
        fn state_value(&self, thing_id: ThingId, state_type_id: StateTypeId) -> Option<serde_json::Value> {
            self.state.lock().unwrap().get(&(thing_id, state_type_id)).cloned()
        }
        async fn submit_action(&self, action: ConcreteAction, _timeout: Duration) -> Result<ActionInfo> {
            self.submitted.lock().unwrap().push(action);
            Ok(ActionInfo {
                status: ActionStatus::NoError,
                display_message: None,
            })
        }
        async fn submit_browser_action(&self, _thing_id: ThingId, _browser_item_id: &str) -> Result<ActionInfo> {
            Ok(ActionInfo {
                status: ActionStatus::NoError,
                display_message: None,
            })
        }
    }

    #[tokio::test]
    async fn value_based_action_dispatches_directly() {
        let rule = Rule::new("test");
        let things = FakeThings {
            state: Mutex::new(HashMap::new()),
            submitted: Mutex::new(vec![]),
        };
        let sink = InMemoryLogSink::new();
        let action = RuleAction::Thing {
            thing_id: ThingId::new(),
            action_type_id: crate::models::ActionTypeId::new(),
            params: vec![RuleActionParam::Value {
                param_type_id: ParamTypeId::new(),
                value: serde_json::json!(true),
            }],
        };
        let results = dispatch_actions(&rule, &[action], None, &things, &sink).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(things.submitted.lock().unwrap().len(), 1);
        assert!(!sink.records().is_empty());
    }

    #[tokio::test]
    async fn event_based_action_without_triggering_event_errors() {
        let rule = Rule::new("test");
        let things = FakeThings {
            state: Mutex::new(HashMap::new()),
            submitted: Mutex::new(vec![]),
        };
        let sink = InMemoryLogSink::new();
        let action = RuleAction::Thing {
            thing_id: ThingId::new(),
            action_type_id: crate::models::ActionTypeId::new(),
            params: vec![RuleActionParam::EventBased {
                param_type_id: ParamTypeId::new(),
                event_type_id: EventTypeId::new(),
                event_param_type_id: ParamTypeId::new(),
            }],
        };
        let result = dispatch_actions(&rule, &[action], None, &things, &sink).await;
        assert!(matches!(result, Err(RuleEngineError::ContainsEventBasesAction)));
    }
}
