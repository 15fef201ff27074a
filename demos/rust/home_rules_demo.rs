// Home Rule Engine Demo -- walks through the "motion turns on the porch
// light, timer turns it back off" scenario end to end.

use rule_engine::{
    ActionInfo, ActionStatus, ActionTypeId, ActionTypeSpec, ConcreteAction, Event, EventDescriptor,
    EventTypeId, EventTypeSpec, InMemoryLogSink, InMemoryRuleStore, Result, Rule,
    RuleAction, RuleEngine, StateDescriptor, StateEvaluator, StateTypeId, StateTypeSpec,
    StateValueSource, Thing, ThingClass, ThingId, ThingManager, ValueOperator, ValueType,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// A toy Thing Manager backing one porch lamp, for demonstration only.
struct DemoThings {
    lamp_class: ThingClass,
    lamp: Thing,
    state: Mutex<HashMap<StateTypeId, serde_json::Value>>,
}

#[async_trait::async_trait]
impl ThingManager for DemoThings {
    fn things(&self) -> Vec<Thing> {
        vec![self.lamp.clone()]
    }

    fn thing(&self, id: ThingId) -> Option<Thing> {
        (id == self.lamp.id).then(|| self.lamp.clone())
    }

    fn thing_class(&self, id: Uuid) -> Option<ThingClass> {
        (id == self.lamp_class.id).then(|| self.lamp_class.clone())
    }

    fn things_implementing(&self, interface: &str) -> Vec<Thing> {
        if self.lamp_class.implements(interface) {
            vec![self.lamp.clone()]
        } else {
            vec![]
        }
    }

    fn state_value(&self, thing_id: ThingId, state_type_id: StateTypeId) -> Option<serde_json::Value> {
        if thing_id != self.lamp.id {
            return None;
        }
        self.state.lock().unwrap().get(&state_type_id).cloned()
    }

    async fn submit_action(&self, action: ConcreteAction, _timeout: Duration) -> Result<ActionInfo> {
        println!("  -> dispatched action {} on thing {}", action.action_type_id, action.thing_id);
        Ok(ActionInfo { status: ActionStatus::NoError, display_message: None })
    }

    async fn submit_browser_action(&self, thing_id: ThingId, browser_item_id: &str) -> Result<ActionInfo> {
        println!("  -> dispatched browser action {browser_item_id} on thing {thing_id}");
        Ok(ActionInfo { status: ActionStatus::NoError, display_message: None })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("Home Rule Engine Demo");
    println!("======================\n");

    let motion_detected = EventTypeId::new();
    let brightness_state = StateTypeId::new();
    let turn_on = ActionTypeId::new();
    let turn_off = ActionTypeId::new();

    let class_id = Uuid::new_v4();
    let lamp_class = ThingClass {
        id: class_id,
        name: "PorchLamp".into(),
        interfaces: vec!["light".into()],
        event_types: vec![EventTypeSpec { id: motion_detected, name: "motionDetected".into(), param_types: vec![] }],
        state_types: vec![StateTypeSpec {
            id: brightness_state,
            name: "brightness".into(),
            value_type: ValueType::Int,
            min_value: Some(serde_json::json!(0)),
            max_value: Some(serde_json::json!(100)),
            possible_values: vec![],
        }],
        action_types: vec![
            ActionTypeSpec { id: turn_on, name: "turnOn".into(), param_types: vec![] },
            ActionTypeSpec { id: turn_off, name: "turnOff".into(), param_types: vec![] },
        ],
    };

    let lamp = Thing { id: ThingId::new(), name: "Porch Lamp".into(), thing_class_id: class_id };

    let things = DemoThings {
        lamp_class,
        lamp: lamp.clone(),
        state: Mutex::new(HashMap::from([(brightness_state, serde_json::json!(0))])),
    };

    let log = Arc::new(InMemoryLogSink::new());
    let engine = RuleEngine::new(Arc::new(InMemoryRuleStore::new()), log.clone()).await?;

    // Rule 1: motion at the porch turns the lamp on.
    let motion_rule = Rule::new("motion turns on porch lamp")
        .with_event_descriptors(vec![EventDescriptor::ThingBound {
            event_type_id: motion_detected,
            thing_id: lamp.id,
            param_descriptors: vec![],
        }])
        .with_actions(vec![RuleAction::Thing { thing_id: lamp.id, action_type_id: turn_on, params: vec![] }]);
    let motion_rule = engine.add_rule(motion_rule, &things).await?;
    println!("Registered rule: {}\n", motion_rule.name);

    // Rule 2: once brightness is too low, fall back to the exit action.
    let dim_rule = Rule::new("dim lamp exits to full power")
        .with_state_evaluator(StateEvaluator::leaf(StateDescriptor::ThingBound {
            state_type_id: brightness_state,
            thing_id: lamp.id,
            operator: ValueOperator::Less,
            value: StateValueSource::Literal(serde_json::json!(10)),
        }))
        .with_actions(vec![RuleAction::Thing { thing_id: lamp.id, action_type_id: turn_off, params: vec![] }])
        .with_exit_actions(vec![RuleAction::Thing { thing_id: lamp.id, action_type_id: turn_on, params: vec![] }]);
    engine.add_rule(dim_rule, &things).await?;
    println!("Registered {} rules total.\n", engine.rule_ids().len());

    println!("Scenario: motion event fires");
    let motion_event = Event { event_type_id: motion_detected, thing_id: lamp.id, params: vec![] };
    engine.on_event_triggered(motion_event, &things).await?;

    println!("\nScenario: brightness drops below threshold");
    things.state.lock().unwrap().insert(brightness_state, serde_json::json!(5));
    let state_change = Event {
        event_type_id: EventTypeId::from(brightness_state.as_uuid()),
        thing_id: lamp.id,
        params: vec![],
    };
    engine.on_event_triggered(state_change, &things).await?;

    println!("\nLog records emitted: {}", log.records().len());
    println!("\nDemo complete.");
    Ok(())
}

