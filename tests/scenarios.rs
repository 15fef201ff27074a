// End-to-end scenarios for the rule engine, driven entirely through its
// public API against an in-memory Thing Manager double.

use rule_engine::{
    ActionInfo, ActionStatus, ActionTypeId, ActionTypeSpec, ConcreteAction, Event, EventDescriptor,
    EventTypeId, EventTypeSpec, InMemoryLogSink, InMemoryRuleStore, ParamDescriptor, ParamTypeId,
    ParamTypeSpec,
    ParamValue, Result, Rule, RuleAction, RuleActionParam, RuleEngine, RuleEvent, StateDescriptor,
    StateEvaluator, StateTypeId, StateTypeSpec, StateValueSource, Thing, ThingClass, ThingId,
    ThingManager, ValueOperator, ValueType,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

struct TestThings {
    classes: HashMap<Uuid, ThingClass>,
    things: Mutex<HashMap<ThingId, Thing>>,
    state: Mutex<HashMap<(ThingId, StateTypeId), serde_json::Value>>,
    submitted: Mutex<Vec<ConcreteAction>>,
}

impl TestThings {
    fn new() -> Self {
        Self {
            classes: HashMap::new(),
            things: Mutex::new(HashMap::new()),
            state: Mutex::new(HashMap::new()),
            submitted: Mutex::new(vec![]),
        }
    }

    fn add_thing(&mut self, thing: Thing, class: ThingClass) {
        self.classes.insert(class.id, class);
        self.things.lock().unwrap().insert(thing.id, thing);
    }

    fn set_state(&self, thing_id: ThingId, state_type_id: StateTypeId, value: serde_json::Value) {
        self.state.lock().unwrap().insert((thing_id, state_type_id), value);
    }

    fn remove_thing(&self, thing_id: ThingId) {
        self.things.lock().unwrap().remove(&thing_id);
    }

    fn submitted_actions(&self) -> Vec<ConcreteAction> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ThingManager for TestThings {
    fn things(&self) -> Vec<Thing> {
        self.things.lock().unwrap().values().cloned().collect()
    }

    fn thing(&self, id: ThingId) -> Option<Thing> {
        self.things.lock().unwrap().get(&id).cloned()
    }

    fn thing_class(&self, id: Uuid) -> Option<ThingClass> {
        self.classes.get(&id).cloned()
    }

    fn things_implementing(&self, interface: &str) -> Vec<Thing> {
        self.things
            .lock()
            .unwrap()
            .values()
            .filter(|t| self.classes.get(&t.thing_class_id).map(|c| c.implements(interface)).unwrap_or(false))
            .cloned()
            .collect()
    }

    fn state_value(&self, thing_id: ThingId, state_type_id: StateTypeId) -> Option<serde_json::Value> {
        self.state.lock().unwrap().get(&(thing_id, state_type_id)).cloned()
    }

    async fn submit_action(&self, action: ConcreteAction, _timeout: Duration) -> Result<ActionInfo> {
        self.submitted.lock().unwrap().push(action);
        Ok(ActionInfo { status: ActionStatus::NoError, display_message: None })
    }

    async fn submit_browser_action(&self, _thing_id: ThingId, _browser_item_id: &str) -> Result<ActionInfo> {
        Ok(ActionInfo { status: ActionStatus::NoError, display_message: None })
    }
}

/// Wraps [`TestThings`] so `submit_action` can call back into the owning
/// `RuleEngine` with the same triggering event before the outer
/// `on_event_triggered` call returns, exercising real re-entrancy rather
/// than two independent top-level calls.
struct ReentrantThings {
    inner: TestThings,
    engine: std::sync::OnceLock<Arc<RuleEngine>>,
    event: Event,
}

#[async_trait::async_trait]
impl ThingManager for ReentrantThings {
    fn things(&self) -> Vec<Thing> {
        self.inner.things()
    }
    fn thing(&self, id: ThingId) -> Option<Thing> {
        self.inner.thing(id)
    }
    fn thing_class(&self, id: Uuid) -> Option<ThingClass> {
        self.inner.thing_class(id)
    }
    fn things_implementing(&self, interface: &str) -> Vec<Thing> {
        self.inner.things_implementing(interface)
    }
    fn state_value(&self, thing_id: ThingId, state_type_id: StateTypeId) -> Option<serde_json::Value> {
        self.inner.state_value(thing_id, state_type_id)
    }
    async fn submit_action(&self, action: ConcreteAction, timeout: Duration) -> Result<ActionInfo> {
        if let Some(engine) = self.engine.get() {
            engine.on_event_triggered(self.event.clone(), self).await.unwrap();
        }
        self.inner.submit_action(action, timeout).await
    }
    async fn submit_browser_action(&self, thing_id: ThingId, browser_item_id: &str) -> Result<ActionInfo> {
        self.inner.submit_browser_action(thing_id, browser_item_id).await
    }
}

/// A bare thing class with one event, one int state, and two no-op actions,
/// enough scaffolding for every scenario below.
fn mock_class(event_type: EventTypeId, second_event: EventTypeId, int_state: StateTypeId, bool_state: StateTypeId, no_params: ActionTypeId, with_params: ActionTypeId) -> ThingClass {
    ThingClass {
        id: Uuid::new_v4(),
        name: "MockThing".into(),
        interfaces: vec![],
        event_types: vec![
            EventTypeSpec {
                id: event_type,
                name: "mockEvent1".into(),
                param_types: vec![],
            },
            EventTypeSpec {
                id: second_event,
                name: "mockEvent2".into(),
                param_types: vec![ParamTypeSpec {
                    id: ParamTypeId::new(),
                    name: "param".into(),
                    value_type: ValueType::Int,
                    default_value: None,
                }],
            },
        ],
        state_types: vec![
            StateTypeSpec {
                id: int_state,
                name: "intState".into(),
                value_type: ValueType::Int,
                min_value: Some(serde_json::json!(0)),
                max_value: Some(serde_json::json!(100)),
                possible_values: vec![],
            },
            StateTypeSpec {
                id: bool_state,
                name: "boolState".into(),
                value_type: ValueType::Bool,
                min_value: None,
                max_value: None,
                possible_values: vec![],
            },
        ],
        action_types: vec![
            ActionTypeSpec { id: no_params, name: "mockActionNoParams".into(), param_types: vec![] },
            ActionTypeSpec { id: with_params, name: "mockActionWithParams".into(), param_types: vec![] },
        ],
    }
}

async fn build_engine() -> RuleEngine {
    RuleEngine::new(Arc::new(InMemoryRuleStore::new()), Arc::new(InMemoryLogSink::new())).await.unwrap()
}

#[tokio::test]
async fn event_triggers_thing_action() {
    let event1 = EventTypeId::new();
    let event2 = EventTypeId::new();
    let int_state = StateTypeId::new();
    let bool_state = StateTypeId::new();
    let no_params = ActionTypeId::new();
    let with_params = ActionTypeId::new();
    let class = mock_class(event1, event2, int_state, bool_state, no_params, with_params);
    let thing_a = Thing { id: ThingId::new(), name: "Thing A".into(), thing_class_id: class.id };

    let mut things = TestThings::new();
    things.add_thing(thing_a.clone(), class);

    let engine = build_engine().await;
    let rule = Rule::new("event triggers action")
        .with_event_descriptors(vec![EventDescriptor::ThingBound { event_type_id: event1, thing_id: thing_a.id, param_descriptors: vec![] }])
        .with_actions(vec![RuleAction::Thing { thing_id: thing_a.id, action_type_id: no_params, params: vec![] }]);
    engine.add_rule(rule, &things).await.unwrap();

    let event = Event { event_type_id: event1, thing_id: thing_a.id, params: vec![] };
    engine.on_event_triggered(event, &things).await.unwrap();

    let submitted = things.submitted_actions();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].action_type_id, no_params);
    assert_eq!(submitted[0].thing_id, thing_a.id);
    assert!(submitted[0].params.is_empty());
}

#[tokio::test]
async fn event_based_parameter_binding() {
    let event1 = EventTypeId::new();
    let event2 = EventTypeId::new();
    let int_state = StateTypeId::new();
    let bool_state = StateTypeId::new();
    let no_params = ActionTypeId::new();
    let with_params = ActionTypeId::new();
    let class = mock_class(event1, event2, int_state, bool_state, no_params, with_params);
    let int_param_id = class.event_types[1].param_types[0].id;
    let thing_a = Thing { id: ThingId::new(), name: "Thing A".into(), thing_class_id: class.id };

    let mut things = TestThings::new();
    things.add_thing(thing_a.clone(), class);

    let engine = build_engine().await;
    let param1 = ParamTypeId::new();
    let param2 = ParamTypeId::new();
    let rule = Rule::new("bind event param to action")
        .with_event_descriptors(vec![EventDescriptor::ThingBound { event_type_id: event2, thing_id: thing_a.id, param_descriptors: vec![] }])
        .with_actions(vec![RuleAction::Thing {
            thing_id: thing_a.id,
            action_type_id: with_params,
            params: vec![
                RuleActionParam::EventBased { param_type_id: param1, event_type_id: event2, event_param_type_id: int_param_id },
                RuleActionParam::Value { param_type_id: param2, value: serde_json::json!(true) },
            ],
        }]);
    engine.add_rule(rule, &things).await.unwrap();

    let event = Event {
        event_type_id: event2,
        thing_id: thing_a.id,
        params: vec![ParamValue { id: int_param_id, name: "intParam".into(), value: serde_json::json!(7) }],
    };
    engine.on_event_triggered(event, &things).await.unwrap();

    let submitted = things.submitted_actions();
    assert_eq!(submitted.len(), 1);
    let values: HashMap<ParamTypeId, serde_json::Value> =
        submitted[0].params.iter().map(|p| (p.id, p.value.clone())).collect();
    assert_eq!(values.get(&param1), Some(&serde_json::json!(7)));
    assert_eq!(values.get(&param2), Some(&serde_json::json!(true)));
}

#[tokio::test]
async fn state_based_rule_enters_and_exits_active() {
    let event1 = EventTypeId::new();
    let event2 = EventTypeId::new();
    let int_state = StateTypeId::new();
    let bool_state = StateTypeId::new();
    let no_params = ActionTypeId::new();
    let with_params = ActionTypeId::new();
    let class = mock_class(event1, event2, int_state, bool_state, no_params, with_params);
    let thing_a = Thing { id: ThingId::new(), name: "Thing A".into(), thing_class_id: class.id };

    let mut things = TestThings::new();
    things.add_thing(thing_a.clone(), class);
    things.set_state(thing_a.id, int_state, serde_json::json!(50));

    let engine = build_engine().await;
    let rule = Rule::new("low state triggers action")
        .with_state_evaluator(StateEvaluator::leaf(StateDescriptor::ThingBound {
            state_type_id: int_state,
            thing_id: thing_a.id,
            operator: ValueOperator::Less,
            value: StateValueSource::Literal(serde_json::json!(20)),
        }))
        .with_actions(vec![RuleAction::Thing { thing_id: thing_a.id, action_type_id: no_params, params: vec![] }])
        .with_exit_actions(vec![RuleAction::Thing {
            thing_id: thing_a.id,
            action_type_id: with_params,
            params: vec![
                RuleActionParam::Value { param_type_id: ParamTypeId::new(), value: serde_json::json!(5) },
                RuleActionParam::Value { param_type_id: ParamTypeId::new(), value: serde_json::json!(true) },
            ],
        }]);
    let rule = engine.add_rule(rule, &things).await.unwrap();
    assert!(!rule.activity.active()); // 50 is not < 20

    let mut events = engine.events().subscribe();

    things.set_state(thing_a.id, int_state, serde_json::json!(10));
    let trigger = Event { event_type_id: EventTypeId::from(int_state.as_uuid()), thing_id: thing_a.id, params: vec![] };
    engine.on_event_triggered(trigger.clone(), &things).await.unwrap();

    let submitted = things.submitted_actions();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].action_type_id, no_params);
    assert!(matches!(events.recv().await.unwrap(), RuleEvent::ActiveChanged { active: true, .. }));

    things.set_state(thing_a.id, int_state, serde_json::json!(30));
    engine.on_event_triggered(trigger, &things).await.unwrap();

    let submitted = things.submitted_actions();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[1].action_type_id, with_params);
    assert!(matches!(events.recv().await.unwrap(), RuleEvent::ActiveChanged { active: false, .. }));
}

#[tokio::test]
async fn nested_boolean_evaluator() {
    let event1 = EventTypeId::new();
    let event2 = EventTypeId::new();
    let int_state = StateTypeId::new();
    let bool_state = StateTypeId::new();
    let no_params = ActionTypeId::new();
    let with_params = ActionTypeId::new();
    let class = mock_class(event1, event2, int_state, bool_state, no_params, with_params);
    let thing_a = Thing { id: ThingId::new(), name: "Thing A".into(), thing_class_id: class.id };

    let mut things = TestThings::new();
    things.add_thing(thing_a.clone(), class);
    things.set_state(thing_a.id, int_state, serde_json::json!(10));
    things.set_state(thing_a.id, bool_state, serde_json::json!(false));

    let int_leaf = StateEvaluator::leaf(StateDescriptor::ThingBound {
        state_type_id: int_state,
        thing_id: thing_a.id,
        operator: ValueOperator::Equals,
        value: StateValueSource::Literal(serde_json::json!(10)),
    });
    let bool_leaf = StateEvaluator::leaf(StateDescriptor::ThingBound {
        state_type_id: bool_state,
        thing_id: thing_a.id,
        operator: ValueOperator::Equals,
        value: StateValueSource::Literal(serde_json::json!(true)),
    });

    let and_tree = StateEvaluator::group(rule_engine::LogicOperator::And, vec![int_leaf.clone(), bool_leaf.clone()]);
    assert!(!and_tree.evaluate(&things));

    let or_tree = StateEvaluator::group(rule_engine::LogicOperator::Or, vec![int_leaf, bool_leaf]);
    assert!(or_tree.evaluate(&things));
}

#[tokio::test]
async fn housekeeping_on_thing_removal() {
    let event1 = EventTypeId::new();
    let event2 = EventTypeId::new();
    let int_state = StateTypeId::new();
    let bool_state = StateTypeId::new();
    let no_params = ActionTypeId::new();
    let with_params = ActionTypeId::new();
    let class = mock_class(event1, event2, int_state, bool_state, no_params, with_params);
    let thing_a = Thing { id: ThingId::new(), name: "Thing A".into(), thing_class_id: class.id };

    let mut things = TestThings::new();
    things.add_thing(thing_a.clone(), class);

    let engine = build_engine().await;
    let rule = Rule::new("fully references thing a")
        .with_event_descriptors(vec![EventDescriptor::ThingBound { event_type_id: event1, thing_id: thing_a.id, param_descriptors: vec![] }])
        .with_state_evaluator(StateEvaluator::leaf(StateDescriptor::ThingBound {
            state_type_id: int_state,
            thing_id: thing_a.id,
            operator: ValueOperator::Equals,
            value: StateValueSource::Literal(serde_json::json!(1)),
        }))
        .with_actions(vec![RuleAction::Thing { thing_id: thing_a.id, action_type_id: no_params, params: vec![] }]);
    let id = rule.id;
    engine.add_rule(rule, &things).await.unwrap();

    let mut events = engine.events().subscribe();
    things.remove_thing(thing_a.id);
    engine.on_thing_removed(thing_a.id).await.unwrap();

    assert!(matches!(engine.find_rule(id), Err(rule_engine::RuleEngineError::RuleNotFound { .. })));
    let mut saw_removed = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, RuleEvent::Removed(removed_id) if removed_id == id) {
            saw_removed += 1;
        }
    }
    assert_eq!(saw_removed, 1);
}

#[tokio::test]
async fn loop_guard_permits_independent_sequential_triggers() {
    let event1 = EventTypeId::new();
    let event2 = EventTypeId::new();
    let int_state = StateTypeId::new();
    let bool_state = StateTypeId::new();
    let no_params = ActionTypeId::new();
    let with_params = ActionTypeId::new();
    let class = mock_class(event1, event2, int_state, bool_state, no_params, with_params);
    let thing_a = Thing { id: ThingId::new(), name: "Thing A".into(), thing_class_id: class.id };

    let mut things = TestThings::new();
    things.add_thing(thing_a.clone(), class);

    let engine = build_engine().await;
    let rule = Rule::new("event-based rule guarded against re-entry")
        .with_event_descriptors(vec![EventDescriptor::ThingBound { event_type_id: event1, thing_id: thing_a.id, param_descriptors: vec![] }])
        .with_actions(vec![RuleAction::Thing { thing_id: thing_a.id, action_type_id: no_params, params: vec![] }]);
    engine.add_rule(rule, &things).await.unwrap();

    let event = Event { event_type_id: event1, thing_id: thing_a.id, params: vec![] };

    // The loop guard is keyed per top-level call and cleared once that call
    // finishes dispatching, so back-to-back independent triggers both fire.
    engine.on_event_triggered(event.clone(), &things).await.unwrap();
    assert_eq!(things.submitted_actions().len(), 1);
    engine.on_event_triggered(event, &things).await.unwrap();
    assert_eq!(things.submitted_actions().len(), 2);
}

#[tokio::test]
async fn loop_guard_rejects_reentrant_trigger_within_same_call() {
    let event1 = EventTypeId::new();
    let event2 = EventTypeId::new();
    let int_state = StateTypeId::new();
    let bool_state = StateTypeId::new();
    let no_params = ActionTypeId::new();
    let with_params = ActionTypeId::new();
    let class = mock_class(event1, event2, int_state, bool_state, no_params, with_params);
    let thing_a = Thing { id: ThingId::new(), name: "Thing A".into(), thing_class_id: class.id };

    let event = Event { event_type_id: event1, thing_id: thing_a.id, params: vec![] };

    let mut inner = TestThings::new();
    inner.add_thing(thing_a.clone(), class);
    let things = ReentrantThings { inner, engine: std::sync::OnceLock::new(), event: event.clone() };

    let engine = Arc::new(build_engine().await);
    let rule = Rule::new("event-based rule guarded against re-entry")
        .with_event_descriptors(vec![EventDescriptor::ThingBound { event_type_id: event1, thing_id: thing_a.id, param_descriptors: vec![] }])
        .with_actions(vec![RuleAction::Thing { thing_id: thing_a.id, action_type_id: no_params, params: vec![] }]);
    engine.add_rule(rule, &things).await.unwrap();
    things.engine.set(engine.clone()).ok().unwrap();

    // submit_action recursively triggers the same event before the outer
    // on_event_triggered call returns; the loop guard must suppress the
    // re-entrant firing so the action is only ever submitted once.
    engine.on_event_triggered(event, &things).await.unwrap();
    assert_eq!(things.inner.submitted_actions().len(), 1);
}

#[tokio::test]
async fn param_descriptor_filters_non_matching_events() {
    let event1 = EventTypeId::new();
    let event2 = EventTypeId::new();
    let int_state = StateTypeId::new();
    let bool_state = StateTypeId::new();
    let no_params = ActionTypeId::new();
    let with_params = ActionTypeId::new();
    let class = mock_class(event1, event2, int_state, bool_state, no_params, with_params);
    let int_param_id = class.event_types[1].param_types[0].id;
    let thing_a = Thing { id: ThingId::new(), name: "Thing A".into(), thing_class_id: class.id };

    let mut things = TestThings::new();
    things.add_thing(thing_a.clone(), class);

    let engine = build_engine().await;
    let rule = Rule::new("only matches intParam == 7")
        .with_event_descriptors(vec![EventDescriptor::ThingBound {
            event_type_id: event2,
            thing_id: thing_a.id,
            param_descriptors: vec![ParamDescriptor::by_id(int_param_id, serde_json::json!(7), ValueOperator::Equals)],
        }])
        .with_actions(vec![RuleAction::Thing { thing_id: thing_a.id, action_type_id: no_params, params: vec![] }]);
    engine.add_rule(rule, &things).await.unwrap();

    let non_matching = Event {
        event_type_id: event2,
        thing_id: thing_a.id,
        params: vec![ParamValue { id: int_param_id, name: "intParam".into(), value: serde_json::json!(3) }],
    };
    engine.on_event_triggered(non_matching, &things).await.unwrap();
    assert!(things.submitted_actions().is_empty());

    let matching = Event {
        event_type_id: event2,
        thing_id: thing_a.id,
        params: vec![ParamValue { id: int_param_id, name: "intParam".into(), value: serde_json::json!(7) }],
    };
    engine.on_event_triggered(matching, &things).await.unwrap();
    assert_eq!(things.submitted_actions().len(), 1);
}
