// The rule engine orchestrator (spec §4.1, §4.4, §4.6-4.9)

//! # Rule Engine
//!
//! `RuleEngine` is the single-writer owner of the in-memory rule set: it
//! validates rules on `add_rule`/`edit_rule`, drives the event and time
//! evaluation paths, dispatches actions, emits lifecycle signals on
//! [`RuleEventBus`], and performs housekeeping when a thing is removed. The
//! engine never talks to devices directly -- every read of thing state and
//! every action submission goes through the injected [`ThingManager`].
//!
//! Mirrors `circuit_breaker::engine::rules::RulesEngine`'s shape (an
//! in-memory registry layered over an optional persistent store, with
//! lookups and list operations as small synchronous wrappers around a
//! lock), generalized to the richer lifecycle nymea's `RuleEngine` drives.

use super::dispatch::dispatch_actions;
use super::events::RuleEventBus;
use super::ports::{ActionInfo, LogRecord, LogSink, ThingManager};
use super::storage::RuleStore;
use crate::models::{
    Event, EventDescriptor, ParamDescriptor, Rule, RuleAction, RuleActionParam, RuleId, ThingId,
    ValueOperator,
};
use crate::{Result, RuleEngineError};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// Rules returned from the event or time paths, paired with whether they
/// should fire their `actions` (true) or `exit_actions` (false).
struct Firing {
    rule: Rule,
    entry: bool,
    triggering_event: Option<Event>,
}

pub struct RuleEngine {
    store: Arc<dyn RuleStore>,
    events: RuleEventBus,
    log: Arc<dyn LogSink>,
    rule_ids: RwLock<Vec<RuleId>>,
    rules: RwLock<HashMap<RuleId, Rule>>,
    last_evaluation_time: RwLock<Option<DateTime<Utc>>>,
    executing_rules: Mutex<HashSet<RuleId>>,
}

impl RuleEngine {
    /// Construct an engine and load every persisted rule, in lexicographic
    /// key order, skipping and logging malformed entries (spec §4.10).
    pub async fn new(store: Arc<dyn RuleStore>, log: Arc<dyn LogSink>) -> Result<Self> {
        let engine = Self {
            store,
            events: RuleEventBus::new(),
            log,
            rule_ids: RwLock::new(Vec::new()),
            rules: RwLock::new(HashMap::new()),
            last_evaluation_time: RwLock::new(None),
            executing_rules: Mutex::new(HashSet::new()),
        };

        let mut loaded = engine.store.list_rules().await?;
        loaded.sort_by_key(|r| r.id.to_string());
        for rule in loaded {
            engine.rule_ids.write().unwrap().push(rule.id);
            engine.rules.write().unwrap().insert(rule.id, rule);
        }
        Ok(engine)
    }

    pub fn events(&self) -> &RuleEventBus {
        &self.events
    }

    // ---- §6.4 lookups -------------------------------------------------

    pub fn rules(&self) -> Vec<Rule> {
        let ids = self.rule_ids.read().unwrap();
        let rules = self.rules.read().unwrap();
        ids.iter().filter_map(|id| rules.get(id).cloned()).collect()
    }

    pub fn rule_ids(&self) -> Vec<RuleId> {
        self.rule_ids.read().unwrap().clone()
    }

    pub fn find_rule(&self, id: RuleId) -> Result<Rule> {
        self.rules
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RuleEngineError::RuleNotFound { id })
    }

    pub fn find_rules(&self, thing_id: ThingId) -> Vec<RuleId> {
        self.rules
            .read()
            .unwrap()
            .values()
            .filter(|r| r.contains_thing(thing_id))
            .map(|r| r.id)
            .collect()
    }

    pub fn things_in_rules(&self) -> HashSet<ThingId> {
        let rules = self.rules.read().unwrap();
        let mut things = HashSet::new();
        for rule in rules.values() {
            for descriptor in &rule.event_descriptors {
                if let EventDescriptor::ThingBound { thing_id, .. } = descriptor {
                    things.insert(*thing_id);
                }
            }
            things.extend(rule.state_evaluator.contained_things());
        }
        things
    }

    // ---- §4.1 validation + lifecycle -----------------------------------

    /// Validate and register a new rule, running the six ordered checks
    /// from spec §4.1.
    pub async fn add_rule(&self, rule: Rule, things: &dyn ThingManager) -> Result<Rule> {
        self.add_rule_inner(rule, things, false).await
    }

    async fn add_rule_inner(&self, mut rule: Rule, things: &dyn ThingManager, from_edit: bool) -> Result<Rule> {
        // 1. id uniqueness.
        if self.rules.read().unwrap().contains_key(&rule.id) {
            return Err(RuleEngineError::InvalidRuleId(rule.id.to_string()));
        }
        validate_rule(&rule, things)?;

        // Initialize derived flags (spec §4.1, end of validation).
        rule.activity.states_active = rule.state_evaluator.evaluate(things);
        rule.activity.time_active = rule
            .time_descriptor
            .evaluate(Utc::now() - chrono::Duration::seconds(1), Utc::now())
            .calendar_active
            || rule.time_descriptor.calendar_items.is_empty();

        self.store.put_rule(rule.clone()).await?;
        self.rule_ids.write().unwrap().push(rule.id);
        self.rules.write().unwrap().insert(rule.id, rule.clone());

        if !from_edit {
            self.events.emit_added(rule.clone());
            self.log.log(
                LogRecord::new(Uuid::new_v4(), "created").with("id", rule.id.to_string()),
            );
        }
        Ok(rule)
    }

    /// `removeRule(rule.id, fromEdit=true)` followed by
    /// `addRule(rule, fromEdit=true)`, restoring the original on failure
    /// (spec §4.1).
    pub async fn edit_rule(&self, rule: Rule, things: &dyn ThingManager) -> Result<Rule> {
        let original = self.find_rule(rule.id)?;
        self.remove_rule_inner(rule.id, true).await?;

        match self.add_rule_inner(rule, things, true).await {
            Ok(updated) => {
                self.events.emit_changed(updated.clone());
                self.log.log(
                    LogRecord::new(Uuid::new_v4(), "changed").with("id", updated.id.to_string()),
                );
                Ok(updated)
            }
            Err(err) => {
                // restore the original rule without re-validating.
                self.store.put_rule(original.clone()).await?;
                self.rule_ids.write().unwrap().push(original.id);
                self.rules.write().unwrap().insert(original.id, original);
                Err(err)
            }
        }
    }

    pub async fn remove_rule(&self, id: RuleId) -> Result<()> {
        self.remove_rule_inner(id, false).await
    }

    async fn remove_rule_inner(&self, id: RuleId, from_edit: bool) -> Result<()> {
        if !self.rules.read().unwrap().contains_key(&id) {
            return Err(RuleEngineError::RuleNotFound { id });
        }
        self.store.delete_rule(id).await?;
        self.rules.write().unwrap().remove(&id);
        self.rule_ids.write().unwrap().retain(|existing| *existing != id);

        if !from_edit {
            self.events.emit_removed(id);
            self.log
                .log(LogRecord::new(Uuid::new_v4(), "removed").with("id", id.to_string()));
        }
        Ok(())
    }

    pub async fn enable_rule(&self, id: RuleId) -> Result<()> {
        self.set_enabled(id, true).await
    }

    pub async fn disable_rule(&self, id: RuleId) -> Result<()> {
        self.set_enabled(id, false).await
    }

    async fn set_enabled(&self, id: RuleId, enabled: bool) -> Result<()> {
        let mut rule = self.find_rule(id)?;
        rule.enabled = enabled;
        self.store.put_rule(rule.clone()).await?;
        self.rules.write().unwrap().insert(id, rule);
        self.log.log(
            LogRecord::new(Uuid::new_v4(), if enabled { "enabled" } else { "disabled" })
                .with("id", id.to_string()),
        );
        Ok(())
    }

    // ---- §4.7 unconditional execution -----------------------------------

    pub async fn execute_actions(&self, id: RuleId, things: &dyn ThingManager) -> Result<Vec<ActionInfo>> {
        let rule = self.find_rule(id)?;
        if !rule.executable {
            return Err(RuleEngineError::NotExecutable { id });
        }
        if rule.actions.iter().any(is_event_based_action) {
            return Err(RuleEngineError::ContainsEventBasesAction);
        }
        dispatch_actions(&rule, &rule.actions, None, things, self.log.as_ref()).await
    }

    pub async fn execute_exit_actions(&self, id: RuleId, things: &dyn ThingManager) -> Result<Vec<ActionInfo>> {
        let rule = self.find_rule(id)?;
        if rule.exit_actions.is_empty() {
            return Err(RuleEngineError::NoExitActions { id });
        }
        dispatch_actions(&rule, &rule.exit_actions, None, things, self.log.as_ref()).await
    }

    // ---- §4.4 / §4.5 event path ------------------------------------------

    /// Drive the event path for one incoming event, evaluating and
    /// dispatching every affected rule, then clearing the loop guard.
    pub async fn on_event_triggered(&self, event: Event, things: &dyn ThingManager) -> Result<()> {
        let firings = self.collect_event_firings(&event, things);
        self.dispatch_firings(firings, things).await;
        self.executing_rules.lock().unwrap().clear();
        Ok(())
    }

    fn collect_event_firings(&self, event: &Event, things: &dyn ThingManager) -> Vec<Firing> {
        let mut firings = vec![];
        let mut updated = vec![];

        for rule in self.rules.read().unwrap().values() {
            if !rule.enabled {
                continue;
            }
            let mut rule = rule.clone();
            let was_active = rule.activity.active();

            if rule.state_evaluator.contains_state(event, things) {
                rule.activity.states_active = rule.state_evaluator.evaluate(things);
                updated.push(rule.clone());
            }

            if rule.event_descriptors.is_empty() {
                // State-based rule: fire only on an active transition.
                if rule.state_evaluator.is_empty() {
                    continue;
                }
                let new_active = rule.activity.active();
                if new_active != was_active {
                    if self.enter_loop_guard(rule.id) {
                        firings.push(Firing { rule: rule.clone(), entry: new_active, triggering_event: None });
                    } else {
                        tracing::warn!(rule_id = %rule.id, "loop guard: re-entrant rule trigger suppressed");
                    }
                }
            } else if event_matches_rule(&rule, event, things) {
                if !self.enter_loop_guard(rule.id) {
                    tracing::warn!(rule_id = %rule.id, "loop guard: re-entrant rule trigger suppressed");
                    continue;
                }
                let entry = rule.activity.active();
                firings.push(Firing {
                    rule: rule.clone(),
                    entry,
                    triggering_event: Some(event.clone()),
                });
            }
        }

        for rule in updated {
            self.rules.write().unwrap().insert(rule.id, rule);
        }
        firings
    }

    // ---- §4.6 time path ---------------------------------------------------

    pub async fn on_date_time_changed(&self, tick: DateTime<Utc>, things: &dyn ThingManager) -> Result<()> {
        let last_tick = {
            let mut last = self.last_evaluation_time.write().unwrap();
            let previous = last.unwrap_or(tick - chrono::Duration::seconds(1));
            *last = Some(tick);
            previous
        };

        let firings = self.collect_time_firings(last_tick, tick, things);
        self.dispatch_firings(firings, things).await;
        self.executing_rules.lock().unwrap().clear();
        Ok(())
    }

    fn collect_time_firings(
        &self,
        last_tick: DateTime<Utc>,
        tick: DateTime<Utc>,
        things: &dyn ThingManager,
    ) -> Vec<Firing> {
        let mut firings = vec![];
        let mut updated = vec![];

        for rule in self.rules.read().unwrap().values() {
            if !rule.enabled || rule.time_descriptor.is_empty() {
                continue;
            }
            let mut rule = rule.clone();
            let was_active = rule.activity.active();
            let evaluation = rule.time_descriptor.evaluate(last_tick, tick);

            if !rule.time_descriptor.calendar_items.is_empty() {
                rule.activity.time_active = evaluation.calendar_active;
                let is_state_based = rule.event_descriptors.is_empty()
                    && rule.time_descriptor.time_event_items.is_empty();
                if is_state_based {
                    let new_active = rule.activity.active();
                    if new_active != was_active {
                        if self.enter_loop_guard(rule.id) {
                            firings.push(Firing { rule: rule.clone(), entry: new_active, triggering_event: None });
                        } else {
                            tracing::warn!(rule_id = %rule.id, "loop guard: re-entrant rule trigger suppressed");
                        }
                    }
                }
                updated.push(rule.clone());
            }

            if evaluation.event_fired {
                if !self.enter_loop_guard(rule.id) {
                    continue;
                }
                let entry = rule.activity.active();
                firings.push(Firing {
                    rule: rule.clone(),
                    entry,
                    triggering_event: None,
                });
            }
        }

        for rule in updated {
            self.rules.write().unwrap().insert(rule.id, rule);
        }
        firings
    }

    // ---- dispatch helper ---------------------------------------------------

    async fn dispatch_firings(&self, firings: Vec<Firing>, things: &dyn ThingManager) {
        for firing in firings {
            let actions = if firing.entry {
                &firing.rule.actions
            } else {
                &firing.rule.exit_actions
            };
            if actions.is_empty() {
                continue;
            }
            self.events
                .emit_active_changed(firing.rule.id, firing.entry);
            if let Err(err) = dispatch_actions(
                &firing.rule,
                actions,
                firing.triggering_event.as_ref(),
                things,
                self.log.as_ref(),
            )
            .await
            {
                tracing::warn!(rule_id = %firing.rule.id, error = %err, "action dispatch failed");
            }
        }
    }

    fn enter_loop_guard(&self, id: RuleId) -> bool {
        self.executing_rules.lock().unwrap().insert(id)
    }

    // ---- §4.9 housekeeping --------------------------------------------------

    /// Trim every reference to `thing_id` out of one rule, removing the rule
    /// entirely once both its action lists run dry. Exposed standalone
    /// (the original's public `removeThingFromRule`) so callers can trim a
    /// single rule without waiting on the full `on_thing_removed` sweep.
    pub async fn remove_thing_from_rule(&self, rule_id: RuleId, thing_id: ThingId) -> Result<()> {
        let mut rule = self.find_rule(rule_id)?;
        rule.event_descriptors.retain(|d| {
            !matches!(d, EventDescriptor::ThingBound { thing_id: t, .. } if *t == thing_id)
        });
        rule.state_evaluator.remove_thing(thing_id);
        rule.actions.retain(|a| !action_references_thing(a, thing_id));
        rule.exit_actions.retain(|a| !action_references_thing(a, thing_id));

        if rule.actions.is_empty() && rule.exit_actions.is_empty() {
            self.remove_rule_inner(rule.id, false).await
        } else {
            self.store.put_rule(rule.clone()).await?;
            self.rules.write().unwrap().insert(rule.id, rule.clone());
            self.events.emit_changed(rule.clone());
            self.log.log(
                LogRecord::new(Uuid::new_v4(), "changed").with("id", rule.id.to_string()),
            );
            Ok(())
        }
    }

    /// Trim or remove every rule referencing `thing_id`, per spec §4.9.
    pub async fn on_thing_removed(&self, thing_id: ThingId) -> Result<()> {
        for rule_id in self.find_rules(thing_id) {
            self.remove_thing_from_rule(rule_id, thing_id).await?;
        }
        Ok(())
    }
}

fn is_event_based_action(action: &RuleAction) -> bool {
    action.is_event_based()
}

fn action_references_thing(action: &RuleAction, thing_id: ThingId) -> bool {
    match action {
        RuleAction::Thing { thing_id: t, params, .. } => {
            *t == thing_id
                || params
                    .iter()
                    .any(|p| matches!(p, RuleActionParam::StateBased { state_thing_id, .. } if *state_thing_id == thing_id))
        }
        RuleAction::Interface { params, .. } => params
            .iter()
            .any(|p| matches!(p, RuleActionParam::StateBased { state_thing_id, .. } if *state_thing_id == thing_id)),
        RuleAction::Browser { thing_id: t, .. } => *t == thing_id,
    }
}

/// Spec §4.5: does `event` match any of `rule`'s event descriptors?
fn event_matches_rule(rule: &Rule, event: &Event, things: &dyn ThingManager) -> bool {
    rule.event_descriptors
        .iter()
        .any(|descriptor| event_matches_descriptor(descriptor, event, things))
}

fn event_matches_descriptor(descriptor: &EventDescriptor, event: &Event, things: &dyn ThingManager) -> bool {
    match descriptor {
        EventDescriptor::ThingBound {
            event_type_id,
            thing_id,
            param_descriptors,
        } => {
            *event_type_id == event.event_type_id
                && *thing_id == event.thing_id
                && param_descriptors_match(param_descriptors, event)
        }
        EventDescriptor::InterfaceBound {
            interface_name,
            interface_event,
            param_descriptors,
        } => {
            let Some(thing) = things.thing(event.thing_id) else {
                return false;
            };
            let Some(class) = things.thing_class(thing.thing_class_id) else {
                return false;
            };
            if !class.implements(interface_name) {
                return false;
            }
            let name_matches = class
                .event_type(event.event_type_id)
                .map(|e| e.name == *interface_event)
                .or_else(|| {
                    class
                        .state_type(crate::models::StateTypeId::from(event.event_type_id.as_uuid()))
                        .map(|s| s.name == *interface_event)
                })
                .unwrap_or(false);
            name_matches && param_descriptors_match(param_descriptors, event)
        }
    }
}

fn param_descriptors_match(descriptors: &[ParamDescriptor], event: &Event) -> bool {
    descriptors.iter().all(|descriptor| {
        let current = match (&descriptor.id, &descriptor.name) {
            (Some(id), _) => event.param_value(*id),
            (None, Some(name)) => event.param_value_by_name(name),
            (None, None) => None,
        };
        match current {
            Some(value) => descriptor.operator.apply(value, &descriptor.value),
            None => false,
        }
    })
}

/// Run the six ordered validation checks from spec §4.1, halting at the
/// first failure.
fn validate_rule(rule: &Rule, things: &dyn ThingManager) -> Result<()> {
    // 2. Consistency: at least one action; exit actions require a non-event trigger.
    if rule.actions.is_empty() {
        return Err(RuleEngineError::InvalidRuleFormat("rule has no actions".into()));
    }
    let has_non_event_trigger = !rule.state_evaluator.is_empty() || !rule.time_descriptor.calendar_items.is_empty();
    if !rule.exit_actions.is_empty() && !has_non_event_trigger {
        return Err(RuleEngineError::InvalidRuleFormat(
            "exit actions require a non-event trigger".into(),
        ));
    }

    // 3. Event descriptors reference real things/interfaces and event/state types.
    for descriptor in &rule.event_descriptors {
        match descriptor {
            EventDescriptor::ThingBound { event_type_id, thing_id, .. } => {
                let thing = things.thing(*thing_id).ok_or(RuleEngineError::ThingNotFound { id: *thing_id })?;
                let class = things
                    .thing_class(thing.thing_class_id)
                    .ok_or(RuleEngineError::ThingNotFound { id: *thing_id })?;
                let has_event = class.event_type(*event_type_id).is_some();
                let has_state = class
                    .state_type(crate::models::StateTypeId::from(event_type_id.as_uuid()))
                    .is_some();
                if !has_event && !has_state {
                    return Err(RuleEngineError::EventTypeNotFound { id: *event_type_id });
                }
            }
            EventDescriptor::InterfaceBound { interface_name, interface_event, .. } => {
                let implementers = things.things_implementing(interface_name);
                if implementers.is_empty() {
                    return Err(RuleEngineError::InterfaceNotFound { interface: interface_name.clone() });
                }
                let declares_event = implementers.iter().any(|thing| {
                    things
                        .thing_class(thing.thing_class_id)
                        .map(|c| c.event_type_by_name(interface_event).is_some())
                        .unwrap_or(false)
                });
                if !declares_event {
                    return Err(RuleEngineError::InterfaceNotFound { interface: interface_name.clone() });
                }
            }
        }
    }

    // 4. State evaluator structural validity.
    validate_evaluator(&rule.state_evaluator, things)?;

    // 5. Time descriptor structural validity.
    for item in &rule.time_descriptor.calendar_items {
        if item.duration <= chrono::Duration::zero() {
            return Err(RuleEngineError::InvalidCalendarItem("duration must be positive".into()));
        }
        if !item.repeating.is_empty() && !item.repeating.is_valid() {
            return Err(RuleEngineError::InvalidRepeatingOption(
                "weekday must be 1-7 and month day must be 1-31".into(),
            ));
        }
    }
    for item in &rule.time_descriptor.time_event_items {
        if !item.repeating.is_empty() && !item.repeating.is_valid() {
            return Err(RuleEngineError::InvalidRepeatingOption(
                "weekday must be 1-7 and month day must be 1-31".into(),
            ));
        }
    }

    // 6. Actions: well-formed, event-based params reference in-rule event types, exit actions never event-based.
    let event_type_ids: HashSet<_> = rule
        .event_descriptors
        .iter()
        .filter_map(|d| match d {
            EventDescriptor::ThingBound { event_type_id, .. } => Some(*event_type_id),
            EventDescriptor::InterfaceBound { .. } => None,
        })
        .collect();

    for action in rule.actions.iter().chain(rule.exit_actions.iter()) {
        validate_action(action, things, &rule.event_descriptors, &event_type_ids)?;
    }
    for action in &rule.exit_actions {
        if action.is_event_based() {
            return Err(RuleEngineError::ContainsEventBasesAction);
        }
    }

    Ok(())
}

fn validate_evaluator(evaluator: &crate::models::StateEvaluator, things: &dyn ThingManager) -> Result<()> {
    use crate::models::{StateDescriptor, StateValueSource};

    if let Some(descriptor) = &evaluator.state_descriptor {
        match descriptor {
            StateDescriptor::ThingBound { state_type_id, thing_id, value, .. } => {
                let thing = things.thing(*thing_id).ok_or(RuleEngineError::ThingNotFound { id: *thing_id })?;
                let class = things
                    .thing_class(thing.thing_class_id)
                    .ok_or(RuleEngineError::ThingNotFound { id: *thing_id })?;
                let state_type = class
                    .state_type(*state_type_id)
                    .ok_or(RuleEngineError::StateTypeNotFound { id: *state_type_id })?;
                match value {
                    StateValueSource::Literal(literal) => {
                        if state_type.validate_literal(literal).is_none() {
                            return Err(RuleEngineError::InvalidStateEvaluatorValue(format!(
                                "value {literal} out of range for state {state_type_id}"
                            )));
                        }
                    }
                    StateValueSource::StateRef { value_thing_id, value_state_type_id } => {
                        let ref_thing = things
                            .thing(*value_thing_id)
                            .ok_or(RuleEngineError::ThingNotFound { id: *value_thing_id })?;
                        let ref_class = things
                            .thing_class(ref_thing.thing_class_id)
                            .ok_or(RuleEngineError::ThingNotFound { id: *value_thing_id })?;
                        ref_class
                            .state_type(*value_state_type_id)
                            .ok_or(RuleEngineError::StateTypeNotFound { id: *value_state_type_id })?;
                    }
                }
            }
            StateDescriptor::InterfaceBound { interface_name, .. } => {
                if things.things_implementing(interface_name).is_empty() {
                    return Err(RuleEngineError::InterfaceNotFound { interface: interface_name.clone() });
                }
            }
        }
    }
    for child in &evaluator.child_evaluators {
        validate_evaluator(child, things)?;
    }
    Ok(())
}

fn validate_action(
    action: &RuleAction,
    things: &dyn ThingManager,
    event_descriptors: &[EventDescriptor],
    event_type_ids: &HashSet<crate::models::EventTypeId>,
) -> Result<()> {
    match action {
        RuleAction::Thing { thing_id, action_type_id, params } => {
            let thing = things.thing(*thing_id).ok_or(RuleEngineError::ThingNotFound { id: *thing_id })?;
            let class = things
                .thing_class(thing.thing_class_id)
                .ok_or(RuleEngineError::ThingNotFound { id: *thing_id })?;
            let action_type = class
                .action_type(*action_type_id)
                .ok_or(RuleEngineError::ActionTypeNotFound { name: action_type_id.to_string() })?;
            validate_action_params(params, action_type, event_descriptors, event_type_ids, things)
        }
        RuleAction::Interface { interface_name, interface_action, params } => {
            let implementers = things.things_implementing(interface_name);
            if implementers.is_empty() {
                return Err(RuleEngineError::InterfaceNotFound { interface: interface_name.clone() });
            }
            let action_type = implementers
                .iter()
                .find_map(|thing| {
                    things
                        .thing_class(thing.thing_class_id)
                        .and_then(|class| class.action_type_by_name(interface_action).cloned())
                })
                .ok_or_else(|| RuleEngineError::ActionTypeNotFound { name: interface_action.clone() })?;
            validate_action_params(params, &action_type, event_descriptors, event_type_ids, things)
        }
        RuleAction::Browser { thing_id, browser_item_id } => {
            things.thing(*thing_id).ok_or(RuleEngineError::ThingNotFound { id: *thing_id })?;
            if browser_item_id.is_empty() {
                return Err(RuleEngineError::InvalidRuleActionParameter(
                    "browser action requires a non-empty browserItemId".into(),
                ));
            }
            Ok(())
        }
    }
}

/// Spec §4.1 step 6: event-based params must reference an event type the
/// rule actually triggers on, and every param's source value must be
/// type-compatible with the action parameter it feeds (`TypesNotMatching`).
fn validate_action_params(
    params: &[RuleActionParam],
    action_type: &crate::models::ActionTypeSpec,
    event_descriptors: &[EventDescriptor],
    event_type_ids: &HashSet<crate::models::EventTypeId>,
    things: &dyn ThingManager,
) -> Result<()> {
    for param in params {
        let declared = action_type
            .param_types
            .iter()
            .find(|p| p.id == param.param_type_id());

        match param {
            RuleActionParam::Value { value, .. } => {
                if let Some(declared) = declared {
                    if declared.value_type.coerce(value).is_none() {
                        return Err(RuleEngineError::TypesNotMatching {
                            expected: format!("{:?}", declared.value_type),
                            actual: value.to_string(),
                        });
                    }
                }
            }
            RuleActionParam::EventBased { event_type_id, event_param_type_id, .. } => {
                if !event_type_ids.contains(event_type_id) {
                    return Err(RuleEngineError::InvalidRuleActionParameter(format!(
                        "event-based param references event type {event_type_id} not present in this rule's event descriptors"
                    )));
                }
                if let (Some(declared), Some(source)) = (
                    declared,
                    event_param_value_type(*event_type_id, *event_param_type_id, event_descriptors, things),
                ) {
                    if source != declared.value_type {
                        return Err(RuleEngineError::TypesNotMatching {
                            expected: format!("{:?}", declared.value_type),
                            actual: format!("{source:?}"),
                        });
                    }
                }
            }
            RuleActionParam::StateBased { state_thing_id, state_type_id, .. } => {
                if let (Some(declared), Some(source)) =
                    (declared, state_value_type(*state_thing_id, *state_type_id, things))
                {
                    if source != declared.value_type {
                        return Err(RuleEngineError::TypesNotMatching {
                            expected: format!("{:?}", declared.value_type),
                            actual: format!("{source:?}"),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn event_param_value_type(
    event_type_id: crate::models::EventTypeId,
    param_type_id: crate::models::ParamTypeId,
    event_descriptors: &[EventDescriptor],
    things: &dyn ThingManager,
) -> Option<crate::models::ValueType> {
    event_descriptors.iter().find_map(|d| match d {
        EventDescriptor::ThingBound { event_type_id: et, thing_id, .. } if *et == event_type_id => {
            let thing = things.thing(*thing_id)?;
            let class = things.thing_class(thing.thing_class_id)?;
            let event_type = class.event_type(event_type_id)?;
            event_type
                .param_types
                .iter()
                .find(|p| p.id == param_type_id)
                .map(|p| p.value_type)
        }
        _ => None,
    })
}

fn state_value_type(
    thing_id: ThingId,
    state_type_id: crate::models::StateTypeId,
    things: &dyn ThingManager,
) -> Option<crate::models::ValueType> {
    let thing = things.thing(thing_id)?;
    let class = things.thing_class(thing.thing_class_id)?;
    class.state_type(state_type_id).map(|s| s.value_type)
}
