// Home Rule Engine -- a reactive evaluator over device events, state
// changes, and time ticks, with persistent rule storage and action dispatch

//! # Home Rule Engine
//!
//! This crate implements a standalone reactive rule engine for home
//! automation: rules react to device events, state changes, and calendar or
//! time-of-day schedules, evaluate a nested boolean condition tree, and
//! dispatch actions back to devices through the [`ThingManager`] port.
//!
//! ## Core Components
//!
//! - [`models`]: the domain types -- identifiers, descriptors, the state
//!   evaluator tree, time descriptors, actions, and the `Rule` aggregate.
//! - [`engine`]: the orchestrator, its collaborator ports (`ThingManager`,
//!   `LogSink`), persistent storage (`RuleStore`, `NatsRuleStore`), the
//!   signal event bus, and action dispatch.
//!
//! The engine never talks to real devices directly -- it only ever calls
//! through [`ThingManager`], so it can be embedded into any system that
//! implements that trait.

pub mod engine;
pub mod models;

pub use engine::dispatch::dispatch_actions;
pub use engine::rule_engine::RuleEngine;
pub use engine::events::{RuleEvent, RuleEventBus};
pub use engine::nats_storage::NatsRuleStore;
pub use engine::ports::{
    ActionInfo, ActionStatus, ConcreteAction, InMemoryLogSink, LogRecord, LogSink, ThingManager,
    TracingLogSink,
};
pub use engine::storage::{InMemoryRuleStore, RuleStore};
pub use models::{
    ActionTarget, ActionTypeId, ActionTypeSpec, CalendarItem, Event, EventDescriptor,
    EventTypeId, EventTypeSpec, LogicOperator, ParamDescriptor, ParamTypeId, ParamTypeSpec,
    ParamValue, RepeatingMode, RepeatingOption, ResolvedParam, Rule, RuleAction, RuleActionParam,
    RuleActivity, RuleId, StateDescriptor, StateEvaluator, StateTypeId, StateTypeSpec,
    StateValueSource, Thing, ThingClass, ThingId, TimeDescriptor, TimeEvaluation, TimeEventItem,
    ValueOperator, ValueType,
};

use thiserror::Error;

/// Error conditions the rule engine can report, covering rule validation
/// (spec §4.1), lookup failures, and time-descriptor validation (spec §4.6).
#[derive(Error, Debug)]
pub enum RuleEngineError {
    #[error("invalid rule id: {0}")]
    InvalidRuleId(String),

    #[error("rule not found: {id}")]
    RuleNotFound { id: crate::models::RuleId },

    #[error("thing not found: {id}")]
    ThingNotFound { id: crate::models::ThingId },

    #[error("event type not found: {id}")]
    EventTypeNotFound { id: crate::models::EventTypeId },

    #[error("state type not found: {id}")]
    StateTypeNotFound { id: crate::models::StateTypeId },

    #[error("action type not found: {name}")]
    ActionTypeNotFound { name: String },

    #[error("interface not found: {interface}")]
    InterfaceNotFound { interface: String },

    #[error("invalid rule format: {0}")]
    InvalidRuleFormat(String),

    #[error("missing parameter: {name}")]
    MissingParameter { name: String },

    #[error("invalid rule action parameter: {0}")]
    InvalidRuleActionParameter(String),

    #[error("invalid state evaluator value: {0}")]
    InvalidStateEvaluatorValue(String),

    #[error("types not matching: expected {expected}, got {actual}")]
    TypesNotMatching { expected: String, actual: String },

    #[error("rule is not executable: {id}")]
    NotExecutable { id: crate::models::RuleId },

    #[error("rule has no exit actions: {id}")]
    NoExitActions { id: crate::models::RuleId },

    #[error("exit actions must not contain event-based parameters")]
    ContainsEventBasesAction,

    #[error("invalid calendar item: {0}")]
    InvalidCalendarItem(String),

    #[error("invalid repeating option: {0}")]
    InvalidRepeatingOption(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleEngineError>;
