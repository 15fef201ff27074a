// Core domain models for the rule engine
// Generic, language-agnostic data structures shared by the whole crate

//! # Domain Models Module
//!
//! This directory holds every data type the engine operates on: opaque
//! identifiers, the event/state matching vocabulary, the recursive state
//! evaluator, calendar and time-of-day descriptors, actions and their
//! parameter bindings, device schema types, and the `Rule` aggregate itself.

pub mod action;
pub mod descriptor;
pub mod evaluator;
pub mod ids;
pub mod rule;
pub mod thing;
pub mod time;

pub use action::{ResolvedParam, RuleAction, RuleActionParam};
pub use descriptor::{
    ActionTarget, Event, EventDescriptor, ParamDescriptor, ParamValue, StateDescriptor,
    StateValueSource, ValueOperator,
};
pub use evaluator::{LogicOperator, StateEvaluator};
pub use ids::{ActionTypeId, EventTypeId, ParamTypeId, RuleId, StateTypeId, ThingId};
pub use rule::{Rule, RuleActivity};
pub use thing::{ActionTypeSpec, EventTypeSpec, ParamTypeSpec, StateTypeSpec, Thing, ThingClass, ValueType};
pub use time::{
    CalendarItem, RepeatingMode, RepeatingOption, TimeDescriptor, TimeEvaluation, TimeEventItem,
};
