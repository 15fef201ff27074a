// Rule engine execution layer
// The bridge between the domain models and the Thing Manager / Time
// Manager / Log Sink collaborators the engine is driven by

//! # Engine Module
//!
//! `ports` defines the abstract collaborators the engine talks to.
//! `events` is the signal bus rule lifecycle changes are published on.
//! `dispatch` resolves and submits a rule's actions once it fires.
//! `storage` / `nats_storage` persist rules across restarts.
//! `rule_engine` ties all of the above into the orchestrator applications
//! embed.

pub mod dispatch;
pub mod events;
pub mod nats_storage;
pub mod ports;
pub mod rule_engine;
pub mod storage;

pub use events::{RuleEvent, RuleEventBus};
pub use nats_storage::NatsRuleStore;
pub use ports::{ActionInfo, ActionStatus, ConcreteAction, InMemoryLogSink, LogRecord, LogSink, ThingManager, TracingLogSink};
pub use rule_engine::RuleEngine;
pub use storage::{InMemoryRuleStore, RuleStore};
