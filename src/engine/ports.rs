// Collaborator ports -- abstract interfaces to the Thing Manager and Log
// Sink (spec §6.1, §6.3). The rule engine only ever talks to these traits;
// concrete implementations (device manager, logging backend) live outside
// this crate's scope.

use crate::models::{
    ActionTypeId, ParamTypeId, ParamValue, StateTypeId, Thing, ThingClass, ThingId,
};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A concrete, fully-bound action ready to submit to a thing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcreteAction {
    pub thing_id: ThingId,
    pub action_type_id: ActionTypeId,
    pub params: Vec<ParamValue>,
}

/// Outcome status of a submitted action, mirroring
/// `circuit_breaker::models::function::ExecutionStatus` / `AgentExecutionStatus`
/// but scoped to the vocabulary spec §4.7 and §7 require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    NoError,
    SetupFailed,
    InvalidParameter,
    Timeout,
    Async,
}

/// The result of one completed action submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionInfo {
    pub status: ActionStatus,
    pub display_message: Option<String>,
}

/// Read-only, synchronous access to configured things and their state,
/// plus asynchronous action submission. Spec §5 requires state reads to be
/// synchronous getters and action submission to return an async handle.
#[async_trait]
pub trait ThingManager: Send + Sync {
    fn things(&self) -> Vec<Thing>;
    fn thing(&self, id: ThingId) -> Option<Thing>;
    fn thing_class(&self, id: Uuid) -> Option<ThingClass>;
    fn things_implementing(&self, interface: &str) -> Vec<Thing>;

    /// Current value of a thing's state, or `None` if the thing or state is
    /// unknown. A `None` read in an evaluator is a run-time `false` with a
    /// logged warning, never a panic (spec §9, Open Question (a)).
    fn state_value(&self, thing_id: ThingId, state_type_id: StateTypeId) -> Option<serde_json::Value>;

    /// Submit one concrete action. Completion arrives asynchronously; the
    /// returned future resolves once, matching the "single-completion
    /// contract" design note in spec §9.
    async fn submit_action(&self, action: ConcreteAction, timeout: std::time::Duration) -> Result<ActionInfo>;

    /// Open a browser item registered on `thing_id`, the counterpart to the
    /// original's `ThingManager::executeBrowserItem`.
    async fn submit_browser_action(&self, thing_id: ThingId, browser_item_id: &str) -> Result<ActionInfo>;
}

/// A structured log record, tagged the way spec §6.3's `LogSink` describes:
/// `{id, event}` plus free-form fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: Uuid,
    pub event: String,
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogRecord {
    pub fn new(id: Uuid, event: impl Into<String>) -> Self {
        Self {
            id,
            event: event.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// `register(source, fields) -> Logger; log(tagset, fields)` collapsed into
/// one trait: the rule engine always logs under the source `"rules"`.
pub trait LogSink: Send + Sync {
    fn log(&self, record: LogRecord);
}

/// Default sink: structured `tracing` events, as `circuit_breaker`'s
/// `engine::events::EventBus` logs via `tracing::debug!`.
#[derive(Debug, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, record: LogRecord) {
        tracing::info!(source = "rules", id = %record.id, event = %record.event, fields = ?record.fields);
    }
}

/// An in-memory sink used by tests to assert on emitted records.
#[derive(Debug, Default)]
pub struct InMemoryLogSink {
    records: std::sync::Mutex<Vec<LogRecord>>,
}

impl InMemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl LogSink for InMemoryLogSink {
    fn log(&self, record: LogRecord) {
        self.records.lock().unwrap().push(record);
    }
}
