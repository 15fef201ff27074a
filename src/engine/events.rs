// Signal events emitted as rules are added, removed, and change activity
// (spec §4.9, mirroring nymea's ruleAdded/ruleRemoved/ruleActiveChanged)

use crate::models::{Rule, RuleId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// A lifecycle or activity notification fired by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleEvent {
    Added(Rule),
    Removed(RuleId),
    Changed(Rule),
    ActiveChanged { rule_id: RuleId, active: bool },
}

/// Broadcast channel for `RuleEvent`, one sender shared by the whole engine.
pub struct RuleEventBus {
    sender: broadcast::Sender<RuleEvent>,
}

impl RuleEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuleEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: RuleEvent) {
        debug!(?event, "rule event published");
        let _ = self.sender.send(event);
    }

    pub fn emit_added(&self, rule: Rule) {
        self.publish(RuleEvent::Added(rule));
    }

    pub fn emit_removed(&self, id: RuleId) {
        self.publish(RuleEvent::Removed(id));
    }

    pub fn emit_changed(&self, rule: Rule) {
        self.publish(RuleEvent::Changed(rule));
    }

    pub fn emit_active_changed(&self, rule_id: RuleId, active: bool) {
        self.publish(RuleEvent::ActiveChanged { rule_id, active });
    }
}

impl Default for RuleEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RuleEventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
