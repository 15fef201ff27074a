// Persistent storage abstraction for rules (spec §4.10)

//! # Rule Storage
//!
//! `RuleStore` separates the engine's in-memory scheduling state from how
//! rules are persisted. `InMemoryRuleStore` is the default for tests and
//! single-process deployments; `NatsRuleStore` (in `nats_storage.rs`) backs
//! it with a JetStream key-value bucket for durability across restarts.

use crate::models::{Rule, RuleId};
use crate::Result;
use std::collections::HashMap;
use std::sync::RwLock;

#[async_trait::async_trait]
pub trait RuleStore: Send + Sync {
    async fn put_rule(&self, rule: Rule) -> Result<Rule>;
    async fn get_rule(&self, id: RuleId) -> Result<Option<Rule>>;
    async fn list_rules(&self) -> Result<Vec<Rule>>;
    async fn delete_rule(&self, id: RuleId) -> Result<bool>;
}

/// In-memory rule storage, guarded by an `RwLock` so reads don't block each
/// other while edits are rare.
#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<HashMap<RuleId, Rule>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn put_rule(&self, rule: Rule) -> Result<Rule> {
        let mut rules = self.rules.write().unwrap();
        rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<Rule>> {
        let rules = self.rules.read().unwrap();
        Ok(rules.get(&id).cloned())
    }

    async fn list_rules(&self) -> Result<Vec<Rule>> {
        let rules = self.rules.read().unwrap();
        Ok(rules.values().cloned().collect())
    }

    async fn delete_rule(&self, id: RuleId) -> Result<bool> {
        let mut rules = self.rules.write().unwrap();
        Ok(rules.remove(&id).is_some())
    }
}
