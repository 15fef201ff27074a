// NATS JetStream key-value backed rule storage (spec §4.10)

//! # NATS Rule Storage
//!
//! Durable `RuleStore` implementation over a JetStream key-value bucket,
//! following the same shape as `NATSRuleStorage` in the workflow engine
//! this crate is descended from: one bucket, one key per rule, full rules
//! serialized as JSON values rather than spread across multiple subjects.

use crate::engine::storage::RuleStore;
use crate::models::{Rule, RuleId};
use crate::{Result, RuleEngineError};
use async_nats::jetstream::{self, kv};
use async_nats::Client;
use futures::StreamExt;

pub struct NatsRuleStore {
    kv_store: kv::Store,
}

impl NatsRuleStore {
    pub async fn new(nats_client: Client) -> Result<Self> {
        let js = jetstream::new(nats_client);

        let kv_store = js
            .create_key_value(kv::Config {
                bucket: "home_rule_engine_rules".to_string(),
                description: "Home rule engine rule definitions".to_string(),
                max_value_size: 1024 * 1024,
                history: 10,
                ..Default::default()
            })
            .await
            .map_err(|e| RuleEngineError::Storage(anyhow::Error::new(e)))?;

        Ok(Self { kv_store })
    }

    fn rule_key(&self, id: RuleId) -> String {
        format!("rules.{}", id)
    }
}

#[async_trait::async_trait]
impl RuleStore for NatsRuleStore {
    async fn put_rule(&self, rule: Rule) -> Result<Rule> {
        let payload = serde_json::to_vec(&rule)?;
        self.kv_store
            .put(self.rule_key(rule.id), payload.into())
            .await
            .map_err(|e| RuleEngineError::Storage(anyhow::Error::new(e)))?;
        Ok(rule)
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<Rule>> {
        match self.kv_store.get(self.rule_key(id)).await {
            Ok(Some(entry)) => Ok(Some(serde_json::from_slice(&entry)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(RuleEngineError::Storage(anyhow::Error::new(e))),
        }
    }

    async fn list_rules(&self) -> Result<Vec<Rule>> {
        let mut keys = self
            .kv_store
            .keys()
            .await
            .map_err(|e| RuleEngineError::Storage(anyhow::Error::new(e)))?;

        let mut rules = Vec::new();
        while let Some(key_result) = keys.next().await {
            let key = key_result.map_err(|e| RuleEngineError::Storage(anyhow::Error::new(e)))?;
            if !key.starts_with("rules.") {
                continue;
            }
            if let Ok(Some(entry)) = self.kv_store.get(&key).await {
                if let Ok(rule) = serde_json::from_slice::<Rule>(&entry) {
                    rules.push(rule);
                }
            }
        }
        Ok(rules)
    }

    async fn delete_rule(&self, id: RuleId) -> Result<bool> {
        if self.kv_store.get(self.rule_key(id)).await.ok().flatten().is_none() {
            return Ok(false);
        }
        self.kv_store
            .delete(self.rule_key(id))
            .await
            .map_err(|e| RuleEngineError::Storage(anyhow::Error::new(e)))?;
        Ok(true)
    }
}
