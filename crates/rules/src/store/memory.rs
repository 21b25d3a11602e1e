use async_trait::async_trait;
use dashmap::DashMap;
use rulewatch_core::{RuleDefinition, RuleStore, StoreError};

/// In-process rule store for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: DashMap<String, RuleDefinition>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = RuleDefinition>) -> Self {
        let store = Self::new();
        for rule in rules {
            store.upsert(rule);
        }
        store
    }

    pub fn upsert(&self, rule: RuleDefinition) {
        self.rules.insert(rule.id.clone(), rule);
    }

    pub fn remove(&self, rule_id: &str) -> Option<RuleDefinition> {
        self.rules.remove(rule_id).map(|(_, r)| r)
    }

    /// Mutate a stored rule in place. Returns `false` if it does not exist.
    pub fn update(&self, rule_id: &str, f: impl FnOnce(&mut RuleDefinition)) -> bool {
        match self.rules.get_mut(rule_id) {
            Some(mut rule) => {
                f(rule.value_mut());
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_active_rules(&self) -> Result<Vec<RuleDefinition>, StoreError> {
        Ok(self
            .rules
            .iter()
            .filter(|r| r.value().active)
            .map(|r| r.value().clone())
            .collect())
    }
}
