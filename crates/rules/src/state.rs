//! In-memory state of every monitored rule, bucketed per project.
//!
//! The table is a cache rebuilt from the rule store; nothing here is
//! persisted. All per-rule transitions go through [`RuleStateTable::compute`],
//! which holds the write lock of a single entry for the duration of the
//! closure. Iterating methods return owned snapshots so callers never hold a
//! map guard across an `.await` or a nested write.

use std::sync::Arc;

use dashmap::DashMap;
use rulewatch_core::RuleDefinition;

/// Runtime state of one rule.
#[derive(Debug, Clone)]
pub struct MonitoredRuleState {
    pub rule: Arc<RuleDefinition>,
    /// Set on a rising edge that has been acted upon, cleared on the falling edge.
    pub triggered: bool,
    /// Deferred-fire deadline in unix seconds.
    pub deadline: Option<i64>,
}

impl MonitoredRuleState {
    /// Untriggered state without a deadline.
    pub fn new(rule: RuleDefinition) -> Self {
        Self {
            rule: Arc::new(rule),
            triggered: false,
            deadline: None,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.rule.project_id
    }

    pub fn rule_id(&self) -> &str {
        &self.rule.id
    }
}

type Bucket = Arc<DashMap<String, MonitoredRuleState>>;

/// Concurrent map of project id to rule id to [`MonitoredRuleState`].
#[derive(Debug, Default)]
pub struct RuleStateTable {
    projects: DashMap<String, Bucket>,
}

impl RuleStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, project_id: &str) -> Option<Bucket> {
        self.projects.get(project_id).map(|b| Arc::clone(b.value()))
    }

    /// Number of tracked rules across all projects.
    pub fn len(&self) -> usize {
        self.projects.iter().map(|b| b.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of projects with at least one tracked rule.
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn get(&self, project_id: &str, rule_id: &str) -> Option<MonitoredRuleState> {
        self.bucket(project_id)?.get(rule_id).map(|s| s.value().clone())
    }

    /// Insert or replace the state under its rule's project.
    pub fn insert(&self, state: MonitoredRuleState) {
        let bucket = Arc::clone(
            self.projects
                .entry(state.project_id().to_string())
                .or_default()
                .value(),
        );
        bucket.insert(state.rule_id().to_string(), state);
    }

    /// Remove a rule, dropping its project bucket once empty.
    pub fn remove(&self, project_id: &str, rule_id: &str) -> Option<MonitoredRuleState> {
        let bucket = self.bucket(project_id)?;
        let removed = bucket.remove(rule_id).map(|(_, state)| state);
        self.projects.remove_if(project_id, |_, b| b.is_empty());
        removed
    }

    /// Apply `f` to one entry under its write lock.
    ///
    /// Returns `None` when the entry does not exist (for example, deleted by
    /// a concurrent reconcile); callers treat that as a no-op.
    pub fn compute<R>(
        &self,
        project_id: &str,
        rule_id: &str,
        f: impl FnOnce(&mut MonitoredRuleState) -> R,
    ) -> Option<R> {
        let bucket = self.bucket(project_id)?;
        let mut entry = bucket.get_mut(rule_id)?;
        Some(f(entry.value_mut()))
    }

    /// Snapshots of the project's rules that have a condition on `variable`.
    pub fn rules_referencing(&self, project_id: &str, variable: &str) -> Vec<MonitoredRuleState> {
        let Some(bucket) = self.bucket(project_id) else {
            return Vec::new();
        };
        bucket
            .iter()
            .filter(|e| e.value().rule.references(variable))
            .map(|e| e.value().clone())
            .collect()
    }

    /// Snapshots of every tracked rule.
    pub fn snapshot(&self) -> Vec<MonitoredRuleState> {
        let buckets: Vec<Bucket> = self.projects.iter().map(|b| Arc::clone(b.value())).collect();
        buckets
            .iter()
            .flat_map(|b| b.iter().map(|e| e.value().clone()).collect::<Vec<_>>())
            .collect()
    }

    /// Snapshots of rules whose deadline lies strictly before `now`.
    pub fn expired(&self, now: i64) -> Vec<MonitoredRuleState> {
        self.snapshot()
            .into_iter()
            .filter(|s| s.deadline.is_some_and(|d| d < now))
            .collect()
    }
}
