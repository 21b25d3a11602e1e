//! Periodic sync of the rule store into the [`RuleStateTable`].

use std::collections::HashMap;
use std::sync::Arc;

use rulewatch_core::{RuleDefinition, RuleStore, StoreError};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::metrics::EngineMetrics;
use crate::state::{MonitoredRuleState, RuleStateTable};

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub deleted: usize,
    pub changed: usize,
    pub unchanged: usize,
}

/// Applies the minimal diff between tracked and stored rules.
///
/// Unchanged rules keep their runtime state (triggered flag, pending
/// deadline); changed rules start over untriggered.
pub struct Reconciler {
    table: Arc<RuleStateTable>,
    store: Arc<dyn RuleStore>,
    metrics: Arc<EngineMetrics>,
    gate: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        table: Arc<RuleStateTable>,
        store: Arc<dyn RuleStore>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            table,
            store,
            metrics,
            gate: Mutex::new(()),
        }
    }

    /// Fetch and apply. Returns `Ok(None)` when another pass is still running.
    pub async fn run_once(&self) -> Result<Option<ReconcileReport>, StoreError> {
        let Ok(_guard) = self.gate.try_lock() else {
            debug!("reconcile already in progress, skipping");
            return Ok(None);
        };

        let fetched = match self.store.list_active_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "failed to fetch active rules, keeping current state");
                return Err(e);
            }
        };

        Ok(Some(self.apply(fetched)))
    }

    /// Diff `fetched` against the table and apply the changes.
    pub fn apply(&self, fetched: Vec<RuleDefinition>) -> ReconcileReport {
        let tracked: HashMap<String, MonitoredRuleState> = self
            .table
            .snapshot()
            .into_iter()
            .map(|s| (s.rule.id.clone(), s))
            .collect();
        let fetched: HashMap<String, RuleDefinition> = fetched
            .into_iter()
            .filter(|r| r.active)
            .map(|r| (r.id.clone(), r))
            .collect();

        let mut report = ReconcileReport::default();

        for (id, state) in &tracked {
            if !fetched.contains_key(id) {
                self.table.remove(state.project_id(), id);
                debug!(rule_id = %id, project_id = %state.project_id(), "rule removed");
                report.deleted += 1;
            }
        }

        for (id, rule) in fetched {
            match tracked.get(&id) {
                None => {
                    debug!(rule_id = %id, rule_name = %rule.name, "rule added");
                    self.table.insert(MonitoredRuleState::new(rule));
                    report.created += 1;
                }
                Some(current) if *current.rule == rule => {
                    report.unchanged += 1;
                }
                Some(current) => {
                    if current.project_id() != rule.project_id {
                        self.table.remove(current.project_id(), &id);
                    }
                    debug!(rule_id = %id, rule_name = %rule.name, "rule changed, state reset");
                    self.table.insert(MonitoredRuleState::new(rule));
                    report.changed += 1;
                }
            }
        }

        self.metrics.set_active_rules(self.table.len());
        debug!(
            created = report.created,
            deleted = report.deleted,
            changed = report.changed,
            unchanged = report.unchanged,
            "reconciled rules"
        );
        report
    }
}
