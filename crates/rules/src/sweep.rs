//! Confirmation of deferred-fire rules whose deadline has passed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::evaluate::RuleEvaluator;
use crate::metrics::EngineMetrics;
use crate::state::{MonitoredRuleState, RuleStateTable};
use crate::submit::ActionSubmitter;

pub struct TimeoutSweep {
    table: Arc<RuleStateTable>,
    evaluator: Arc<RuleEvaluator>,
    submitter: Arc<ActionSubmitter>,
    metrics: Arc<EngineMetrics>,
}

impl TimeoutSweep {
    pub fn new(
        table: Arc<RuleStateTable>,
        evaluator: Arc<RuleEvaluator>,
        submitter: Arc<ActionSubmitter>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            table,
            evaluator,
            submitter,
            metrics,
        }
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    /// Confirm every rule whose deadline is strictly before `now`.
    /// Returns how many of them fired.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let expired = self.table.expired(now.timestamp());
        if expired.is_empty() {
            return 0;
        }
        let fired = join_all(expired.into_iter().map(|s| self.confirm(s, now))).await;
        fired.into_iter().filter(|f| *f).count()
    }

    async fn confirm(&self, snapshot: MonitoredRuleState, now: DateTime<Utc>) -> bool {
        let rule = &snapshot.rule;

        // Only the caller that takes the expired deadline of this very
        // definition away proceeds.
        let now_secs = now.timestamp();
        let cleared = self.table.compute(&rule.project_id, &rule.id, |s| {
            if !Arc::ptr_eq(&s.rule, &snapshot.rule) {
                return false;
            }
            match s.deadline {
                Some(deadline) if deadline < now_secs => {
                    s.deadline = None;
                    true
                }
                _ => false,
            }
        });
        if cleared != Some(true) {
            return false;
        }
        debug!(rule_id = %rule.id, rule_name = %rule.name, "timeout expired");

        let evaluation = match self.evaluator.evaluate(rule, None, now).await {
            Ok(e) => e,
            Err(e) => {
                warn!(rule_id = %rule.id, project_id = %rule.project_id, error = %e, "timeout confirmation skipped");
                return false;
            }
        };
        if !evaluation.applies {
            debug!(rule_id = %rule.id, rule_name = %rule.name, "condition reverted during timeout");
            return false;
        }

        self.metrics.record_trigger();
        debug!(rule_id = %rule.id, rule_name = %rule.name, "has triggered after timeout");
        self.submitter.submit_all(rule, &evaluation.values, now).await;
        true
    }
}
