//! Reaction to incoming telemetry: evaluate affected rules and drive their
//! triggered / deferred-fire transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rulewatch_core::Measurement;
use tracing::{debug, warn};

use crate::evaluate::RuleEvaluator;
use crate::metrics::EngineMetrics;
use crate::state::{MonitoredRuleState, RuleStateTable};
use crate::submit::ActionSubmitter;

/// Per-batch tally of what happened to the affected rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub evaluated: usize,
    pub fired: usize,
    pub deferred: usize,
    pub cleared: usize,
    pub skipped: usize,
}

enum Transition {
    Skipped,
    Cleared,
    Unchanged,
    Deferred,
    Fired,
}

pub struct StreamPipeline {
    table: Arc<RuleStateTable>,
    evaluator: Arc<RuleEvaluator>,
    submitter: Arc<ActionSubmitter>,
    metrics: Arc<EngineMetrics>,
}

impl StreamPipeline {
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

    pub async fn on_measurement_batch(
        &self,
        project_id: &str,
        measurements: &[Measurement],
    ) -> BatchOutcome {
        self.on_measurement_batch_at(project_id, measurements, Utc::now()).await
    }

    /// Process a batch as if it arrived at `now`. Heartbeats are ignored.
    pub async fn on_measurement_batch_at(
        &self,
        project_id: &str,
        measurements: &[Measurement],
        now: DateTime<Utc>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for m in measurements.iter().filter(|m| !m.is_heartbeat()) {
            self.metrics.record_measurements(1);
            for state in self.table.rules_referencing(project_id, &m.name) {
                outcome.evaluated += 1;
                match self.process(state, m, now).await {
                    Transition::Skipped => outcome.skipped += 1,
                    Transition::Cleared => outcome.cleared += 1,
                    Transition::Unchanged => {}
                    Transition::Deferred => outcome.deferred += 1,
                    Transition::Fired => outcome.fired += 1,
                }
            }
        }

        outcome
    }

    async fn process(
        &self,
        snapshot: MonitoredRuleState,
        m: &Measurement,
        now: DateTime<Utc>,
    ) -> Transition {
        let rule = &snapshot.rule;
        if !rule.active {
            return Transition::Skipped;
        }
        if snapshot.deadline.is_some() {
            debug!(rule_id = %rule.id, rule_name = %rule.name, "currently in timeout");
            return Transition::Skipped;
        }

        let evaluation = match self
            .evaluator
            .evaluate(rule, Some((m.name.as_str(), m.value)), now)
            .await
        {
            Ok(e) => e,
            Err(e) => {
                warn!(rule_id = %rule.id, project_id = %rule.project_id, variable = %m.name, error = %e, "rule evaluation skipped");
                return Transition::Skipped;
            }
        };

        if !evaluation.applies {
            let was = self
                .table
                .compute(&rule.project_id, &rule.id, |s| std::mem::replace(&mut s.triggered, false));
            return if was == Some(true) {
                debug!(rule_id = %rule.id, rule_name = %rule.name, "condition no longer holds");
                Transition::Cleared
            } else {
                Transition::Unchanged
            };
        }

        if snapshot.triggered {
            return Transition::Unchanged;
        }

        // Rising edge: exactly one caller flips `triggered` and, for deferred
        // rules, installs the deadline in the same step.
        let won = self.table.compute(&rule.project_id, &rule.id, |s| {
            if s.triggered || !Arc::ptr_eq(&s.rule, &snapshot.rule) {
                return false;
            }
            s.triggered = true;
            if s.rule.timeout > 0 && s.deadline.is_none() {
                s.deadline = Some(now.timestamp().saturating_add(s.rule.timeout));
            }
            true
        });
        if won != Some(true) {
            return Transition::Unchanged;
        }

        if rule.timeout > 0 {
            debug!(rule_id = %rule.id, rule_name = %rule.name, timeout = rule.timeout, "start timeout");
            return Transition::Deferred;
        }

        self.metrics.record_trigger();
        debug!(rule_id = %rule.id, rule_name = %rule.name, "has triggered");
        self.submitter.submit_all(rule, &evaluation.values, now).await;
        Transition::Fired
    }
}

#[cfg(test)]
mod tests;
