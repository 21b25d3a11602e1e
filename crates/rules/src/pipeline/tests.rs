use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeZone;
use rulewatch_core::{
    Action, ActionParams, Condition, LiveValueStore, NotificationSink, NotifyError, Operator,
    RuleDefinition,
};
use tokio::sync::Mutex;

use super::*;
use crate::values::MemoryValueStore;

#[derive(Default)]
struct RecordingSink {
    submitted: Mutex<Vec<Action>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn submit(&self, action: &Action) -> Result<(), NotifyError> {
        self.submitted.lock().await.push(action.clone());
        Ok(())
    }
}

struct Harness {
    table: Arc<RuleStateTable>,
    values: Arc<MemoryValueStore>,
    sink: Arc<RecordingSink>,
    metrics: Arc<EngineMetrics>,
    pipeline: StreamPipeline,
}

fn harness() -> Harness {
    let table = Arc::new(RuleStateTable::new());
    let values = Arc::new(MemoryValueStore::new());
    let sink = Arc::new(RecordingSink::default());
    let metrics = Arc::new(EngineMetrics::new());
    let store: Arc<dyn LiveValueStore> = values.clone();
    let evaluator = Arc::new(RuleEvaluator::new(store.clone(), Duration::from_secs(1)));
    let submitter = Arc::new(ActionSubmitter::new(
        store,
        sink.clone(),
        Duration::from_secs(1),
        Duration::from_secs(1),
    ));
    let pipeline = StreamPipeline::new(table.clone(), evaluator, submitter, metrics.clone());
    Harness {
        table,
        values,
        sink,
        metrics,
        pipeline,
    }
}

fn hot_rule(id: &str, timeout: i64) -> RuleDefinition {
    RuleDefinition {
        id: id.into(),
        project_id: "p1".into(),
        name: format!("{id} too hot"),
        active: true,
        timeout,
        conditions: vec![Condition {
            variable: "temp".into(),
            operator: Operator::Greater,
            target: 30.0,
            and_or: false,
        }],
        actions: vec![Action {
            kind: "alert".into(),
            params: ActionParams {
                body: "{{rule}}: {{temp}}".into(),
                ..Default::default()
            },
        }],
        schedule: vec![],
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn temp(v: f64) -> Vec<Measurement> {
    vec![Measurement::new("temp", v)]
}

impl Harness {
    async fn feed(&self, v: f64, now: DateTime<Utc>) -> BatchOutcome {
        let batch = temp(v);
        self.values.record("p1", &batch);
        self.pipeline.on_measurement_batch_at("p1", &batch, now).await
    }
}

#[tokio::test]
async fn immediate_rule_fires_once_per_rising_edge() {
    let h = harness();
    h.table.insert(MonitoredRuleState::new(hot_rule("r1", 0)));

    let first = h.feed(35.0, at(0)).await;
    assert_eq!(first.fired, 1);
    let second = h.feed(36.0, at(1)).await;
    assert_eq!(second.fired, 0);

    let submitted = h.sink.submitted.lock().await;
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].params.body, "r1 too hot: 35.00");
    assert_eq!(submitted[0].params.project_id.as_deref(), Some("p1"));
    assert_eq!(h.metrics.triggers_total(), 1);
}

#[tokio::test]
async fn falling_edge_rearms_the_rule() {
    let h = harness();
    h.table.insert(MonitoredRuleState::new(hot_rule("r1", 0)));

    h.feed(35.0, at(0)).await;
    let fall = h.feed(20.0, at(1)).await;
    assert_eq!(fall.cleared, 1);
    assert!(!h.table.get("p1", "r1").unwrap().triggered);

    // Clearing again is a no-op.
    let again = h.feed(19.0, at(2)).await;
    assert_eq!(again.cleared, 0);
    assert!(!h.table.get("p1", "r1").unwrap().triggered);

    h.feed(40.0, at(3)).await;
    assert_eq!(h.sink.submitted.lock().await.len(), 2);
}

#[tokio::test]
async fn deferred_rule_installs_deadline_without_notifying() {
    let h = harness();
    h.table.insert(MonitoredRuleState::new(hot_rule("r1", 300)));

    let outcome = h.feed(35.0, at(0)).await;
    assert_eq!(outcome.deferred, 1);
    let state = h.table.get("p1", "r1").unwrap();
    assert!(state.triggered);
    assert_eq!(state.deadline, Some(at(300).timestamp()));
    assert!(h.sink.submitted.lock().await.is_empty());
    assert_eq!(h.metrics.triggers_total(), 0);
}

#[tokio::test]
async fn rule_in_timeout_is_not_evaluated() {
    let h = harness();
    h.table.insert(MonitoredRuleState::new(hot_rule("r1", 300)));
    h.feed(35.0, at(0)).await;

    let outcome = h.feed(10.0, at(5)).await;
    assert_eq!(outcome.skipped, 1);
    let state = h.table.get("p1", "r1").unwrap();
    assert!(state.triggered);
    assert!(state.deadline.is_some());
}

#[tokio::test]
async fn heartbeats_and_other_projects_are_ignored() {
    let h = harness();
    h.table.insert(MonitoredRuleState::new(hot_rule("r1", 0)));

    let outcome = h
        .pipeline
        .on_measurement_batch_at("p1", &[Measurement::new("", 99.0)], at(0))
        .await;
    assert_eq!(outcome, BatchOutcome::default());

    let outcome = h.pipeline.on_measurement_batch_at("p2", &temp(99.0), at(0)).await;
    assert_eq!(outcome.evaluated, 0);
    assert_eq!(h.metrics.measurements_total(), 1);
}

#[tokio::test]
async fn inactive_rule_is_skipped() {
    let h = harness();
    let mut rule = hot_rule("r1", 0);
    rule.active = false;
    h.table.insert(MonitoredRuleState::new(rule));

    let outcome = h.feed(35.0, at(0)).await;
    assert_eq!(outcome.skipped, 1);
    assert!(h.sink.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn missing_companion_value_skips_the_rule() {
    let h = harness();
    let mut rule = hot_rule("r1", 0);
    rule.conditions.push(Condition {
        variable: "pump".into(),
        operator: Operator::Equals,
        target: 1.0,
        and_or: true,
    });
    h.table.insert(MonitoredRuleState::new(rule));

    let outcome = h.feed(35.0, at(0)).await;
    assert_eq!(outcome.skipped, 1);
    assert!(!h.table.get("p1", "r1").unwrap().triggered);

    h.values.set("p1", "pump", 1.0);
    assert_eq!(h.feed(35.0, at(1)).await.fired, 1);
}

#[tokio::test]
async fn evaluation_of_replaced_definition_is_discarded() {
    let h = harness();
    h.table.insert(MonitoredRuleState::new(hot_rule("r1", 0)));
    let stale = h.table.get("p1", "r1").unwrap();

    // A reconcile swaps the definition between snapshot and transition.
    h.table.insert(MonitoredRuleState::new(hot_rule("r1", 0)));

    let transition = h.pipeline.process(stale, &Measurement::new("temp", 35.0), at(0)).await;
    assert!(matches!(transition, Transition::Unchanged));
    assert!(!h.table.get("p1", "r1").unwrap().triggered);
}

#[tokio::test]
async fn huge_timeout_saturates_the_deadline() {
    let h = harness();
    h.table.insert(MonitoredRuleState::new(hot_rule("r1", i64::MAX)));

    let outcome = h.feed(35.0, at(0)).await;
    assert_eq!(outcome.deferred, 1);
    assert_eq!(h.table.get("p1", "r1").unwrap().deadline, Some(i64::MAX));
}
