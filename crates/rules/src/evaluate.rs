//! Full evaluation of one rule: schedule, value resolution, conditions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rulewatch_core::{LiveValueStore, RuleDefinition};

use crate::condition;
use crate::error::EvalError;
use crate::schedule;

/// Result of evaluating a rule at one instant.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub applies: bool,
    /// Every value used for the decision, reused for placeholder rendering.
    pub values: HashMap<String, Option<f64>>,
}

impl Evaluation {
    fn off_duty() -> Self {
        Self::default()
    }
}

pub struct RuleEvaluator {
    values: Arc<dyn LiveValueStore>,
    lookup_timeout: Duration,
}

impl RuleEvaluator {
    pub fn new(values: Arc<dyn LiveValueStore>, lookup_timeout: Duration) -> Self {
        Self {
            values,
            lookup_timeout,
        }
    }

    /// Evaluate `rule` at `now`.
    ///
    /// `passed` is the value that just arrived; it is used as-is and every
    /// other condition variable is fetched from the live value store. A rule
    /// that is off duty does not apply.
    pub async fn evaluate(
        &self,
        rule: &RuleDefinition,
        passed: Option<(&str, f64)>,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EvalError> {
        if !schedule::is_on_duty(&rule.schedule, now)? {
            return Ok(Evaluation::off_duty());
        }

        let wanted: Vec<String> = rule
            .variables()
            .into_iter()
            .filter(|v| passed.map_or(true, |(name, _)| name != *v))
            .map(str::to_string)
            .collect();

        let mut values = if wanted.is_empty() {
            HashMap::new()
        } else {
            lookup_values(&*self.values, &rule.project_id, &wanted, self.lookup_timeout).await?
        };
        if let Some((name, value)) = passed {
            values.insert(name.to_string(), Some(value));
        }

        let applies = condition::applies(&rule.conditions, &values)?;
        Ok(Evaluation { applies, values })
    }
}

/// Multi-get from the live value store, bounded by `timeout`.
pub(crate) async fn lookup_values(
    store: &dyn LiveValueStore,
    project_id: &str,
    variables: &[String],
    timeout: Duration,
) -> Result<HashMap<String, Option<f64>>, EvalError> {
    match tokio::time::timeout(timeout, store.get_latest_many(project_id, variables)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(EvalError::LookupTimeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::MemoryValueStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rulewatch_core::{Condition, Measurement, Operator, ScheduleItem, StoreError, TimeOfDay};

    fn rule(conditions: Vec<Condition>) -> RuleDefinition {
        RuleDefinition {
            id: "r1".into(),
            project_id: "p1".into(),
            name: "test".into(),
            active: true,
            timeout: 0,
            conditions,
            actions: vec![],
            schedule: vec![],
        }
    }

    fn cond(variable: &str, operator: Operator, target: f64, and_or: bool) -> Condition {
        Condition {
            variable: variable.into(),
            operator,
            target,
            and_or,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap()
    }

    struct SlowStore;

    #[async_trait]
    impl LiveValueStore for SlowStore {
        async fn get_latest_many(
            &self,
            _project_id: &str,
            _variables: &[String],
        ) -> Result<HashMap<String, Option<f64>>, StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(HashMap::new())
        }
    }

    #[tokio::test]
    async fn passed_value_wins_over_store() {
        let store = Arc::new(MemoryValueStore::new());
        store.record("p1", &[Measurement::new("temp", 10.0), Measurement::new("pump", 1.0)]);
        let evaluator = RuleEvaluator::new(store, Duration::from_secs(1));

        let r = rule(vec![
            cond("temp", Operator::Greater, 30.0, false),
            cond("pump", Operator::Equals, 1.0, true),
        ]);
        let eval = evaluator.evaluate(&r, Some(("temp", 35.0)), now()).await.unwrap();
        assert!(eval.applies);
        assert_eq!(eval.values["temp"], Some(35.0));
        assert_eq!(eval.values["pump"], Some(1.0));

        let eval = evaluator.evaluate(&r, None, now()).await.unwrap();
        assert!(!eval.applies);
    }

    #[tokio::test]
    async fn unknown_variable_is_an_error() {
        let evaluator = RuleEvaluator::new(Arc::new(MemoryValueStore::new()), Duration::from_secs(1));
        let r = rule(vec![cond("flow", Operator::Less, 1.0, false)]);
        let err = evaluator.evaluate(&r, None, now()).await.unwrap_err();
        assert!(matches!(err, EvalError::NoValue(v) if v == "flow"));
    }

    #[tokio::test]
    async fn off_duty_does_not_apply_and_skips_lookup() {
        let evaluator = RuleEvaluator::new(Arc::new(SlowStore), Duration::from_millis(10));
        let mut r = rule(vec![cond("temp", Operator::Greater, 0.0, false), cond("x", Operator::Greater, 0.0, false)]);
        r.schedule = vec![ScheduleItem {
            time_from: TimeOfDay::new(0, 0),
            time_to: TimeOfDay::new(0, 0),
            timezone: "UTC".into(),
            active_days: vec![false; 7],
        }];
        let eval = evaluator.evaluate(&r, Some(("temp", 1.0)), now()).await.unwrap();
        assert!(!eval.applies);
    }

    #[tokio::test]
    async fn slow_lookup_times_out() {
        let evaluator = RuleEvaluator::new(Arc::new(SlowStore), Duration::from_millis(20));
        let r = rule(vec![cond("temp", Operator::Greater, 0.0, false)]);
        let err = evaluator.evaluate(&r, None, now()).await.unwrap_err();
        assert!(matches!(err, EvalError::LookupTimeout(_)));
    }
}
