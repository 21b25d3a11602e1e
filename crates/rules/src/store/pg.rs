use async_trait::async_trait;
use rulewatch_core::config::PostgresConfig;
use rulewatch_core::{Action, Condition, RuleDefinition, RuleStore, ScheduleItem, StoreError};
use serde::de::DeserializeOwned;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

const ACTIVE_RULES: &str = "SELECT id::text AS id, project_id::text AS project_id, name, active,
        timeout::bigint AS timeout,
        COALESCE(conditions::jsonb, '[]'::jsonb) AS conditions,
        COALESCE(actions::jsonb, '[]'::jsonb) AS actions,
        COALESCE(schedule::jsonb, '[]'::jsonb) AS schedule
     FROM project_rule WHERE active = true";

#[derive(Debug, sqlx::FromRow)]
struct ProjectRuleRow {
    id: String,
    project_id: String,
    name: String,
    active: bool,
    timeout: i64,
    conditions: serde_json::Value,
    actions: serde_json::Value,
    schedule: serde_json::Value,
}

impl ProjectRuleRow {
    fn into_rule(self) -> Result<RuleDefinition, StoreError> {
        let conditions: Vec<Condition> = decode_column(&self.id, "conditions", self.conditions)?;
        let actions: Vec<Action> = decode_column(&self.id, "actions", self.actions)?;
        let schedule: Vec<ScheduleItem> = decode_column(&self.id, "schedule", self.schedule)?;
        Ok(RuleDefinition {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            active: self.active,
            timeout: self.timeout,
            conditions,
            actions,
            schedule,
        })
    }
}

fn decode_column<T: DeserializeOwned>(
    rule_id: &str,
    column: &str,
    value: serde_json::Value,
) -> Result<T, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::Decode(format!("rule {rule_id}: column {column}: {e}")))
}

/// Rules from the `project_rule` table.
#[derive(Debug, Clone)]
pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        info!("PostgreSQL connected: {}", config.host);
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    /// Rows whose JSON columns do not decode are skipped and logged; the
    /// rest of the rule set is still returned.
    async fn list_active_rules(&self) -> Result<Vec<RuleDefinition>, StoreError> {
        let rows = sqlx::query_as::<_, ProjectRuleRow>(ACTIVE_RULES)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_rule() {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(error = %e, "skipping undecodable rule"),
            }
        }
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> ProjectRuleRow {
        ProjectRuleRow {
            id: "0d3c".into(),
            project_id: "p1".into(),
            name: "too hot".into(),
            active: true,
            timeout: 30,
            conditions: json!([{"variable": "temp", "condition": ">", "target": 80, "and_or": false}]),
            actions: json!([{"type": "alert", "params": {"type": 3, "body": "hot"}}]),
            schedule: json!([]),
        }
    }

    #[test]
    fn row_decodes_into_rule() {
        let rule = row().into_rule().unwrap();
        assert_eq!(rule.conditions[0].target, 80.0);
        assert_eq!(rule.actions[0].params.severity, Some(3));
        assert!(rule.schedule.is_empty());
        assert_eq!(rule.timeout, 30);
    }

    #[test]
    fn malformed_column_names_rule_and_column() {
        let mut bad = row();
        bad.conditions = json!({"not": "a list"});
        let err = bad.into_rule().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("0d3c") && msg.contains("conditions"), "{msg}");
    }
}
