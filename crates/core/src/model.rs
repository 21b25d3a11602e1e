//! Rule definitions and telemetry measurements shared by every rulewatch crate.
//!
//! Rule definitions are owned by the rule store; the engine only ever holds
//! immutable snapshots of them. Field names follow the JSON documents stored
//! in the `project_rule` table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Rules ─────────────────────────────────────────────────────

/// A user-authored rule: conditions, actions, schedule and trigger timeout.
///
/// Two snapshots compare equal when every authored field is equal. The
/// reconciler relies on this to tell changed rules from unchanged ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    pub active: bool,
    /// Confirmation window in seconds; 0 fires on the rising edge.
    #[serde(default)]
    pub timeout: i64,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub schedule: Vec<ScheduleItem>,
}

impl RuleDefinition {
    /// Whether any condition of this rule reads `variable`.
    pub fn references(&self, variable: &str) -> bool {
        self.conditions.iter().any(|c| c.variable == variable)
    }

    /// Distinct condition variables in authoring order.
    pub fn variables(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            if !out.contains(&condition.variable.as_str()) {
                out.push(condition.variable.as_str());
            }
        }
        out
    }
}

/// One comparison of a variable against a numeric target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub variable: String,
    #[serde(rename = "condition")]
    pub operator: Operator,
    pub target: f64,
    /// `true` combines with the running result via AND, `false` via OR.
    /// Ignored on the first condition.
    #[serde(default)]
    pub and_or: bool,
}

impl Condition {
    /// Compare `value` against this condition's target.
    pub fn holds_for(&self, value: f64) -> bool {
        self.operator.compare(value, self.target)
    }
}

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<", alias = "lt")]
    Less,
    #[serde(rename = "<=", alias = "le", alias = "lte")]
    LessEquals,
    #[serde(rename = "==", alias = "=", alias = "eq")]
    Equals,
    #[serde(rename = "!=", alias = "ne")]
    NotEquals,
    #[serde(rename = ">=", alias = "ge", alias = "gte")]
    GreaterEquals,
    #[serde(rename = ">", alias = "gt")]
    Greater,
}

impl Operator {
    pub fn compare(self, value: f64, target: f64) -> bool {
        match self {
            Self::Less => value < target,
            Self::LessEquals => value <= target,
            Self::Equals => value == target,
            Self::NotEquals => value != target,
            Self::GreaterEquals => value >= target,
            Self::Greater => value > target,
        }
    }
}

// ── Schedule ──────────────────────────────────────────────────

/// A weekly duty window in a named timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub time_from: TimeOfDay,
    pub time_to: TimeOfDay,
    /// IANA zone name, e.g. `Europe/Vienna`. Empty means UTC.
    #[serde(default)]
    pub timezone: String,
    /// Seven flags, index 0 = Sunday.
    #[serde(default)]
    pub active_days: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hours: u32,
    pub minutes: u32,
}

impl TimeOfDay {
    pub const fn new(hours: u32, minutes: u32) -> Self {
        Self { hours, minutes }
    }
}

// ── Actions ───────────────────────────────────────────────────

/// Something to do when a rule fires (email, webhook, alert, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: ActionParams,
}

/// Union of the parameters used by all action kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionParams {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Alert severity.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<i64>,
    #[serde(rename = "project", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recipient: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

// ── Telemetry ─────────────────────────────────────────────────

/// A single telemetry sample. An empty name marks a heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "v")]
    pub value: f64,
    #[serde(rename = "u", default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
    #[serde(rename = "t", default)]
    pub time: f64,
}

impl Measurement {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: String::new(),
            time: 0.0,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.name.is_empty()
    }
}
