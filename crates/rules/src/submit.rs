//! Placeholder rendering and hand-off of fired actions to the sink.
//!
//! Rendering runs in two passes over each action's body and subject:
//! first the built-ins (`{{rule}}`, `{{project}}`, `{{time}}`) and every
//! variable already resolved during evaluation, then any `{{name}}` left
//! over is looked up in the live value store with a single multi-get.
//! Tokens without a value stay verbatim.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use rulewatch_core::{Action, LiveValueStore, NotificationSink, RuleDefinition};
use tracing::{debug, warn};

use crate::error::EvalError;
use crate::evaluate::lookup_values;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}\s]+)\}\}").ok());

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

pub struct ActionSubmitter {
    values: Arc<dyn LiveValueStore>,
    sink: Arc<dyn NotificationSink>,
    lookup_timeout: Duration,
    notify_timeout: Duration,
}

impl ActionSubmitter {
    pub fn new(
        values: Arc<dyn LiveValueStore>,
        sink: Arc<dyn NotificationSink>,
        lookup_timeout: Duration,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            values,
            sink,
            lookup_timeout,
            notify_timeout,
        }
    }

    /// Render and submit every action of `rule`, in order. Each action is
    /// attempted once; a failure is logged and does not stop the others.
    /// Returns the number of actions the sink accepted.
    pub async fn submit_all(
        &self,
        rule: &RuleDefinition,
        known: &HashMap<String, Option<f64>>,
        now: DateTime<Utc>,
    ) -> usize {
        let mut delivered = 0;
        for action in &rule.actions {
            let rendered = match self.render(rule, action, known, now).await {
                Ok(a) => a,
                Err(e) => {
                    warn!(rule_id = %rule.id, action = %action.kind, error = %e, "skipping action, placeholder lookup failed");
                    continue;
                }
            };

            match tokio::time::timeout(self.notify_timeout, self.sink.submit(&rendered)).await {
                Ok(Ok(())) => {
                    debug!(rule_id = %rule.id, action = %rendered.kind, "action submitted");
                    delivered += 1;
                }
                Ok(Err(e)) => {
                    warn!(rule_id = %rule.id, action = %rendered.kind, error = %e, "notification submission failed");
                }
                Err(_) => {
                    warn!(rule_id = %rule.id, action = %rendered.kind, timeout = ?self.notify_timeout, "notification submission timed out");
                }
            }
        }
        delivered
    }

    /// Copy of `action` with placeholders substituted and the project set.
    pub async fn render(
        &self,
        rule: &RuleDefinition,
        action: &Action,
        known: &HashMap<String, Option<f64>>,
        now: DateTime<Utc>,
    ) -> Result<Action, EvalError> {
        let mut out = action.clone();
        let time = now.format(TIME_FORMAT).to_string();
        out.params.body = render_known(&out.params.body, rule, &time, known);
        out.params.subject = render_known(&out.params.subject, rule, &time, known);

        let mut remaining = placeholders(&out.params.body);
        for name in placeholders(&out.params.subject) {
            if !remaining.contains(&name) {
                remaining.push(name);
            }
        }
        if !remaining.is_empty() {
            let found =
                lookup_values(&*self.values, &rule.project_id, &remaining, self.lookup_timeout).await?;
            out.params.body = substitute_values(&out.params.body, &found);
            out.params.subject = substitute_values(&out.params.subject, &found);
        }

        out.params.project_id = Some(rule.project_id.clone());
        Ok(out)
    }
}

fn render_known(
    text: &str,
    rule: &RuleDefinition,
    time: &str,
    known: &HashMap<String, Option<f64>>,
) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = text
        .replace("{{rule}}", &rule.name)
        .replace("{{project}}", &rule.project_id)
        .replace("{{time}}", time);
    substitute_values(&text, known)
}

fn substitute_values(text: &str, values: &HashMap<String, Option<f64>>) -> String {
    let mut text = text.to_string();
    for (name, value) in values {
        if let Some(v) = value {
            text = text.replace(&format!("{{{{{name}}}}}"), &format!("{v:.2}"));
        }
    }
    text
}

/// Distinct placeholder names in order of first appearance.
fn placeholders(text: &str) -> Vec<String> {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
