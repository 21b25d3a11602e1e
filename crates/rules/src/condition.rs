//! Sequential AND/OR combination of rule conditions.

use std::collections::HashMap;

use rulewatch_core::Condition;

use crate::error::EvalError;

/// Fold `conditions` left to right against resolved `values`.
///
/// The first condition's result seeds the running value; each following
/// condition combines with it via AND when `and_or` is set and OR otherwise.
/// There is no operator precedence: `a OR b AND c` is `(a OR b) AND c`.
/// An empty list never applies.
pub fn applies(
    conditions: &[Condition],
    values: &HashMap<String, Option<f64>>,
) -> Result<bool, EvalError> {
    let mut result = false;
    for (i, condition) in conditions.iter().enumerate() {
        let value = match values.get(&condition.variable) {
            None => return Err(EvalError::MissingVariable(condition.variable.clone())),
            Some(None) => return Err(EvalError::NoValue(condition.variable.clone())),
            Some(Some(v)) => *v,
        };
        let valid = condition.holds_for(value);
        result = if i == 0 {
            valid
        } else if condition.and_or {
            valid && result
        } else {
            valid || result
        };
    }
    Ok(result)
}
