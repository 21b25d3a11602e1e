use std::time::Duration;

use rulewatch_core::StoreError;
use thiserror::Error;

/// Why a rule could not be evaluated this cycle.
///
/// None of these are fatal: the rule is skipped and picked up again on the
/// next measurement or sweep.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("variable '{0}' is not part of the resolved values")]
    MissingVariable(String),

    #[error("no value recorded for variable '{0}'")]
    NoValue(String),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("value lookup failed: {0}")]
    Lookup(#[from] StoreError),

    #[error("value lookup timed out after {0:?}")]
    LookupTimeout(Duration),
}
