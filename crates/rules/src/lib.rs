//! Telemetry rule engine.
//!
//! This crate provides:
//! - A concurrent per-project table of monitored rules, kept in sync with the
//!   rule store by a single-flight reconciler
//! - Schedule and left-fold condition evaluation
//! - The measurement pipeline (rising/falling edge handling, deferred fire)
//! - The timeout sweep confirming deferred rules
//! - Two-pass placeholder rendering and submission of rule actions

pub mod condition;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod metrics;
pub mod pipeline;
pub mod reconciler;
pub mod schedule;
pub mod state;
pub mod store;
pub mod submit;
pub mod sweep;
pub mod values;

pub use engine::RuleEngine;
pub use error::EvalError;
pub use evaluate::{Evaluation, RuleEvaluator};
pub use metrics::EngineMetrics;
pub use pipeline::{BatchOutcome, StreamPipeline};
pub use reconciler::{ReconcileReport, Reconciler};
pub use state::{MonitoredRuleState, RuleStateTable};
pub use store::{MemoryRuleStore, PgRuleStore};
pub use submit::ActionSubmitter;
pub use sweep::TimeoutSweep;
pub use values::{MemoryValueStore, RedisValueStore};
