//! Bus plumbing of the rule worker.
//!
//! Telemetry arrives over ZeroMQ SUB as `[topic, msgpack batch]` frames and
//! is handed out as [`ProjectBatch`]es; liveness goes back out as health
//! frames. [`runner`] drives a [`Service`] between start and an OS signal.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod frame;
pub mod health;
pub mod runner;
pub mod telemetry;
pub mod topics;

pub use config::BusConfig;
pub use endpoint::Endpoint;
pub use error::BusError;
pub use health::{HealthPublisher, HealthReporter, WorkerHealth, WorkerStatus};
pub use runner::{RunOptions, Service};
pub use telemetry::{ProjectBatch, TelemetrySubscriber};
