use rulewatch_core::Measurement;
use serde::{Deserialize, Serialize};

/// Telemetry of one project as the ingest side publishes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementBatch {
    /// Empty when the publisher relies on the topic to name the project.
    #[serde(default)]
    pub project_id: String,
    pub measurements: Vec<Measurement>,
}
