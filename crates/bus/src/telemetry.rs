//! Measurement stream consumer.

use rulewatch_core::Measurement;
use tokio::sync::Mutex;
use tracing::{debug, info};
use zeromq::prelude::*;
use zeromq::SubSocket;

use crate::endpoint::Endpoint;
use crate::error::BusError;
use crate::events::MeasurementBatch;
use crate::frame;
use crate::topics::{self, PROJECTS_PREFIX};

/// A decoded batch with its project resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectBatch {
    pub project_id: String,
    pub measurements: Vec<Measurement>,
}

impl ProjectBatch {
    /// The batch's own project wins; otherwise it comes from the topic.
    fn resolve(topic: &str, batch: MeasurementBatch) -> Result<Self, BusError> {
        let project_id = if batch.project_id.is_empty() {
            topics::project_of(topic)
                .ok_or_else(|| BusError::Frame(format!("no project in topic '{topic}'")))?
                .to_string()
        } else {
            batch.project_id
        };
        Ok(Self {
            project_id,
            measurements: batch.measurements,
        })
    }
}

/// SUB socket receiving every project's measurement batches.
pub struct TelemetrySubscriber {
    socket: Mutex<SubSocket>,
}

impl TelemetrySubscriber {
    /// Connect and subscribe to all `projects.` topics.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, BusError> {
        let mut socket = SubSocket::new();
        socket.connect(&endpoint.to_string()).await?;
        socket.subscribe(PROJECTS_PREFIX).await?;
        info!(%endpoint, prefix = PROJECTS_PREFIX, "telemetry subscriber connected");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Wait for the next batch. A malformed batch is returned as an error;
    /// the subscriber stays usable.
    pub async fn next_batch(&self) -> Result<ProjectBatch, BusError> {
        let message = self.socket.lock().await.recv().await?;
        let (topic, batch): (String, MeasurementBatch) = frame::decode(&message)?;
        let batch = ProjectBatch::resolve(&topic, batch)?;
        debug!(project_id = %batch.project_id, count = batch.measurements.len(), "batch received");
        Ok(batch)
    }
}
