//! Liveness pings of the worker process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use zeromq::prelude::*;
use zeromq::PubSocket;

use crate::endpoint::Endpoint;
use crate::error::BusError;
use crate::frame;
use crate::topics::WORKER_HEALTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub worker_id: String,
    pub status: WorkerStatus,
}

/// Where health pings go.
#[async_trait]
pub trait HealthReporter: Send + Sync {
    async fn report(&self, health: &WorkerHealth) -> Result<(), BusError>;
}

/// PUB socket connected to the broker frontend, sending on [`WORKER_HEALTH`].
pub struct HealthPublisher {
    socket: Mutex<PubSocket>,
}

impl HealthPublisher {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, BusError> {
        let mut socket = PubSocket::new();
        socket.connect(&endpoint.to_string()).await?;
        info!(%endpoint, "health publisher connected");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl HealthReporter for HealthPublisher {
    async fn report(&self, health: &WorkerHealth) -> Result<(), BusError> {
        let message = frame::encode(WORKER_HEALTH, health)?;
        self.socket.lock().await.send(message).await?;
        debug!(worker = %health.worker_id, status = ?health.status, "health ping sent");
        Ok(())
    }
}
