//! Process lifecycle: start a [`Service`], ping health on a fixed period,
//! stop it within a deadline once asked to.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::WorkerSection;
use crate::error::BusError;
use crate::health::{HealthReporter, WorkerHealth, WorkerStatus};

#[async_trait]
pub trait Service: Send + Sync {
    /// Spawn whatever the service runs. Must return promptly.
    async fn start(&self) -> Result<(), BusError>;

    /// Stop accepting work and wind down.
    async fn stop(&self) -> Result<(), BusError>;
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub name: String,
    pub heartbeat: Duration,
    pub stop_timeout: Duration,
}

impl RunOptions {
    pub fn new(name: impl Into<String>, section: &WorkerSection) -> Self {
        Self {
            name: name.into(),
            heartbeat: Duration::from_secs(section.health_interval_secs),
            stop_timeout: Duration::from_secs(section.shutdown_timeout_secs),
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }
}

/// Run until SIGINT/SIGTERM.
pub async fn run(
    service: &dyn Service,
    reporter: &dyn HealthReporter,
    options: &RunOptions,
) -> Result<(), BusError> {
    run_until(service, reporter, options, os_signal()).await
}

/// Run until `until` resolves.
pub async fn run_until<F>(
    service: &dyn Service,
    reporter: &dyn HealthReporter,
    options: &RunOptions,
    until: F,
) -> Result<(), BusError>
where
    F: Future<Output = ()>,
{
    service.start().await?;
    info!(worker = %options.name, heartbeat = ?options.heartbeat, "service started");

    let mut heartbeat = tokio::time::interval(options.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(until);

    loop {
        tokio::select! {
            _ = &mut until => break,
            _ = heartbeat.tick() => ping(reporter, &options.name, WorkerStatus::Healthy).await,
        }
    }

    info!(worker = %options.name, timeout = ?options.stop_timeout, "stopping service");
    match tokio::time::timeout(options.stop_timeout, service.stop()).await {
        Ok(Ok(())) => info!(worker = %options.name, "service stopped"),
        Ok(Err(e)) => warn!(worker = %options.name, error = %e, "service stop failed"),
        Err(_) => warn!(worker = %options.name, "service stop timed out, abandoning it"),
    }
    ping(reporter, &options.name, WorkerStatus::Unhealthy).await;
    Ok(())
}

async fn ping(reporter: &dyn HealthReporter, name: &str, status: WorkerStatus) {
    let health = WorkerHealth {
        worker_id: name.to_string(),
        status,
    };
    if let Err(e) = reporter.report(&health).await {
        warn!(worker = %name, error = %e, "health ping failed");
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C off Unix). Never resolves if no
/// handler can be installed.
async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut interrupt, mut terminate) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(i), Ok(t)) => (i, t),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "cannot install signal handlers");
                    return std::future::pending().await;
                }
            };
        tokio::select! {
            _ = interrupt.recv() => info!("SIGINT received"),
            _ = terminate.recv() => info!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}
