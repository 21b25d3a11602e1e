//! rules-worker: bus worker running the telemetry rule engine.
//!
//! Receives `projects.*` measurement batches, evaluates the affected rules
//! and posts fired actions to the notification API. Rule definitions are
//! reconciled from PostgreSQL; companion values come from the recorder's
//! Redis hashes, or from a local cache of this stream when no Redis is set.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use rulewatch_bus::runner;
use rulewatch_bus::{
    BusConfig, BusError, HealthPublisher, ProjectBatch, RunOptions, Service, TelemetrySubscriber,
};
use rulewatch_core::config::{load_dotenv, Config};
use rulewatch_core::LiveValueStore;
use rulewatch_notify::HttpNotificationSink;
use rulewatch_rules::metrics::spawn_metrics_server;
use rulewatch_rules::{MemoryValueStore, PgRuleStore, RedisValueStore, RuleEngine};

// ── CLI ─────────────────────────────────────────────────────────────

/// Telemetry rule engine worker.
#[derive(Parser, Debug)]
#[command(name = "rules-worker", version, about)]
struct Cli {
    /// Path to bus.toml config file.
    #[arg(long, env = "BUS_CONFIG", default_value = "config/bus.toml")]
    config: String,

    /// Health ping interval in seconds (overrides bus.toml).
    #[arg(long, env = "RULES_HEALTH_INTERVAL")]
    health_interval: Option<u64>,

    /// Shutdown timeout in seconds (overrides bus.toml).
    #[arg(long, env = "RULES_SHUTDOWN_TIMEOUT")]
    shutdown_timeout: Option<u64>,
}

// ── RulesWorker ─────────────────────────────────────────────────────

struct RulesWorker {
    engine: Arc<RuleEngine>,
    /// Set only when values are cached in-process instead of read from Redis.
    local_values: Option<Arc<MemoryValueStore>>,
    telemetry: Arc<TelemetrySubscriber>,
    stop: watch::Sender<bool>,
}

async fn handle_batch(
    engine: &RuleEngine,
    local_values: Option<&MemoryValueStore>,
    batch: ProjectBatch,
) {
    if let Some(cache) = local_values {
        cache.record(&batch.project_id, &batch.measurements);
    }
    let outcome = engine
        .on_measurement_batch(&batch.project_id, &batch.measurements)
        .await;
    debug!(
        project_id = %batch.project_id,
        evaluated = outcome.evaluated,
        fired = outcome.fired,
        deferred = outcome.deferred,
        "measurement batch processed"
    );
}

async fn consume(
    engine: Arc<RuleEngine>,
    local_values: Option<Arc<MemoryValueStore>>,
    telemetry: Arc<TelemetrySubscriber>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            received = telemetry.next_batch() => match received {
                Ok(batch) => {
                    // One task per batch.
                    let (engine, local_values) = (engine.clone(), local_values.clone());
                    tokio::spawn(async move {
                        handle_batch(&engine, local_values.as_deref(), batch).await;
                    });
                }
                Err(BusError::Zmq(e)) => {
                    warn!(error = %e, "telemetry socket error");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => warn!(error = %e, "dropping undecodable batch"),
            },
            res = stop.changed() => {
                if res.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
    info!("telemetry consumer stopped");
}

#[async_trait]
impl Service for RulesWorker {
    async fn start(&self) -> Result<(), BusError> {
        tokio::spawn(consume(
            self.engine.clone(),
            self.local_values.clone(),
            self.telemetry.clone(),
            self.stop.subscribe(),
        ));
        // The clocks run until engine.shutdown(); their handles are not joined.
        let _clocks = self.engine.start();
        info!(active_rules = self.engine.table().len(), "rules worker started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), BusError> {
        self.stop.send_replace(true);
        self.engine.shutdown();
        Ok(())
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let bus = match BusConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded bus config");
            cfg
        }
        Err(e) => {
            warn!(error = %e, path = %cli.config, "failed to load bus config, using local defaults");
            BusConfig::local()
        }
    };

    let store = Arc::new(
        PgRuleStore::connect(&config.postgres)
            .await
            .context("connecting to rule store")?,
    );

    let (values, local_values): (Arc<dyn LiveValueStore>, Option<Arc<MemoryValueStore>>) =
        if config.redis.is_configured() {
            let redis = RedisValueStore::connect(&config.redis)
                .await
                .context("connecting to live value store")?;
            (Arc::new(redis), None)
        } else {
            warn!("REDIS_ADDR not set, companion values only come from this worker's stream");
            let cache = Arc::new(MemoryValueStore::new());
            (cache.clone(), Some(cache))
        };

    let sink = Arc::new(
        HttpNotificationSink::from_config(&config.notification, config.engine.notify_timeout())
            .context("configuring notification sink")?,
    );

    let engine = Arc::new(RuleEngine::new(config.engine.clone(), store, values, sink));

    // Load the rule set before the first batch arrives.
    match engine.reconciler().run_once().await {
        Ok(Some(report)) => info!(?report, "initial rule set loaded"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "initial rule load failed, retrying on the reconcile clock"),
    }

    let metrics_addr: SocketAddr = format!("{}:{}", config.metrics.host, config.metrics.port)
        .parse()
        .context("invalid metrics listen address")?;
    spawn_metrics_server(metrics_addr, engine.metrics().clone(), engine.shutdown_signal());

    let health = HealthPublisher::connect(&bus.frontend()?).await?;
    let telemetry = Arc::new(TelemetrySubscriber::connect(&bus.backend()?).await?);

    let (stop, _) = watch::channel(false);
    let worker = RulesWorker {
        engine,
        local_values,
        telemetry,
        stop,
    };

    let mut options = RunOptions::new("rules-worker", &bus.worker);
    if let Some(secs) = cli.health_interval {
        options = options.with_heartbeat(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.shutdown_timeout {
        options = options.with_stop_timeout(Duration::from_secs(secs));
    }

    info!("rules-worker starting");
    runner::run(&worker, &health, &options).await?;
    info!("rules-worker exited cleanly");
    Ok(())
}
