//! Wiring of the engine components and their background clocks.

use std::sync::Arc;

use rulewatch_core::config::EngineConfig;
use rulewatch_core::{LiveValueStore, Measurement, NotificationSink, RuleStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::evaluate::RuleEvaluator;
use crate::metrics::EngineMetrics;
use crate::pipeline::{BatchOutcome, StreamPipeline};
use crate::reconciler::Reconciler;
use crate::state::RuleStateTable;
use crate::submit::ActionSubmitter;
use crate::sweep::TimeoutSweep;

/// Owns the shared state table and runs the reconcile and sweep clocks.
///
/// The measurement path is event driven and goes through
/// [`on_measurement_batch`](RuleEngine::on_measurement_batch).
pub struct RuleEngine {
    config: EngineConfig,
    table: Arc<RuleStateTable>,
    metrics: Arc<EngineMetrics>,
    reconciler: Arc<Reconciler>,
    pipeline: Arc<StreamPipeline>,
    sweep: Arc<TimeoutSweep>,
    shutdown: watch::Sender<bool>,
}

impl RuleEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RuleStore>,
        values: Arc<dyn LiveValueStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let table = Arc::new(RuleStateTable::new());
        let metrics = Arc::new(EngineMetrics::new());
        let evaluator = Arc::new(RuleEvaluator::new(values.clone(), config.lookup_timeout()));
        let submitter = Arc::new(ActionSubmitter::new(
            values,
            sink,
            config.lookup_timeout(),
            config.notify_timeout(),
        ));

        let reconciler = Arc::new(Reconciler::new(table.clone(), store, metrics.clone()));
        let pipeline = Arc::new(StreamPipeline::new(
            table.clone(),
            evaluator.clone(),
            submitter.clone(),
            metrics.clone(),
        ));
        let sweep = Arc::new(TimeoutSweep::new(table.clone(), evaluator, submitter, metrics.clone()));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            table,
            metrics,
            reconciler,
            pipeline,
            sweep,
            shutdown,
        }
    }

    pub fn table(&self) -> &Arc<RuleStateTable> {
        &self.table
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn pipeline(&self) -> &Arc<StreamPipeline> {
        &self.pipeline
    }

    pub fn sweep(&self) -> &Arc<TimeoutSweep> {
        &self.sweep
    }

    pub async fn on_measurement_batch(
        &self,
        project_id: &str,
        measurements: &[Measurement],
    ) -> BatchOutcome {
        self.pipeline.on_measurement_batch(project_id, measurements).await
    }

    /// Receiver that flips to `true` once [`shutdown`](Self::shutdown) is called.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Spawn the reconcile and sweep loops.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!(
            reconcile = ?self.config.reconcile_interval(),
            sweep = ?self.config.sweep_interval(),
            "starting rule engine clocks"
        );
        vec![self.spawn_reconcile_loop(), self.spawn_sweep_loop()]
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    fn spawn_reconcile_loop(&self) -> JoinHandle<()> {
        let reconciler = self.reconciler.clone();
        let period = self.config.reconcile_interval();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // A slow store must not hold up the clock; overlapping
                        // runs are rejected by the reconciler itself.
                        let reconciler = reconciler.clone();
                        tokio::spawn(async move {
                            let _ = reconciler.run_once().await;
                        });
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("reconcile loop stopped");
        })
    }

    fn spawn_sweep_loop(&self) -> JoinHandle<()> {
        let sweep = self.sweep.clone();
        let period = self.config.sweep_interval();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let fired = sweep.sweep().await;
                        if fired > 0 {
                            debug!(fired, "timeout sweep fired rules");
                        }
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("sweep loop stopped");
        })
    }
}
