//! Engine counters and their HTTP exposure.
//!
//! Served as Prometheus text on `GET /metrics`, with a plain `GET /health`
//! for liveness checks.

use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;

/// Shared counters of one engine instance.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    active_rules: AtomicU64,
    triggers_total: AtomicU64,
    measurements_total: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active_rules(&self, count: usize) {
        self.active_rules.store(count as u64, Ordering::Relaxed);
    }

    pub fn active_rules(&self) -> u64 {
        self.active_rules.load(Ordering::Relaxed)
    }

    pub fn record_trigger(&self) {
        self.triggers_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn triggers_total(&self) -> u64 {
        self.triggers_total.load(Ordering::Relaxed)
    }

    pub fn record_measurements(&self, count: usize) {
        self.measurements_total.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn measurements_total(&self) -> u64 {
        self.measurements_total.load(Ordering::Relaxed)
    }

    /// Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        for (name, kind, help, value) in [
            ("rule_rules_total", "gauge", "Number of rules currently monitored.", self.active_rules()),
            ("rule_triggers_total", "counter", "Rule firings since start.", self.triggers_total()),
            (
                "rule_measurements_total",
                "counter",
                "Measurements evaluated since start.",
                self.measurements_total(),
            ),
        ] {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} {kind}");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

async fn metrics_handler(State(metrics): State<Arc<EngineMetrics>>) -> String {
    metrics.render_prometheus()
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router(metrics: Arc<EngineMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(metrics)
}

/// Spawn the metrics HTTP server. Stops once `shutdown` turns `true`.
pub fn spawn_metrics_server(
    addr: SocketAddr,
    metrics: Arc<EngineMetrics>,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(%addr, error = %e, "failed to bind metrics HTTP server");
                return;
            }
        };

        tracing::info!(%addr, "metrics HTTP server listening");

        axum::serve(listener, router(metrics))
            .with_graceful_shutdown(async move {
                let mut rx = shutdown;
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await
            .ok();

        tracing::info!("metrics HTTP server stopped");
    })
}
