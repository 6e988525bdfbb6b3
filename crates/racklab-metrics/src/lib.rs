//! ---
//! rl_section: "05-observability"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Metrics collection and export utilities."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder, TEXT_FORMAT,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across services.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Bind `addr` and serve the registry at `/metrics` until shut down.
/// Pass port 0 to let the OS pick; the bound address is on the handle.
pub async fn serve_metrics(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics listener {addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve metrics listener address")?;
    info!(address = %local_addr, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: local_addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

/// Prometheus scrape endpoint.
async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(TEXT_FORMAT),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("metrics encoding error"),
            )
                .into_response()
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Counters describing plan executions handled by the run-tracking layer.
#[derive(Clone)]
pub struct RunMetrics {
    runs_started_total: IntCounter,
    run_outcomes_total: IntCounterVec,
    steps_executed_total: IntCounter,
    run_duration_seconds: Histogram,
}

impl RunMetrics {
    pub fn new(registry: &SharedRegistry) -> Result<Self> {
        let runs_started_total = IntCounter::with_opts(Opts::new(
            "racklab_runs_started_total",
            "Total number of plan executions started",
        ))?;
        registry.register(Box::new(runs_started_total.clone()))?;

        let run_outcomes_total = IntCounterVec::new(
            Opts::new(
                "racklab_run_outcomes_total",
                "Completed plan executions by final run status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(run_outcomes_total.clone()))?;

        let steps_executed_total = IntCounter::with_opts(Opts::new(
            "racklab_steps_executed_total",
            "Total number of plan steps dispatched",
        ))?;
        registry.register(Box::new(steps_executed_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.005, 2.0, 14)
            .context("failed to construct histogram buckets")?;
        let run_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "racklab_run_duration_seconds",
                "Wall-clock duration of plan executions",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(run_duration_seconds.clone()))?;

        Ok(Self {
            runs_started_total,
            run_outcomes_total,
            steps_executed_total,
            run_duration_seconds,
        })
    }

    pub fn record_started(&self) {
        self.runs_started_total.inc();
    }

    pub fn record_outcome(&self, status: &str, steps: usize, duration_seconds: f64) {
        self.run_outcomes_total.with_label_values(&[status]).inc();
        self.steps_executed_total.inc_by(steps as u64);
        self.run_duration_seconds.observe(duration_seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_metrics_register_and_count() {
        let registry = new_registry();
        let metrics = RunMetrics::new(&registry).unwrap();
        metrics.record_started();
        metrics.record_outcome("passed", 3, 0.2);
        metrics.record_outcome("failed", 2, 0.1);

        let families = registry.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"racklab_runs_started_total"));
        assert!(names.contains(&"racklab_run_outcomes_total"));
        assert!(names.contains(&"racklab_steps_executed_total"));
        assert!(names.contains(&"racklab_run_duration_seconds"));

        let steps = families
            .iter()
            .find(|f| f.get_name() == "racklab_steps_executed_total")
            .unwrap();
        assert_eq!(steps.get_metric()[0].get_counter().get_value(), 5.0);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = new_registry();
        RunMetrics::new(&registry).unwrap();
        assert!(RunMetrics::new(&registry).is_err());
    }
}
