//! ---
//! rl_section: "04-run-tracking"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Run-tracking REST surface for external integrations."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
//! Thin run-tracking layer around the execution engine: it creates run
//! records, invokes the engine once per execute request, stores the
//! returned report, and derives the aggregate pass/fail status. The
//! aggregation policy lives here on purpose; the engine only reports data.

pub mod runs;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use racklab_engine::{execute_plan_source, ExecutionOptions, PlanError, Report};
use racklab_metrics::RunMetrics;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

pub use runs::{BeginError, RunCounts, RunRecord, RunStatus, RunStore};

const DEFAULT_RUN_NAME: &str = "racklab-run";

/// Shared API state exposed to handlers.
pub struct ApiState {
    store: RunStore,
    api_key: Option<String>,
    exec: ExecutionOptions,
    metrics: Option<RunMetrics>,
    start: Instant,
}

impl ApiState {
    pub fn new(
        api_key: Option<String>,
        exec: ExecutionOptions,
        metrics: Option<RunMetrics>,
    ) -> Self {
        Self {
            store: RunStore::new(),
            api_key,
            exec,
            metrics,
            start: Instant::now(),
        }
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl fmt::Debug for ApiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiState")
            .field("auth_enabled", &self.api_key.is_some())
            .field("exec", &self.exec)
            .finish_non_exhaustive()
    }
}

/// Assemble the full route tree. Exposed separately from the server spawn so
/// tests can drive the router in-process.
pub fn router(state: Arc<ApiState>) -> Router {
    let guarded = Router::new()
        .route("/api/runs", post(create_run).get(list_runs))
        .route("/api/runs/:id", get(get_run))
        .route("/api/runs/:id/execute", post(execute_run))
        .route("/api/metrics", get(metrics_summary))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(guarded)
        .layer(middleware::from_fn(request_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

/// Bind `addr` and serve the run-tracking API until shut down.
pub async fn spawn_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<ApiServer> {
    let app = router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve API listener address")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %local_addr, "api server listening");
        if let Err(err) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %local_addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr: local_addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Run not found")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Attach a request id, echo it back, and log one line per request.
async fn request_context(req: Request, next: Next) -> Response {
    let rid = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&rid) {
        response.headers_mut().insert("x-request-id", value);
    }
    info!(
        rid = %rid,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

/// Gate `/api` routes behind the configured key. Auth is disabled entirely
/// when no key is configured; `/health` is always open.
async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.api_key {
        let provided = req
            .headers()
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "Invalid or missing X-API-Key",
            ));
        }
    }
    Ok(next.run(req).await)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Default, Deserialize)]
struct CreateRunRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

async fn create_run(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Option<Json<CreateRunRequest>>,
) -> (StatusCode, Json<RunRecord>) {
    let request = body.map(|Json(inner)| inner).unwrap_or_default();
    let idempotency_key = header_string(&headers, "idempotency-key");

    if let Some(key) = &idempotency_key {
        if let Some(existing) = state.store.find_by_idempotency_key(key) {
            return (StatusCode::OK, Json(existing));
        }
    }

    let name = request
        .name
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_RUN_NAME.to_owned());
    let notes = request
        .notes
        .map(|notes| notes.trim().to_owned())
        .unwrap_or_default();

    let run = state.store.create(name, notes, idempotency_key);
    info!(run_id = %run.id, name = %run.name, "run created");
    (StatusCode::CREATED, Json(run))
}

#[derive(Debug, Serialize)]
struct RunListResponse {
    runs: Vec<RunRecord>,
}

async fn list_runs(State(state): State<Arc<ApiState>>) -> Json<RunListResponse> {
    Json(RunListResponse {
        runs: state.store.list(),
    })
}

async fn get_run(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunRecord>, ApiError> {
    state.store.get(id).map(Json).ok_or_else(ApiError::not_found)
}

/// Execute the plan document carried in the request body against this run.
///
/// The engine call is synchronous (and may sleep when pacing is enabled),
/// so it runs on a blocking worker thread. Each invocation constructs its
/// own simulator; concurrent executes against distinct runs never share
/// device state.
async fn execute_run(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    plan_source: String,
) -> Result<Json<RunRecord>, ApiError> {
    state.store.begin(id).map_err(|err| match err {
        BeginError::NotFound => ApiError::not_found(),
        BeginError::AlreadyRunning => {
            ApiError::new(StatusCode::CONFLICT, "Run is already executing")
        }
    })?;
    if let Some(metrics) = &state.metrics {
        metrics.record_started();
    }

    let options = state.exec.clone();
    let started = Instant::now();
    let executed =
        tokio::task::spawn_blocking(move || execute_plan_source(&plan_source, &options)).await;
    let elapsed = started.elapsed().as_secs_f64();

    let report = match executed {
        Ok(Ok(report)) => report,
        Ok(Err(err)) => {
            state.store.abandon(id);
            if let Some(metrics) = &state.metrics {
                metrics.record_outcome(RunStatus::Failed.as_str(), 0, elapsed);
            }
            let status = match err {
                PlanError::Malformed { .. } => StatusCode::BAD_REQUEST,
                PlanError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            return Err(ApiError::new(status, err.to_string()));
        }
        Err(join_err) => {
            error!(run_id = %id, error = %join_err, "execution task failed");
            state.store.abandon(id);
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "plan execution task failed",
            ));
        }
    };

    let status = aggregate_status(&report);
    if let Some(metrics) = &state.metrics {
        metrics.record_outcome(status.as_str(), report.len(), elapsed);
    }
    info!(run_id = %id, status = status.as_str(), steps = report.len(), "run executed");

    state
        .store
        .complete(id, report, status)
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

/// A run passes only when no step recorded an error or a failed assertion.
fn aggregate_status(report: &Report) -> RunStatus {
    if report.has_failures() {
        RunStatus::Failed
    } else {
        RunStatus::Passed
    }
}

#[derive(Debug, Serialize)]
struct RunCountersResponse {
    runs_total: usize,
    runs_passed: usize,
    runs_failed: usize,
    runs_queued: usize,
    runs_running: usize,
    error_rate: f64,
    uptime_seconds: u64,
}

async fn metrics_summary(State(state): State<Arc<ApiState>>) -> Json<RunCountersResponse> {
    let counts = state.store.counts();
    let error_rate = if counts.total == 0 {
        0.0
    } else {
        let rate = counts.failed as f64 / counts.total as f64;
        (rate * 10_000.0).round() / 10_000.0
    };
    Json(RunCountersResponse {
        runs_total: counts.total,
        runs_passed: counts.passed,
        runs_failed: counts.failed,
        runs_queued: counts.queued,
        runs_running: counts.running,
        error_rate,
        uptime_seconds: state.uptime_seconds(),
    })
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .filter(|value| !value.is_empty())
}
