//! ---
//! rl_section: "06-testing-qa"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "End-to-end coverage of the run-tracking API surface."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use racklab_api::{router, ApiState};
use racklab_engine::ExecutionOptions;
use racklab_metrics::{new_registry, RunMetrics};
use serde_json::{json, Value};
use tower::ServiceExt;

const THERMAL_SMOKE: &str = r#"
steps:
  - id: fan-high
    action: set_fan_speed
    value: 80
  - id: soak
    action: apply_load
    watts: 300
    duration_sec: 5
  - id: verify
    action: read_temperature
    expect_max_c: 1000
"#;

const FAILING_PLAN: &str = r#"
steps:
  - id: fan
    action: set_fan_speed
    value: 80
  - id: mystery
    action: bogus
"#;

fn test_app(api_key: Option<&str>) -> Router {
    let state = Arc::new(ApiState::new(
        api_key.map(str::to_owned),
        ExecutionOptions::seeded(42),
        None,
    ));
    router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_plan(uri: &str, plan: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::from(plan.to_owned()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_run(app: &Router, name: &str) -> String {
    let (status, body) = send(app, post_json("/api/runs", json!({"name": name}))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn health_is_always_open() {
    let app = test_app(Some("secret"));
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn create_then_fetch_a_run() {
    let app = test_app(None);
    let (status, created) =
        send(&app, post_json("/api/runs", json!({"name": "thermal_smoke"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "thermal_smoke");
    assert_eq!(created["status"], "queued");

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = send(&app, get(&format!("/api/runs/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (status, listing) = send(&app, get("/api/runs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["runs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn blank_names_fall_back_to_the_default() {
    let app = test_app(None);
    let (_, created) = send(&app, post_json("/api/runs", json!({"name": "  "}))).await;
    assert_eq!(created["name"], "racklab-run");
}

#[tokio::test]
async fn idempotency_key_replays_the_original_run() {
    let app = test_app(None);
    let make_request = || {
        Request::builder()
            .method("POST")
            .uri("/api/runs")
            .header("content-type", "application/json")
            .header("idempotency-key", "retry-1")
            .body(Body::from(json!({"name": "retried"}).to_string()))
            .unwrap()
    };
    let (first_status, first) = send(&app, make_request()).await;
    let (second_status, second) = send(&app, make_request()).await;
    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["id"], second["id"]);

    let (_, listing) = send(&app, get("/api/runs")).await;
    assert_eq!(listing["runs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn api_routes_require_the_configured_key() {
    let app = test_app(Some("secret"));
    let (status, body) = send(&app, get("/api/runs")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("X-API-Key"));

    let authed = Request::builder()
        .uri("/api/runs")
        .header("x-api-key", "secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, authed).await;
    assert_eq!(status, StatusCode::OK);

    let wrong_key = Request::builder()
        .uri("/api/runs")
        .header("x-api-key", "guess")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, wrong_key).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_runs_return_404() {
    let app = test_app(None);
    let (status, body) = send(
        &app,
        get("/api/runs/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Run not found");

    let (status, _) = send(
        &app,
        post_plan(
            "/api/runs/00000000-0000-0000-0000-000000000000/execute",
            THERMAL_SMOKE,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn executing_a_plan_stores_results_and_passes() {
    let app = test_app(None);
    let id = create_run(&app, "thermal_smoke").await;

    let (status, run) = send(&app, post_plan(&format!("/api/runs/{id}/execute"), THERMAL_SMOKE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "passed");
    assert!(run["started_at"].is_i64());
    assert!(run["ended_at"].is_i64());

    let results = run["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["step_id"], "fan-high");
    assert_eq!(results[0]["outcome"], json!({"fan_speed": 80}));
    assert_eq!(results[1]["outcome"], json!({"temperature": 40.0}));
    assert_eq!(results[2]["outcome"]["status"], "PASS");
}

#[tokio::test]
async fn unknown_actions_fail_the_run_but_not_the_request() {
    let app = test_app(None);
    let id = create_run(&app, "broken").await;

    let (status, run) =
        send(&app, post_plan(&format!("/api/runs/{id}/execute"), FAILING_PLAN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "failed");

    let results = run["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1]["outcome"], json!({"error": "Unknown action"}));
}

#[tokio::test]
async fn malformed_plans_yield_400_and_no_results() {
    let app = test_app(None);
    let id = create_run(&app, "malformed").await;

    let (status, body) = send(
        &app,
        post_plan(&format!("/api/runs/{id}/execute"), "steps: not-a-list\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("malformed plan"));

    let (_, run) = send(&app, get(&format!("/api/runs/{id}"))).await;
    assert_eq!(run["status"], "failed");
    assert!(run.get("results").is_none() || run["results"].is_null());
}

#[tokio::test]
async fn metrics_summary_tracks_run_outcomes() {
    let app = test_app(None);
    let passing = create_run(&app, "pass").await;
    let failing = create_run(&app, "fail").await;
    create_run(&app, "idle").await;

    send(&app, post_plan(&format!("/api/runs/{passing}/execute"), THERMAL_SMOKE)).await;
    send(&app, post_plan(&format!("/api/runs/{failing}/execute"), FAILING_PLAN)).await;

    let (status, summary) = send(&app, get("/api/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["runs_total"], 3);
    assert_eq!(summary["runs_passed"], 1);
    assert_eq!(summary["runs_failed"], 1);
    assert_eq!(summary["runs_queued"], 1);
    assert_eq!(summary["runs_running"], 0);
    assert_eq!(summary["error_rate"], json!(0.3333));
}

#[tokio::test]
async fn responses_echo_a_request_id() {
    let app = test_app(None);
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-me"
    );

    let response = app.oneshot(get("/health")).await.unwrap();
    // generated ids are uuids
    let generated = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(generated.len(), 36);
}

#[tokio::test]
async fn prometheus_counters_follow_executions() {
    let registry = new_registry();
    let metrics = RunMetrics::new(&registry).unwrap();
    let state = Arc::new(ApiState::new(None, ExecutionOptions::seeded(42), Some(metrics)));
    let app = router(state);

    let id = create_run(&app, "counted").await;
    send(&app, post_plan(&format!("/api/runs/{id}/execute"), THERMAL_SMOKE)).await;

    let families = registry.gather();
    let started = families
        .iter()
        .find(|family| family.get_name() == "racklab_runs_started_total")
        .unwrap();
    assert_eq!(started.get_metric()[0].get_counter().get_value(), 1.0);
    let steps = families
        .iter()
        .find(|family| family.get_name() == "racklab_steps_executed_total")
        .unwrap();
    assert_eq!(steps.get_metric()[0].get_counter().get_value(), 3.0);
}
