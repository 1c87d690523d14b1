//! End-to-end API tests over the simulated pipeline.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use netpulse_gateway::{build_router, init_state};
use netpulse_gateway::state::SharedState;
use netpulse_model::{Alert, AlertSeverity, MetricType};

async fn setup() -> (Router, SharedState) {
    let state = init_state(true).await.unwrap();
    (build_router(state.clone()), state)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_health() {
    let (app, _state) = setup().await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_devices_auto_scan() {
    let (app, _state) = setup().await;
    let (status, body) = get(&app, "/devices").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 8);

    let (status, body) = post(&app, "/devices/scan", json!({"subnet": "10.0.0.0/24"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices_found"], 8);
}

#[tokio::test]
async fn test_metrics_seed_and_collect() {
    let (app, _state) = setup().await;
    let (status, body) = get(&app, "/metrics?limit=50").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["total"].as_u64().unwrap() > 0);

    let (status, body) = post(&app, "/metrics/collect", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["metrics_collected"].as_u64().unwrap() > 0);
    assert!(body["anomalies_detected"].is_u64());

    let (status, body) = get(&app, "/metrics?metric_type=cpu&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    for metric in body["metrics"].as_array().unwrap() {
        assert_eq!(metric["metric_type"], "cpu");
    }

    let (status, _body) = get(&app, "/metrics?metric_type=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_alert_lifecycle() {
    let (app, state) = setup().await;

    let alert_id = {
        let mut state = state.write().await;
        let mut alert = Alert::new("d1", AlertSeverity::Critical, "CPU threshold exceeded", "");
        alert.metric_type = Some(MetricType::Cpu);
        state.alerts.add_alert(alert).id
    };

    let (status, body) = get(&app, "/alerts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["summary"]["active"], 1);

    let (status, body) = post(
        &app,
        &format!("/alerts/{alert_id}/acknowledge"),
        json!({"acknowledged_by": "oncall"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "acknowledged");

    let (status, body) = post(&app, &format!("/alerts/{alert_id}/resolve"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "resolved");

    // Resolved is terminal.
    let (status, body) = post(&app, &format!("/alerts/{alert_id}/resolve"), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Alert not found");
}

#[tokio::test]
async fn test_unknown_alert_returns_404() {
    let (app, _state) = setup().await;
    let (status, body) = post(
        &app,
        "/alerts/no-such-id/acknowledge",
        json!({"acknowledged_by": "oncall"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Alert not found");
}

#[tokio::test]
async fn test_topology() {
    let (app, _state) = setup().await;
    let (status, body) = get(&app, "/topology").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device_count"], 8);
    assert_eq!(body["link_count"], 12);
}

#[tokio::test]
async fn test_chat_and_history() {
    let (app, _state) = setup().await;
    let (status, body) = post(
        &app,
        "/chat",
        json!({"message": "Discover devices on my network"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["response"].as_str().unwrap().contains("[discovery]"));

    let (status, body) = get(&app, "/chat/history?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_compliance_endpoints() {
    let (app, _state) = setup().await;
    let (status, body) = get(&app, "/compliance/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_checks"], 30);

    let (status, body) = post(
        &app,
        "/compliance/audit",
        json!({"framework": "CIS", "device_id": "switch-access-1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device_id"], "switch-access-1");
    assert!(body["non_compliant"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_sla_and_agents() {
    let (app, _state) = setup().await;
    let (status, body) = get(&app, "/sla").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_targets"], 4);

    let (status, body) = get(&app, "/agents").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_object().unwrap().contains_key("diagnosis"));
}

#[tokio::test]
async fn test_status_counters() {
    let (app, _state) = setup().await;
    let (_, _) = get(&app, "/devices").await;
    let (status, body) = get(&app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collector"]["running"], true);
    assert_eq!(body["devices"], 8);
    assert!(body["agents"].as_object().unwrap().len() >= 7);
}
