//! Route handlers
//!
//! The HTTP/JSON query and command surface. Missing optional data returns
//! `200` with empty arrays; unknown entities return `404` with a `detail`
//! body; the API never 500s on empty state.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use netpulse_collect::{MetricQuery, PollTarget};
use netpulse_model::{AgentTask, AlertSeverity, AlertState, MetricType};
use netpulse_monitor::AlertQuery;
use netpulse_topology::seed_demo_topology;

use crate::state::SharedState;

const DEMO_SUBNET: &str = "10.0.0.0/24";
const DEMO_POLL_TARGETS: &[&str] = &["10.0.0.1", "10.0.0.2", "10.0.1.1"];

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "collector": {
            "running": state.collector.is_running(),
            "total_metrics": state.collector.total_metrics(),
        },
        "devices": state.scanner.discovered_count(),
        "alerts": state.alerts.summary(),
        "agents": state.coordinator.status(),
    }))
}

// ───────────────────────────────────────────────────────────────────────────
// Devices
// ───────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ScanRequest {
    #[serde(default = "default_subnet")]
    pub subnet: String,
    #[serde(default = "default_community")]
    pub community: String,
}

fn default_subnet() -> String {
    DEMO_SUBNET.to_string()
}

fn default_community() -> String {
    "public".to_string()
}

pub async fn list_devices(State(state): State<SharedState>) -> impl IntoResponse {
    let mut state = state.write().await;
    if state.scanner.discovered_count() == 0 {
        if let Ok(devices) = state.scanner.scan_subnet(DEMO_SUBNET, "public").await {
            state.topology.add_devices(devices);
        }
    }
    let devices = state.scanner.discovered_devices();
    Json(json!({
        "total": devices.len(),
        "devices": devices,
    }))
}

pub async fn scan_devices(
    State(state): State<SharedState>,
    Json(req): Json<ScanRequest>,
) -> impl IntoResponse {
    let mut state = state.write().await;
    match state.scanner.scan_subnet(&req.subnet, &req.community).await {
        Ok(devices) => {
            state.topology.add_devices(devices.clone());
            Json(json!({"devices_found": devices.len()})).into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": e.to_string()})),
        )
            .into_response(),
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Metrics
// ───────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct MetricsParams {
    pub device_id: Option<String>,
    pub metric_type: Option<String>,
    pub limit: Option<usize>,
}

pub async fn get_metrics(
    State(state): State<SharedState>,
    Query(params): Query<MetricsParams>,
) -> impl IntoResponse {
    let metric_type = match params.metric_type.as_deref() {
        Some(raw) => match MetricType::parse(raw) {
            Some(t) => Some(t),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"detail": format!("unknown metric type: {raw}")})),
                )
                    .into_response()
            }
        },
        None => None,
    };

    let mut state = state.write().await;
    if state.collector.total_metrics() == 0 {
        for host in DEMO_POLL_TARGETS {
            state.collector.poll.add_target(PollTarget::new(*host));
        }
        state.collector.collect_all().await;
    }

    let metrics = state.collector.metrics(&MetricQuery {
        device_id: params.device_id,
        metric_type,
        since: None,
        limit: params.limit.unwrap_or(100).min(1000),
    });
    Json(json!({
        "total": metrics.len(),
        "metrics": metrics,
    }))
    .into_response()
}

pub async fn trigger_collection(State(state): State<SharedState>) -> impl IntoResponse {
    let mut state = state.write().await;
    let metrics = state.collector.collect_all().await;

    let new_alerts = state.health.process_metrics(&metrics);
    let alerts_generated = new_alerts.len();
    state.alerts.add_alerts(new_alerts);
    state.sla.process_metrics(&metrics);
    let anomalies = state.anomaly.detect_batch(&metrics);

    Json(json!({
        "metrics_collected": metrics.len(),
        "alerts_generated": alerts_generated,
        "anomalies_detected": anomalies.len(),
        "correlation_groups": state.anomaly.correlate(300).len(),
    }))
}

// ───────────────────────────────────────────────────────────────────────────
// Alerts
// ───────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AlertsParams {
    pub state: Option<String>,
    pub severity: Option<String>,
    pub device_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct AckRequest {
    pub acknowledged_by: String,
}

pub async fn list_alerts(
    State(state): State<SharedState>,
    Query(params): Query<AlertsParams>,
) -> impl IntoResponse {
    let state_filter = match params.state.as_deref() {
        Some(raw) => match AlertState::parse(raw) {
            Some(s) => Some(s),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"detail": format!("unknown alert state: {raw}")})),
                )
                    .into_response()
            }
        },
        None => None,
    };
    let severity = match params.severity.as_deref() {
        Some(raw) => match AlertSeverity::parse(raw) {
            Some(s) => Some(s),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"detail": format!("unknown severity: {raw}")})),
                )
                    .into_response()
            }
        },
        None => None,
    };

    let state = state.read().await;
    let alerts = state.alerts.alerts(&AlertQuery {
        state: state_filter,
        severity,
        device_id: params.device_id,
        limit: params.limit.unwrap_or(100).min(1000),
    });
    Json(json!({
        "total": alerts.len(),
        "alerts": alerts,
        "summary": state.alerts.summary(),
    }))
    .into_response()
}

pub async fn acknowledge_alert(
    State(state): State<SharedState>,
    Path(alert_id): Path<String>,
    Json(req): Json<AckRequest>,
) -> impl IntoResponse {
    let mut state = state.write().await;
    match state.alerts.acknowledge(&alert_id, &req.acknowledged_by) {
        Some(alert) => Json(json!(alert)).into_response(),
        None => alert_not_found(),
    }
}

pub async fn resolve_alert(
    State(state): State<SharedState>,
    Path(alert_id): Path<String>,
) -> impl IntoResponse {
    let mut state = state.write().await;
    match state.alerts.resolve(&alert_id) {
        Some(alert) => Json(json!(alert)).into_response(),
        None => alert_not_found(),
    }
}

fn alert_not_found() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": "Alert not found"})),
    )
        .into_response()
}

// ───────────────────────────────────────────────────────────────────────────
// Topology
// ───────────────────────────────────────────────────────────────────────────

pub async fn get_topology(State(state): State<SharedState>) -> impl IntoResponse {
    let mut state = state.write().await;
    if state.topology.device_count() == 0 {
        if let Ok(devices) = state.scanner.scan_subnet(DEMO_SUBNET, "public").await {
            seed_demo_topology(&mut state.topology, &devices);
        }
    }
    Json(state.topology.to_value())
}

// ───────────────────────────────────────────────────────────────────────────
// Chat
// ───────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

pub async fn chat(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let mut state = state.write().await;
    let response = state
        .coordinator
        .chat(&req.message, req.context.as_ref())
        .await;
    Json(json!({"response": response}))
}

pub async fn chat_history(
    State(state): State<SharedState>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let state = state.read().await;
    let messages = state
        .coordinator
        .conversation(params.limit.unwrap_or(50).min(200));
    Json(json!({"messages": messages}))
}

// ───────────────────────────────────────────────────────────────────────────
// Compliance, SLA & agents
// ───────────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct ComplianceAuditRequest {
    pub framework: Option<String>,
    pub device_id: Option<String>,
}

pub async fn compliance_audit(
    State(state): State<SharedState>,
    Json(req): Json<ComplianceAuditRequest>,
) -> impl IntoResponse {
    let mut state = state.write().await;
    let task = match &req.device_id {
        Some(device_id) => AgentTask::new(
            "compliance",
            "audit",
            json!({"framework": req.framework, "device_id": device_id}),
        ),
        None => AgentTask::new(
            "compliance",
            "audit_all",
            json!({"framework": req.framework}),
        ),
    };
    let result = state.coordinator.process(task).await;
    Json(result.output)
}

pub async fn compliance_status(State(state): State<SharedState>) -> impl IntoResponse {
    let mut state = state.write().await;
    let task = AgentTask::new("compliance", "audit_all", json!({}));
    let result = state.coordinator.process(task).await;
    Json(result.output)
}

pub async fn sla_status(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    Json(json!(state.sla.summary()))
}

pub async fn agent_status(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    Json(json!(state.coordinator.status()))
}
