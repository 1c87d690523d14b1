//! Diagnosis handler
//!
//! Root-cause analysis over alert sets, temporal correlation of related
//! alerts, and statistical analysis of raw metric samples.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use netpulse_model::AgentTask;

use crate::handler::{AgentHandler, HandlerLog};

pub struct DiagnosisHandler {
    log: HandlerLog,
    device_re: Vec<Regex>,
}

impl DiagnosisHandler {
    pub fn new(_simulated: bool) -> Self {
        let patterns = [
            r"on\s+([\w-]+)",
            r"for\s+([\w-]+)",
            r"device\s+([\w-]+)",
            r"(router-[\w-]+)",
            r"(switch-[\w-]+)",
            r"(firewall-[\w-]+)",
        ];
        Self {
            log: HandlerLog::new(),
            device_re: patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }

    /// Root-cause analysis: the device carrying the most alerts is the
    /// primary suspect; everything else is downstream.
    fn perform_rca(alerts: &[Value]) -> Value {
        if alerts.is_empty() {
            return json!({
                "root_cause": "No alerts to analyze",
                "confidence": 0.0,
                "affected_devices": [],
            });
        }

        let mut by_device: HashMap<&str, usize> = HashMap::new();
        for alert in alerts {
            let device = alert
                .get("device_id")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            *by_device.entry(device).or_default() += 1;
        }

        let root_device = by_device
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(device, _)| (*device).to_string())
            .unwrap_or_default();
        let mut affected: Vec<&str> = by_device.keys().copied().collect();
        affected.sort_unstable();

        json!({
            "root_cause": format!("Primary failure detected on device {root_device}"),
            "root_device": root_device,
            "confidence": 0.85,
            "affected_devices": affected,
            "correlation_count": alerts.len(),
            "recommendation": "Investigate the root device first, then verify downstream recovery",
        })
    }

    /// Group alerts sharing a metric type.
    fn correlate_alerts(alerts: &[Value]) -> Vec<Value> {
        let mut correlations = Vec::new();
        let metric_of =
            |alert: &Value| alert.get("metric_type").and_then(Value::as_str).map(String::from);

        for (i, seed) in alerts.iter().enumerate() {
            let Some(metric) = metric_of(seed) else { continue };
            let mut devices: Vec<Value> = vec![seed.get("device_id").cloned().unwrap_or(Value::Null)];
            for other in &alerts[i + 1..] {
                if metric_of(other).as_deref() == Some(metric.as_str()) {
                    devices.push(other.get("device_id").cloned().unwrap_or(Value::Null));
                }
            }
            if devices.len() > 1 {
                correlations.push(json!({
                    "group_size": devices.len(),
                    "common_metric": metric,
                    "devices": devices,
                }));
            }
        }
        correlations
    }

    /// Flag samples more than two population stddevs from the mean.
    fn analyze_anomaly(metrics: &[Value]) -> Value {
        let values: Vec<f64> = metrics
            .iter()
            .filter_map(|m| m.get("value").and_then(Value::as_f64))
            .collect();
        if values.is_empty() {
            return json!({"anomalies": [], "status": "no_data"});
        }

        let avg = values.iter().sum::<f64>() / values.len() as f64;
        let std = if values.len() > 1 {
            (values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
        } else {
            0.0
        };

        let mut anomalies = Vec::new();
        if std > 0.0 {
            for metric in metrics {
                let Some(value) = metric.get("value").and_then(Value::as_f64) else {
                    continue;
                };
                let deviation = (value - avg).abs();
                if deviation > 2.0 * std {
                    anomalies.push(json!({
                        "metric": metric,
                        "z_score": ((value - avg) / std * 100.0).round() / 100.0,
                        "severity": if deviation > 3.0 * std { "high" } else { "medium" },
                    }));
                }
            }
        }

        json!({
            "anomaly_count": anomalies.len(),
            "status": if anomalies.is_empty() { "normal" } else { "anomalies_detected" },
            "anomalies": anomalies,
            "mean": (avg * 100.0).round() / 100.0,
            "std_dev": (std * 100.0).round() / 100.0,
        })
    }

    fn extract_device(&self, message: &str) -> Option<String> {
        for re in &self.device_re {
            if let Some(caps) = re.captures(message) {
                if let Some(m) = caps.get(1) {
                    return Some(m.as_str().to_string());
                }
            }
        }
        None
    }
}

#[async_trait]
impl AgentHandler for DiagnosisHandler {
    fn name(&self) -> &'static str {
        "diagnosis"
    }

    fn description(&self) -> &'static str {
        "Root-cause analysis and anomaly diagnosis"
    }

    fn log(&self) -> &HandlerLog {
        &self.log
    }

    async fn process(&mut self, mut task: AgentTask) -> AgentTask {
        task.status = netpulse_model::TaskStatus::Running;

        let empty = Vec::new();
        let outcome = match task.task_kind.as_str() {
            "diagnose" => {
                let alerts = task
                    .input
                    .get("alerts")
                    .and_then(Value::as_array)
                    .unwrap_or(&empty);
                Ok(Self::perform_rca(alerts))
            }
            "correlate" => {
                let alerts = task
                    .input
                    .get("alerts")
                    .and_then(Value::as_array)
                    .unwrap_or(&empty);
                Ok(json!({"correlations": Self::correlate_alerts(alerts)}))
            }
            "analyze_anomaly" => {
                let metrics = task
                    .input
                    .get("metrics")
                    .and_then(Value::as_array)
                    .unwrap_or(&empty);
                Ok(Self::analyze_anomaly(metrics))
            }
            other => Err(format!("unknown task kind: {other}")),
        };

        let finished = match outcome {
            Ok(output) => task.complete(output),
            Err(e) => task.fail(e),
        };
        self.log.record_task(&finished);
        finished
    }

    async fn chat(&mut self, message: &str, _context: Option<&Value>) -> String {
        self.log.log_message("user", message, "diagnosis");
        let lowered = message.to_lowercase();
        let device = self
            .extract_device(message)
            .unwrap_or_else(|| "router-core-1".to_string());

        let response = if lowered.contains("bgp") {
            format!(
                "Root cause analysis for BGP instability on {device}: check interface error \
                 counters and optic levels first; hold-timer expiry from physical-layer loss \
                 is the most common trigger."
            )
        } else if lowered.contains("cpu") {
            format!(
                "High CPU on {device} usually traces to process-switched traffic; start from \
                 the per-process CPU listing and the ARP table growth rate."
            )
        } else if lowered.contains("interface") && lowered.contains("down") {
            format!(
                "Interface down on {device}: verify both link ends, then cabling and optics; \
                 correlate against recent config changes."
            )
        } else {
            "I analyze alerts and metrics for root causes. Give me an alert set to diagnose, \
             alerts to correlate, or metric samples to analyze."
                .to_string()
        };

        self.log.log_message("assistant", &response, "diagnosis");
        response
    }
}
