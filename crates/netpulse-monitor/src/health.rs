//! Health engine
//!
//! Threshold evaluation over the metric stream. Keeps a rolling window per
//! `(device, metric type)` series and classifies trends from it. Threshold
//! comparisons are `>=`, evaluated emergency, then critical, then warning;
//! the first satisfied tier wins, so a value over every tier yields a single
//! alert at the highest severity.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use netpulse_model::{
    Alert, AlertSeverity, AlertState, Metric, MetricThreshold, MetricType,
};

const MAX_HISTORY: usize = 1_000;
const STATS_WINDOW: usize = 60;

/// Built-in threshold set.
pub fn default_thresholds() -> Vec<MetricThreshold> {
    vec![
        MetricThreshold {
            metric_type: MetricType::Cpu,
            warning: 70.0,
            critical: 85.0,
            emergency: Some(95.0),
        },
        MetricThreshold {
            metric_type: MetricType::Memory,
            warning: 75.0,
            critical: 90.0,
            emergency: Some(97.0),
        },
        MetricThreshold {
            metric_type: MetricType::ErrorRate,
            warning: 1.0,
            critical: 5.0,
            emergency: Some(10.0),
        },
        MetricThreshold {
            metric_type: MetricType::Temperature,
            warning: 65.0,
            critical: 75.0,
            emergency: Some(85.0),
        },
        MetricThreshold {
            metric_type: MetricType::PacketLoss,
            warning: 0.5,
            critical: 2.0,
            emergency: Some(5.0),
        },
    ]
}

/// Summary statistics for one metric series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricStats {
    pub current: f64,
    pub unit: String,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub stddev: f64,
    pub trend: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Aggregated health for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceHealth {
    pub device_id: String,
    pub status: String,
    pub active_alerts: usize,
    pub metrics: HashMap<String, MetricStats>,
}

/// Threshold evaluation engine with per-series rolling windows.
pub struct HealthEngine {
    thresholds: HashMap<MetricType, MetricThreshold>,
    history: HashMap<String, Vec<Metric>>,
    alerts: Vec<Alert>,
}

impl HealthEngine {
    pub fn new(thresholds: Vec<MetricThreshold>) -> Self {
        Self {
            thresholds: thresholds.into_iter().map(|t| (t.metric_type, t)).collect(),
            history: HashMap::new(),
            alerts: Vec::new(),
        }
    }

    /// Process a metric batch: append each sample to its series, evaluate
    /// thresholds, and return the newly generated alerts.
    pub fn process_metrics(&mut self, metrics: &[Metric]) -> Vec<Alert> {
        let mut new_alerts = Vec::new();
        for metric in metrics {
            let series = self.history.entry(metric.series_key()).or_default();
            series.push(metric.clone());
            if series.len() > MAX_HISTORY {
                let excess = series.len() - MAX_HISTORY;
                series.drain(..excess);
            }

            if let Some(alert) = self.check_threshold(metric) {
                debug!(device = %metric.device_id, metric = metric.metric_type.as_str(),
                       value = metric.value, "threshold crossed");
                new_alerts.push(alert.clone());
                self.alerts.push(alert);
            }
        }
        new_alerts
    }

    /// Aggregate health for one device across all of its series.
    pub fn device_health(&self, device_id: &str) -> DeviceHealth {
        let prefix = format!("{device_id}:");
        let mut metrics = HashMap::new();

        for (key, series) in &self.history {
            let Some(metric_name) = key.strip_prefix(&prefix) else {
                continue;
            };
            let Some(latest) = series.last() else { continue };

            let window: Vec<f64> = series
                .iter()
                .rev()
                .take(STATS_WINDOW)
                .rev()
                .map(|m| m.value)
                .collect();
            metrics.insert(
                metric_name.to_string(),
                MetricStats {
                    current: latest.value,
                    unit: latest.unit.clone(),
                    min: round2(window.iter().copied().fold(f64::INFINITY, f64::min)),
                    max: round2(window.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
                    avg: round2(mean(&window)),
                    stddev: round2(sample_stddev(&window)),
                    trend: trend_label(&window).to_string(),
                    timestamp: latest.timestamp,
                },
            );
        }

        let device_alerts: Vec<&Alert> = self
            .alerts
            .iter()
            .filter(|a| a.device_id == device_id && a.state == AlertState::Active)
            .collect();
        let status = match device_alerts.iter().map(|a| a.severity).max() {
            Some(AlertSeverity::Emergency) => "emergency",
            Some(AlertSeverity::Critical) => "critical",
            Some(AlertSeverity::Warning) => "warning",
            Some(AlertSeverity::Info) | None => "healthy",
        };

        DeviceHealth {
            device_id: device_id.to_string(),
            status: status.to_string(),
            active_alerts: device_alerts.len(),
            metrics,
        }
    }

    /// Raw history for one series, most recent `limit` samples.
    pub fn metric_history(
        &self,
        device_id: &str,
        metric_type: MetricType,
        limit: usize,
    ) -> Vec<Metric> {
        let key = format!("{device_id}:{}", metric_type.as_str());
        self.history
            .get(&key)
            .map(|series| {
                series
                    .iter()
                    .rev()
                    .take(limit)
                    .rev()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn series_len(&self, device_id: &str, metric_type: MetricType) -> usize {
        let key = format!("{device_id}:{}", metric_type.as_str());
        self.history.get(&key).map_or(0, Vec::len)
    }

    /// Install or replace a threshold.
    pub fn set_threshold(&mut self, threshold: MetricThreshold) {
        self.thresholds.insert(threshold.metric_type, threshold);
    }

    pub fn thresholds(&self) -> Vec<MetricThreshold> {
        self.thresholds.values().cloned().collect()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub fn active_alert_count(&self) -> usize {
        self.alerts
            .iter()
            .filter(|a| a.state == AlertState::Active)
            .count()
    }

    fn check_threshold(&self, metric: &Metric) -> Option<Alert> {
        let threshold = self.thresholds.get(&metric.metric_type)?;
        let value = metric.value;

        let (severity, tier) = if threshold.emergency.is_some_and(|e| value >= e) {
            (AlertSeverity::Emergency, threshold.emergency?)
        } else if value >= threshold.critical {
            (AlertSeverity::Critical, threshold.critical)
        } else if value >= threshold.warning {
            (AlertSeverity::Warning, threshold.warning)
        } else {
            return None;
        };

        let label = metric.metric_type.as_str();
        let subject = if metric.device_hostname.is_empty() {
            metric.device_id.clone()
        } else {
            metric.device_hostname.clone()
        };
        let mut alert = Alert::new(
            &metric.device_id,
            severity,
            format!("{} threshold exceeded on {subject}", label.to_uppercase()),
            format!(
                "{label} is {value}{unit}, exceeding {} threshold of {tier}{unit}",
                severity.as_str(),
                unit = metric.unit,
            ),
        );
        alert.device_hostname = metric.device_hostname.clone();
        alert.interface_name = metric.interface_name.clone();
        alert.metric_type = Some(metric.metric_type);
        alert.metric_value = Some(value);
        alert.threshold_value = Some(tier);
        alert.source = "health_engine".to_string();
        Some(alert)
    }
}

impl Default for HealthEngine {
    fn default() -> Self {
        Self::new(default_thresholds())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Compare the mean of the earliest five samples against the latest five;
/// a relative change beyond 10% labels the trend by its sign.
fn trend_label(values: &[f64]) -> &'static str {
    if values.len() < 3 {
        return "stable";
    }
    let older = mean(&values[..values.len().min(5)]);
    let recent = if values.len() >= 5 {
        mean(&values[values.len() - 5..])
    } else {
        values[values.len() - 1]
    };
    let diff = recent - older;
    if diff > older * 0.1 {
        "increasing"
    } else if diff < -older * 0.1 {
        "decreasing"
    } else {
        "stable"
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
