//! NetPulse anomaly engine
//!
//! Multi-method statistical anomaly detection over the metric stream.
//! Three detectors run independently per sample:
//! - z-score against the series mean/stddev
//! - IQR fence (`[Q1 - k*IQR, Q3 + k*IQR]`, k = 1.5)
//! - EWMA deviation with per-series running variance
//!
//! A maintenance-window predicate gates everything: samples from covered
//! devices are still appended to history but produce no detections.
//! Temporal correlation groups nearby anomalies into incidents.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use netpulse_model::{new_id, Alert, AlertSeverity, Metric, MetricType};

const MAX_HISTORY: usize = 2_000;

/// Detection method that flagged a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    ZScore,
    Iqr,
    Ewma,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::ZScore => "z_score",
            DetectionMethod::Iqr => "iqr",
            DetectionMethod::Ewma => "ewma",
        }
    }
}

/// One flagged sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub method: DetectionMethod,
    pub score: f64,
    pub device_id: String,
    pub metric_type: MetricType,
    pub value: f64,
    pub details: String,
    pub detected_at: DateTime<Utc>,
}

/// Interval during which detections are suppressed for covered devices.
/// An empty device list covers every device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub device_ids: Vec<String>,
}

impl MaintenanceWindow {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    fn covers(&self, device_id: &str) -> bool {
        self.device_ids.is_empty() || self.device_ids.iter().any(|d| d == device_id)
    }
}

/// Anomalies grouped into a single incident by temporal proximity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationGroup {
    pub id: String,
    pub size: usize,
    pub devices: Vec<String>,
    pub metrics: Vec<String>,
    pub time_span_seconds: f64,
}

/// Multi-method anomaly detection engine with per-series state.
pub struct AnomalyEngine {
    z_threshold: f64,
    iqr_multiplier: f64,
    ewma_alpha: f64,
    min_samples: usize,
    history: HashMap<String, Vec<f64>>,
    ewma: HashMap<String, f64>,
    ewma_var: HashMap<String, f64>,
    windows: Vec<MaintenanceWindow>,
    anomalies: Vec<Anomaly>,
}

impl AnomalyEngine {
    pub fn new() -> Self {
        Self {
            z_threshold: 3.0,
            iqr_multiplier: 1.5,
            ewma_alpha: 0.3,
            min_samples: 10,
            history: HashMap::new(),
            ewma: HashMap::new(),
            ewma_var: HashMap::new(),
            windows: Vec::new(),
            anomalies: Vec::new(),
        }
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Run all detectors on one sample.
    ///
    /// The sample is appended to its series history unconditionally; an
    /// active maintenance window or a short series only suppresses the
    /// detections themselves.
    pub fn detect(&mut self, metric: &Metric) -> Vec<Anomaly> {
        let key = metric.series_key();
        let series = self.history.entry(key.clone()).or_default();
        series.push(metric.value);
        if series.len() > MAX_HISTORY {
            let excess = series.len() - MAX_HISTORY;
            series.drain(..excess);
        }

        if self.in_maintenance(&metric.device_id) {
            return Vec::new();
        }

        let series = self.history.get(&key).cloned().unwrap_or_default();
        if series.len() < self.min_samples {
            return Vec::new();
        }

        let mut results = Vec::new();
        if let Some(anomaly) = self.z_score_detect(metric, &series) {
            results.push(anomaly);
        }
        if let Some(anomaly) = self.iqr_detect(metric, &series) {
            results.push(anomaly);
        }
        if let Some(anomaly) = self.ewma_detect(metric, &key) {
            results.push(anomaly);
        }

        if !results.is_empty() {
            debug!(device = %metric.device_id, metric = metric.metric_type.as_str(),
                   count = results.len(), "anomalies detected");
        }
        self.anomalies.extend(results.iter().cloned());
        results
    }

    /// Run detection over a batch.
    pub fn detect_batch(&mut self, metrics: &[Metric]) -> Vec<Anomaly> {
        let mut all = Vec::new();
        for metric in metrics {
            all.extend(self.detect(metric));
        }
        all
    }

    pub fn add_maintenance_window(&mut self, window: MaintenanceWindow) {
        self.windows.push(window);
    }

    /// Recorded anomalies with optional filters, most recent `limit`.
    pub fn anomalies(
        &self,
        device_id: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<Anomaly> {
        let matching: Vec<&Anomaly> = self
            .anomalies
            .iter()
            .filter(|a| device_id.map_or(true, |d| a.device_id == d))
            .filter(|a| since.map_or(true, |s| a.detected_at >= s))
            .collect();
        matching
            .into_iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }

    pub fn series_len(&self, device_id: &str, metric_type: MetricType) -> usize {
        let key = format!("{device_id}:{}", metric_type.as_str());
        self.history.get(&key).map_or(0, Vec::len)
    }

    /// Group anomalies whose timestamps fall within `window_seconds` of a
    /// seed anomaly. Groups of one are dropped.
    pub fn correlate(&self, window_seconds: i64) -> Vec<CorrelationGroup> {
        let mut groups = Vec::new();
        let mut used: HashSet<usize> = HashSet::new();

        for (i, seed) in self.anomalies.iter().enumerate() {
            if used.contains(&i) {
                continue;
            }
            let mut members = vec![seed];
            used.insert(i);
            for (j, candidate) in self.anomalies.iter().enumerate().skip(i + 1) {
                if used.contains(&j) {
                    continue;
                }
                let gap = (seed.detected_at - candidate.detected_at).num_seconds().abs();
                if gap <= window_seconds {
                    members.push(candidate);
                    used.insert(j);
                }
            }
            if members.len() < 2 {
                continue;
            }

            let mut devices: Vec<String> = members
                .iter()
                .map(|a| a.device_id.clone())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            devices.sort();
            let mut metrics: Vec<String> = members
                .iter()
                .map(|a| a.metric_type.as_str().to_string())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            metrics.sort();

            let earliest = members.iter().map(|a| a.detected_at).min();
            let latest = members.iter().map(|a| a.detected_at).max();
            let span = match (earliest, latest) {
                (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
                _ => 0.0,
            };

            groups.push(CorrelationGroup {
                id: new_id(),
                size: members.len(),
                devices,
                metrics,
                time_span_seconds: span,
            });
        }
        groups
    }

    /// Surface correlation groups as single incident alerts carrying the
    /// group's correlation id.
    pub fn incident_alerts(&self, window_seconds: i64) -> Vec<Alert> {
        self.correlate(window_seconds)
            .into_iter()
            .map(|group| {
                let device_id = group.devices.first().cloned().unwrap_or_default();
                let mut alert = Alert::new(
                    device_id,
                    AlertSeverity::Warning,
                    format!("Correlated anomaly incident ({} anomalies)", group.size),
                    format!(
                        "Anomalies on {} across {} within {:.0}s",
                        group.devices.join(", "),
                        group.metrics.join(", "),
                        group.time_span_seconds,
                    ),
                );
                alert.source = "anomaly_correlation".to_string();
                alert.correlation_id = Some(group.id);
                alert
            })
            .collect()
    }

    fn in_maintenance(&self, device_id: &str) -> bool {
        let now = Utc::now();
        self.windows
            .iter()
            .any(|w| w.is_active(now) && w.covers(device_id))
    }

    fn z_score_detect(&self, metric: &Metric, series: &[f64]) -> Option<Anomaly> {
        let mean = mean(series);
        let std = sample_stddev(series);
        if std == 0.0 {
            return None;
        }
        let z = (metric.value - mean) / std;
        if z.abs() <= self.z_threshold {
            return None;
        }
        Some(self.anomaly(
            metric,
            DetectionMethod::ZScore,
            z.abs(),
            format!(
                "Z-score {z:.2} exceeds threshold {} (mean={mean:.2}, std={std:.2})",
                self.z_threshold
            ),
        ))
    }

    fn iqr_detect(&self, metric: &Metric, series: &[f64]) -> Option<Anomaly> {
        let mut sorted = series.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        let q1 = sorted[n / 4];
        let q3 = sorted[3 * n / 4];
        let iqr = q3 - q1;

        let lower = q1 - self.iqr_multiplier * iqr;
        let upper = q3 + self.iqr_multiplier * iqr;
        if metric.value >= lower && metric.value <= upper {
            return None;
        }

        let score = (metric.value - lower)
            .abs()
            .max((metric.value - upper).abs())
            / iqr.max(1.0);
        Some(self.anomaly(
            metric,
            DetectionMethod::Iqr,
            score,
            format!(
                "Value {:.2} outside IQR bounds [{lower:.2}, {upper:.2}]",
                metric.value
            ),
        ))
    }

    fn ewma_detect(&mut self, metric: &Metric, key: &str) -> Option<Anomaly> {
        let alpha = self.ewma_alpha;
        let Some(prev) = self.ewma.get(key).copied() else {
            // First sample initializes state and never alerts.
            self.ewma.insert(key.to_string(), metric.value);
            self.ewma_var.insert(key.to_string(), 0.0);
            return None;
        };

        let next = alpha * metric.value + (1.0 - alpha) * prev;
        self.ewma.insert(key.to_string(), next);

        let diff = metric.value - prev;
        let prev_var = self.ewma_var.get(key).copied().unwrap_or(0.0);
        let var = alpha * diff * diff + (1.0 - alpha) * prev_var;
        self.ewma_var.insert(key.to_string(), var);

        if var <= 0.0 {
            return None;
        }
        let std = var.sqrt();
        let z = diff.abs() / std;
        if z <= self.z_threshold {
            return None;
        }
        Some(self.anomaly(
            metric,
            DetectionMethod::Ewma,
            z,
            format!("EWMA deviation {z:.2} exceeds threshold (ewma={next:.2}, std={std:.2})"),
        ))
    }

    fn anomaly(
        &self,
        metric: &Metric,
        method: DetectionMethod,
        score: f64,
        details: String,
    ) -> Anomaly {
        Anomaly {
            method,
            score,
            device_id: metric.device_id.clone(),
            metric_type: metric.metric_type,
            value: metric.value,
            details,
            detected_at: Utc::now(),
        }
    }
}

impl Default for AnomalyEngine {
    fn default() -> Self {
        Self::new()
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use netpulse_model::MetricSource;

    fn cpu(device: &str, value: f64) -> Metric {
        Metric::new(device, MetricType::Cpu, value, "percent", MetricSource::Snmp)
    }

    #[test]
    fn test_min_samples_gate() {
        let mut engine = AnomalyEngine::new();
        let results = engine.detect(&cpu("d1", 200.0));
        assert!(results.is_empty());
        assert_eq!(engine.series_len("d1", MetricType::Cpu), 1);
    }

    #[test]
    fn test_constant_series_never_flags() {
        // Z-score needs nonzero stddev; IQR bounds collapse onto the value.
        let mut engine = AnomalyEngine::new();
        for _ in 0..30 {
            let results = engine.detect(&cpu("d1", 50.0));
            assert!(results.is_empty());
        }
        assert_eq!(engine.anomaly_count(), 0);
    }

    #[test]
    fn test_spike_detected() {
        let mut engine = AnomalyEngine::new();
        for i in 0..30 {
            engine.detect(&cpu("d1", 50.0 + f64::from(i % 3)));
        }
        let results = engine.detect(&cpu("d1", 150.0));
        assert!(!results.is_empty());
        assert!(results.iter().any(|a| a.method == DetectionMethod::ZScore));
        assert!(results.iter().all(|a| a.score > 0.0));
    }

    #[test]
    fn test_iqr_zero_iqr_flags_any_deviation() {
        let mut engine = AnomalyEngine::new();
        // Constant history collapses Q1 == Q3, so any different value is
        // outside the fence even though z-score stays silent until stddev
        // moves.
        for _ in 0..12 {
            engine.detect(&cpu("d1", 50.0));
        }
        let results = engine.detect(&cpu("d1", 50.5));
        assert!(results.iter().any(|a| a.method == DetectionMethod::Iqr));
    }

    #[test]
    fn test_ewma_first_sample_never_alerts() {
        let mut engine = AnomalyEngine::new().with_min_samples(1);
        let results = engine.detect(&cpu("d1", 1_000.0));
        assert!(results.iter().all(|a| a.method != DetectionMethod::Ewma));
    }

    #[test]
    fn test_maintenance_window_suppresses_but_history_grows() {
        let mut engine = AnomalyEngine::new();
        let now = Utc::now();
        engine.add_maintenance_window(MaintenanceWindow {
            name: "change-window".to_string(),
            start: now - Duration::hours(1),
            end: now + Duration::hours(1),
            device_ids: vec!["d1".to_string()],
        });

        for _ in 0..15 {
            assert!(engine.detect(&cpu("d1", 50.0)).is_empty());
        }
        let results = engine.detect(&cpu("d1", 200.0));
        assert!(results.is_empty());
        assert_eq!(engine.series_len("d1", MetricType::Cpu), 16);
    }

    #[test]
    fn test_maintenance_window_empty_devices_covers_all() {
        let mut engine = AnomalyEngine::new();
        let now = Utc::now();
        engine.add_maintenance_window(MaintenanceWindow {
            name: "global".to_string(),
            start: now - Duration::hours(1),
            end: now + Duration::hours(1),
            device_ids: Vec::new(),
        });
        for _ in 0..15 {
            engine.detect(&cpu("any-device", 50.0));
        }
        assert!(engine.detect(&cpu("any-device", 500.0)).is_empty());
    }

    #[test]
    fn test_expired_window_does_not_suppress() {
        let mut engine = AnomalyEngine::new();
        let now = Utc::now();
        engine.add_maintenance_window(MaintenanceWindow {
            name: "past".to_string(),
            start: now - Duration::hours(3),
            end: now - Duration::hours(2),
            device_ids: vec!["d1".to_string()],
        });
        for _ in 0..15 {
            engine.detect(&cpu("d1", 50.0));
        }
        // Constant series still yields nothing from z-score, but IQR flags
        // the excursion, proving the gate is open.
        let results = engine.detect(&cpu("d1", 500.0));
        assert!(!results.is_empty());
    }

    #[test]
    fn test_correlation_groups() {
        let mut engine = AnomalyEngine::new();
        for device in ["d1", "d2"] {
            for i in 0..20 {
                engine.detect(&cpu(device, 50.0 + f64::from(i % 2)));
            }
        }
        engine.detect(&cpu("d1", 400.0));
        engine.detect(&cpu("d2", 400.0));
        assert!(engine.anomaly_count() >= 2);

        let groups = engine.correlate(300);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].size >= 2);
        assert!(groups[0].devices.contains(&"d1".to_string()));
        assert!(groups[0].devices.contains(&"d2".to_string()));
    }

    #[test]
    fn test_incident_alerts_carry_correlation_id() {
        let mut engine = AnomalyEngine::new();
        for i in 0..20 {
            engine.detect(&cpu("d1", 50.0 + f64::from(i % 2)));
        }
        engine.detect(&cpu("d1", 400.0));
        engine.detect(&cpu("d1", 410.0));

        let alerts = engine.incident_alerts(300);
        if let Some(alert) = alerts.first() {
            assert!(alert.correlation_id.is_some());
            assert_eq!(alert.source, "anomaly_correlation");
        }
    }

    #[test]
    fn test_anomaly_query_filters() {
        let mut engine = AnomalyEngine::new();
        for i in 0..20 {
            engine.detect(&cpu("d1", 50.0 + f64::from(i % 2)));
        }
        engine.detect(&cpu("d1", 400.0));

        assert!(!engine.anomalies(Some("d1"), None, 10).is_empty());
        assert!(engine.anomalies(Some("other"), None, 10).is_empty());
    }
}
