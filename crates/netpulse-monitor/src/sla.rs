//! SLA evaluator
//!
//! Rolling evaluation of SLA targets against the metric stream. Each series
//! keeps the most recent 1 440 samples (24 h at one per minute); the current
//! value is the mean of the last ten samples across the matching series.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use netpulse_model::{Metric, MetricType, SlaComparison, SlaReport, SlaTarget};

const MAX_SAMPLES: usize = 1_440;
const CURRENT_WINDOW: usize = 10;

/// Built-in SLA targets.
pub fn default_sla_targets() -> Vec<SlaTarget> {
    vec![
        SlaTarget {
            name: "Network Latency".to_string(),
            description: "Round-trip latency must stay under 50ms".to_string(),
            metric_type: MetricType::Latency,
            target_value: 50.0,
            comparison: SlaComparison::Lt,
            measurement_window: "24h".to_string(),
            device_filter: None,
        },
        SlaTarget {
            name: "Packet Loss".to_string(),
            description: "Packet loss must stay under 0.1%".to_string(),
            metric_type: MetricType::PacketLoss,
            target_value: 0.1,
            comparison: SlaComparison::Lt,
            measurement_window: "24h".to_string(),
            device_filter: None,
        },
        SlaTarget {
            name: "Network Jitter".to_string(),
            description: "Jitter must stay under 10ms".to_string(),
            metric_type: MetricType::Jitter,
            target_value: 10.0,
            comparison: SlaComparison::Lt,
            measurement_window: "24h".to_string(),
            device_filter: None,
        },
        SlaTarget {
            name: "CPU Utilization".to_string(),
            description: "Average CPU must stay under 80%".to_string(),
            metric_type: MetricType::Cpu,
            target_value: 80.0,
            comparison: SlaComparison::Lt,
            measurement_window: "24h".to_string(),
            device_filter: None,
        },
    ]
}

/// Per-target row in the compliance summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaSummaryRow {
    pub name: String,
    pub is_met: bool,
    pub current: f64,
    pub target: f64,
    pub compliance: f64,
}

/// Overall SLA compliance summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaSummary {
    pub total_targets: usize,
    pub targets_met: usize,
    pub targets_violated: usize,
    pub overall_compliance: f64,
    pub reports: Vec<SlaSummaryRow>,
}

/// Rolling SLA evaluation engine.
pub struct SlaEvaluator {
    targets: Vec<SlaTarget>,
    samples: HashMap<String, Vec<f64>>,
}

impl SlaEvaluator {
    pub fn new(targets: Vec<SlaTarget>) -> Self {
        Self {
            targets,
            samples: HashMap::new(),
        }
    }

    pub fn add_target(&mut self, target: SlaTarget) {
        self.targets.push(target);
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Ingest metrics for later evaluation.
    pub fn process_metrics(&mut self, metrics: &[Metric]) {
        for metric in metrics {
            let series = self.samples.entry(metric.series_key()).or_default();
            series.push(metric.value);
            if series.len() > MAX_SAMPLES {
                let excess = series.len() - MAX_SAMPLES;
                series.drain(..excess);
            }
        }
    }

    /// Evaluate every target, optionally restricted to one device.
    pub fn evaluate(&self, device_id: Option<&str>) -> Vec<SlaReport> {
        let now = Utc::now();
        let mut reports = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let suffix = format!(":{}", target.metric_type.as_str());
            let mut values: Vec<f64> = Vec::new();
            for (key, series) in &self.samples {
                if !key.ends_with(&suffix) {
                    continue;
                }
                if let Some(device) = device_id {
                    if !key.starts_with(&format!("{device}:")) {
                        continue;
                    }
                }
                values.extend_from_slice(series);
            }

            if values.is_empty() {
                reports.push(SlaReport {
                    target: target.clone(),
                    current_value: 0.0,
                    is_met: true,
                    compliance_percentage: 100.0,
                    period_start: now - Duration::hours(24),
                    period_end: now,
                    violations: 0,
                });
                continue;
            }

            let current = if values.len() >= CURRENT_WINDOW {
                let tail = &values[values.len() - CURRENT_WINDOW..];
                tail.iter().sum::<f64>() / tail.len() as f64
            } else {
                values[values.len() - 1]
            };

            let (violations, is_met) = match target.comparison {
                SlaComparison::Lt => (
                    values.iter().filter(|v| **v >= target.target_value).count(),
                    current < target.target_value,
                ),
                SlaComparison::Gt => (
                    values.iter().filter(|v| **v <= target.target_value).count(),
                    current > target.target_value,
                ),
            };
            let compliance =
                ((values.len() - violations) as f64 / values.len() as f64) * 100.0;

            reports.push(SlaReport {
                target: target.clone(),
                current_value: round2(current),
                is_met,
                compliance_percentage: round2(compliance),
                period_start: now - Duration::hours(24),
                period_end: now,
                violations,
            });
        }
        reports
    }

    /// Overall compliance summary across all targets.
    pub fn summary(&self) -> SlaSummary {
        let reports = self.evaluate(None);
        let total = reports.len();
        let met = reports.iter().filter(|r| r.is_met).count();
        SlaSummary {
            total_targets: total,
            targets_met: met,
            targets_violated: total - met,
            overall_compliance: if total == 0 {
                100.0
            } else {
                ((met as f64 / total as f64) * 1000.0).round() / 10.0
            },
            reports: reports
                .iter()
                .map(|r| SlaSummaryRow {
                    name: r.target.name.clone(),
                    is_met: r.is_met,
                    current: r.current_value,
                    target: r.target.target_value,
                    compliance: r.compliance_percentage,
                })
                .collect(),
        }
    }
}

impl Default for SlaEvaluator {
    fn default() -> Self {
        Self::new(default_sla_targets())
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
