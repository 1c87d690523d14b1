//! Forecast handler
//!
//! Capacity prediction via ordinary least squares: fits a line to the
//! sample history, projects when a threshold will be breached, and reports
//! R² as confidence. Trend analysis adds an autocorrelation-based
//! seasonality hint.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use netpulse_model::AgentTask;

use crate::handler::{AgentHandler, HandlerLog};

const MIN_POINTS: usize = 3;
const MIN_SEASONALITY_PERIOD: usize = 10;

pub struct ForecastHandler {
    log: HandlerLog,
}

impl ForecastHandler {
    pub fn new(_simulated: bool) -> Self {
        Self {
            log: HandlerLog::new(),
        }
    }

    /// Predict when `values` will cross `threshold`, one interval per
    /// sample.
    pub fn predict_threshold_breach(
        values: &[f64],
        threshold: f64,
        interval_seconds: f64,
    ) -> Value {
        if values.len() < MIN_POINTS {
            return json!({
                "prediction": "insufficient_data",
                "message": format!("Need at least {MIN_POINTS} data points for prediction"),
            });
        }

        let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
        let (slope, intercept) = linear_regression(&x, values);
        let latest = values[values.len() - 1];

        if slope <= 0.0 {
            let trend = if slope < 0.0 { "decreasing" } else { "stable" };
            return json!({
                "prediction": "no_breach",
                "slope": round6(slope),
                "current_value": round2(latest),
                "threshold": threshold,
                "trend": trend,
                "message": format!("Metric is {trend}, no breach predicted"),
            });
        }

        let steps_to_breach = ((threshold - latest) / slope).max(0.0);
        let seconds_to_breach = steps_to_breach * interval_seconds;
        let breach_time = Utc::now() + Duration::seconds(seconds_to_breach as i64);

        json!({
            "prediction": "breach_predicted",
            "current_value": round2(latest),
            "threshold": threshold,
            "slope_per_interval": round6(slope),
            "estimated_breach_time": breach_time.to_rfc3339(),
            "time_to_breach_hours": (seconds_to_breach / 3600.0 * 10.0).round() / 10.0,
            "confidence": r_squared(&x, values, slope, intercept),
            "message": format!(
                "Threshold of {threshold} predicted to be reached in {:.1} hours",
                seconds_to_breach / 3600.0
            ),
        })
    }

    /// Trend direction, strength, and a seasonality hint.
    pub fn analyze_trend(values: &[f64]) -> Value {
        if values.len() < MIN_POINTS {
            return json!({"trend": "unknown", "message": "Insufficient data"});
        }

        let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
        let (slope, _) = linear_regression(&x, values);
        let avg = mean(values);
        let std = sample_stddev(values);

        let trend = if slope.abs() < std * 0.01 {
            "stable"
        } else if slope > 0.0 {
            "increasing"
        } else {
            "decreasing"
        };

        json!({
            "trend": trend,
            "slope": round6(slope),
            "mean": round2(avg),
            "std_dev": round2(std),
            "min": round2(values.iter().copied().fold(f64::INFINITY, f64::min)),
            "max": round2(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            "has_seasonality": detect_seasonality(values, MIN_SEASONALITY_PERIOD),
            "data_points": values.len(),
        })
    }
}

#[async_trait]
impl AgentHandler for ForecastHandler {
    fn name(&self) -> &'static str {
        "forecast"
    }

    fn description(&self) -> &'static str {
        "Capacity planning and failure prediction"
    }

    fn log(&self) -> &HandlerLog {
        &self.log
    }

    async fn process(&mut self, mut task: AgentTask) -> AgentTask {
        task.status = netpulse_model::TaskStatus::Running;

        let values: Vec<f64> = task
            .input
            .get("metric_history")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default();

        let outcome = match task.task_kind.as_str() {
            "predict_capacity" => {
                let threshold = task.input_f64("threshold").unwrap_or(90.0);
                Ok(Self::predict_threshold_breach(&values, threshold, 60.0))
            }
            "trend_analysis" => Ok(Self::analyze_trend(&values)),
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
        self.log.log_message("user", message, "forecast");
        let lowered = message.to_lowercase();

        let response = if lowered.contains("bandwidth") || lowered.contains("capacity") {
            "Give me a metric history via a predict_capacity task and I will project when it \
             crosses your threshold, with an R²-backed confidence."
                .to_string()
        } else if lowered.contains("trend") {
            "A trend_analysis task returns slope, spread, and a seasonality hint for any \
             metric history."
                .to_string()
        } else {
            "I forecast capacity exhaustion from metric history: threshold breach timing and \
             trend analysis."
                .to_string()
        };

        self.log.log_message("assistant", &response, "forecast");
        response
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

/// Ordinary least squares over `(x, y)`, returning `(slope, intercept)`.
fn linear_regression(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    if x.is_empty() {
        return (0.0, 0.0);
    }
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(xi, yi)| xi * yi).sum();
    let sum_x2: f64 = x.iter().map(|xi| xi * xi).sum();

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        return (0.0, sum_y / n);
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    (slope, intercept)
}

/// R² of the fitted line, clipped to `[0, 1]`.
fn r_squared(x: &[f64], y: &[f64], slope: f64, intercept: f64) -> f64 {
    let y_mean = mean(y);
    let ss_tot: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 1.0;
    }
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (yi - (slope * xi + intercept)).powi(2))
        .sum();
    let r2 = 1.0 - ss_res / ss_tot;
    (r2.max(0.0) * 1000.0).round() / 1000.0
}

/// Autocorrelation scan over lags in `[min_period, n/2]`; any lag with
/// autocorrelation above 0.5 counts as seasonal.
fn detect_seasonality(values: &[f64], min_period: usize) -> bool {
    let n = values.len();
    if n < min_period * 2 {
        return false;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
    if variance == 0.0 {
        return false;
    }

    for lag in min_period..n / 2 {
        let autocorr = (0..n - lag)
            .map(|i| (values[i] - m) * (values[i + lag] - m))
            .sum::<f64>()
            / ((n - lag) as f64 * variance);
        if autocorr > 0.5 {
            return true;
        }
    }
    false
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_model::TaskStatus;

    #[tokio::test]
    async fn test_linear_growth_breach() {
        let mut handler = ForecastHandler::new(true);
        let task = AgentTask::new(
            "forecast",
            "predict_capacity",
            json!({"metric_history": [10, 12, 14, 16, 18, 20, 22, 24, 26, 28], "threshold": 50}),
        );
        let result = handler.process(task).await;
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.output["prediction"], "breach_predicted");

        let slope = result.output["slope_per_interval"].as_f64().unwrap();
        assert!((slope - 2.0).abs() < 1e-9);
        // (50 - 28) / 2 = 11 intervals of 60s -> 660s -> 0.2h rounded.
        let hours = result.output["time_to_breach_hours"].as_f64().unwrap();
        assert!((hours - 0.2).abs() < 1e-9);
        // A perfect line fits with full confidence.
        assert_eq!(result.output["confidence"].as_f64(), Some(1.0));
    }

    #[tokio::test]
    async fn test_insufficient_data() {
        let mut handler = ForecastHandler::new(true);
        let task = AgentTask::new(
            "forecast",
            "predict_capacity",
            json!({"metric_history": [10, 12], "threshold": 50}),
        );
        let result = handler.process(task).await;
        assert_eq!(result.output["prediction"], "insufficient_data");
    }

    #[tokio::test]
    async fn test_decreasing_series_no_breach() {
        let mut handler = ForecastHandler::new(true);
        let task = AgentTask::new(
            "forecast",
            "predict_capacity",
            json!({"metric_history": [50, 45, 40, 35, 30], "threshold": 90}),
        );
        let result = handler.process(task).await;
        assert_eq!(result.output["prediction"], "no_breach");
        assert_eq!(result.output["trend"], "decreasing");
    }

    #[tokio::test]
    async fn test_trend_increasing() {
        let mut handler = ForecastHandler::new(true);
        let task = AgentTask::new(
            "forecast",
            "trend_analysis",
            json!({"metric_history": [10, 12, 14, 16, 18, 20]}),
        );
        let result = handler.process(task).await;
        assert_eq!(result.output["trend"], "increasing");
        assert_eq!(result.output["data_points"], 6);
    }

    #[test]
    fn test_trend_stable_on_flat_series() {
        let result = ForecastHandler::analyze_trend(&[10.0, 10.0, 10.0, 10.0]);
        assert_eq!(result["trend"], "stable");
    }

    #[test]
    fn test_already_over_threshold_clips_to_zero() {
        let result =
            ForecastHandler::predict_threshold_breach(&[10.0, 20.0, 30.0, 40.0, 95.0], 90.0, 60.0);
        assert_eq!(result["prediction"], "breach_predicted");
        assert_eq!(result["time_to_breach_hours"].as_f64(), Some(0.0));
    }

    #[test]
    fn test_seasonality_detected_on_sine() {
        let values: Vec<f64> = (0..60)
            .map(|i| (f64::from(i) * std::f64::consts::TAU / 12.0).sin() * 10.0 + 50.0)
            .collect();
        assert!(detect_seasonality(&values, 10));
    }

    #[test]
    fn test_no_seasonality_on_ramp() {
        // Mean removal keeps a pure ramp's lagged products below the 0.5 cut
        // across the scanned lags.
        let values: Vec<f64> = (0..40).map(f64::from).collect();
        assert!(!detect_seasonality(&values, 10));
    }
}
