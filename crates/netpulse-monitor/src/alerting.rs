//! Alert manager
//!
//! Owns the alert lifecycle: dedup on add, the
//! active → acknowledged → resolved state machine, suppression rules, and
//! summary aggregation. Alerts are never deleted; they persist for audit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use netpulse_model::{Alert, AlertSeverity, AlertState, MetricType};

/// Predicate that forces matching alerts into the suppressed state on add.
/// Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuppressionRule {
    pub device_id: Option<String>,
    pub metric_type: Option<MetricType>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub reason: String,
}

impl SuppressionRule {
    fn matches(&self, alert: &Alert, now: DateTime<Utc>) -> bool {
        if self.start_time.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| now > end) {
            return false;
        }
        if self
            .device_id
            .as_deref()
            .is_some_and(|device| device != alert.device_id)
        {
            return false;
        }
        if let (Some(rule_type), Some(alert_type)) = (self.metric_type, alert.metric_type) {
            if rule_type != alert_type {
                return false;
            }
        }
        true
    }
}

/// Filters for querying alerts.
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    pub state: Option<AlertState>,
    pub severity: Option<AlertSeverity>,
    pub device_id: Option<String>,
    pub limit: usize,
}

/// Summary counters across all alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total: usize,
    pub active: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub suppressed: usize,
    pub by_severity: HashMap<String, usize>,
    pub by_device: HashMap<String, usize>,
}

/// Owner of all alerts and their state machine.
#[derive(Default)]
pub struct AlertManager {
    alerts: HashMap<String, Alert>,
    suppression_rules: Vec<SuppressionRule>,
}

impl AlertManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alert, applying suppression and dedup.
    ///
    /// If an active alert already exists for the same `(device, metric type)`
    /// the incoming alert is merged into it: value and description update,
    /// severity escalates to the max of the two, and a non-empty correlation
    /// id is preferred. Exactly one of create-or-update happens per add.
    pub fn add_alert(&mut self, mut alert: Alert) -> Alert {
        let now = Utc::now();
        if self.suppression_rules.iter().any(|r| r.matches(&alert, now)) {
            alert.state = AlertState::Suppressed;
            debug!(title = %alert.title, "alert suppressed");
        }

        if let Some(metric_type) = alert.metric_type {
            let existing = self.alerts.values_mut().find(|e| {
                e.device_id == alert.device_id
                    && e.metric_type == Some(metric_type)
                    && e.state == AlertState::Active
            });
            if let Some(existing) = existing {
                existing.metric_value = alert.metric_value;
                existing.description = alert.description;
                existing.severity = existing.severity.max(alert.severity);
                if existing.correlation_id.is_none() {
                    existing.correlation_id = alert.correlation_id;
                }
                return existing.clone();
            }
        }

        info!(severity = alert.severity.as_str(), title = %alert.title, "new alert");
        self.alerts.insert(alert.id.clone(), alert.clone());
        alert
    }

    pub fn add_alerts(&mut self, alerts: Vec<Alert>) -> Vec<Alert> {
        alerts.into_iter().map(|a| self.add_alert(a)).collect()
    }

    /// Acknowledge an active alert. Acknowledging twice is a no-op that
    /// returns the alert unchanged.
    pub fn acknowledge(&mut self, alert_id: &str, acknowledged_by: &str) -> Option<Alert> {
        let alert = self.alerts.get_mut(alert_id)?;
        match alert.state {
            AlertState::Active => {
                alert.state = AlertState::Acknowledged;
                alert.acknowledged_at = Some(Utc::now());
                alert.acknowledged_by = Some(acknowledged_by.to_string());
                info!(title = %alert.title, by = acknowledged_by, "alert acknowledged");
                Some(alert.clone())
            }
            AlertState::Acknowledged => Some(alert.clone()),
            AlertState::Resolved | AlertState::Suppressed => None,
        }
    }

    /// Resolve an alert from the active or acknowledged state. `resolved`
    /// is terminal.
    pub fn resolve(&mut self, alert_id: &str) -> Option<Alert> {
        let alert = self.alerts.get_mut(alert_id)?;
        match alert.state {
            AlertState::Active | AlertState::Acknowledged => {
                alert.state = AlertState::Resolved;
                alert.resolved_at = Some(Utc::now());
                info!(title = %alert.title, "alert resolved");
                Some(alert.clone())
            }
            AlertState::Resolved | AlertState::Suppressed => None,
        }
    }

    pub fn alert(&self, alert_id: &str) -> Option<&Alert> {
        self.alerts.get(alert_id)
    }

    /// Query alerts, newest first.
    pub fn alerts(&self, query: &AlertQuery) -> Vec<Alert> {
        let limit = if query.limit == 0 { 100 } else { query.limit };
        let mut matching: Vec<Alert> = self
            .alerts
            .values()
            .filter(|a| query.state.map_or(true, |s| a.state == s))
            .filter(|a| query.severity.map_or(true, |s| a.severity == s))
            .filter(|a| {
                query
                    .device_id
                    .as_deref()
                    .map_or(true, |d| a.device_id == d)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        matching
    }

    /// Totals by state, severity, and (active only) device.
    pub fn summary(&self) -> AlertSummary {
        let mut by_severity: HashMap<String, usize> = HashMap::new();
        let mut by_state: HashMap<AlertState, usize> = HashMap::new();
        let mut by_device: HashMap<String, usize> = HashMap::new();

        for alert in self.alerts.values() {
            *by_severity.entry(alert.severity.as_str().to_string()).or_default() += 1;
            *by_state.entry(alert.state).or_default() += 1;
            if alert.state == AlertState::Active {
                let key = if alert.device_hostname.is_empty() {
                    alert.device_id.clone()
                } else {
                    alert.device_hostname.clone()
                };
                *by_device.entry(key).or_default() += 1;
            }
        }

        AlertSummary {
            total: self.alerts.len(),
            active: by_state.get(&AlertState::Active).copied().unwrap_or(0),
            acknowledged: by_state.get(&AlertState::Acknowledged).copied().unwrap_or(0),
            resolved: by_state.get(&AlertState::Resolved).copied().unwrap_or(0),
            suppressed: by_state.get(&AlertState::Suppressed).copied().unwrap_or(0),
            by_severity,
            by_device,
        }
    }

    pub fn add_suppression_rule(&mut self, rule: SuppressionRule) {
        self.suppression_rules.push(rule);
    }

    pub fn total_alerts(&self) -> usize {
        self.alerts.len()
    }
}
