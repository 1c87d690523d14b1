//! Detection pipeline scenarios: health engine feeding the alert manager.

use netpulse_model::{AlertSeverity, AlertState, Metric, MetricSource, MetricType};
use netpulse_monitor::{AlertManager, HealthEngine};

fn cpu(device: &str, value: f64) -> Metric {
    Metric::new(device, MetricType::Cpu, value, "percent", MetricSource::Snmp)
}

#[test]
fn test_cpu_spike_creates_single_critical_alert() {
    let mut health = HealthEngine::default();
    let mut alerts = AlertManager::new();

    for _ in 0..10 {
        let generated = health.process_metrics(&[cpu("d1", 50.0)]);
        alerts.add_alerts(generated);
    }
    assert_eq!(alerts.total_alerts(), 0);

    let generated = health.process_metrics(&[cpu("d1", 90.0)]);
    let stored = alerts.add_alerts(generated);

    assert_eq!(stored.len(), 1);
    assert_eq!(alerts.total_alerts(), 1);
    assert_eq!(stored[0].severity, AlertSeverity::Critical);
    assert_eq!(stored[0].threshold_value, Some(85.0));
    assert_eq!(stored[0].device_id, "d1");
}

#[test]
fn test_dedup_escalates_on_worsening_value() {
    let mut health = HealthEngine::default();
    let mut alerts = AlertManager::new();

    for _ in 0..10 {
        alerts.add_alerts(health.process_metrics(&[cpu("d1", 50.0)]));
    }
    alerts.add_alerts(health.process_metrics(&[cpu("d1", 90.0)]));
    assert_eq!(alerts.total_alerts(), 1);

    // The follow-up sample crosses the emergency tier; the existing alert
    // escalates in place instead of duplicating.
    let merged = alerts.add_alerts(health.process_metrics(&[cpu("d1", 97.0)]));
    assert_eq!(alerts.total_alerts(), 1);
    assert_eq!(merged[0].severity, AlertSeverity::Emergency);
    assert_eq!(merged[0].metric_value, Some(97.0));
}

#[test]
fn test_resolved_alert_allows_fresh_alert() {
    let mut health = HealthEngine::default();
    let mut alerts = AlertManager::new();

    let first = alerts.add_alerts(health.process_metrics(&[cpu("d1", 90.0)]));
    alerts.resolve(&first[0].id);

    let second = alerts.add_alerts(health.process_metrics(&[cpu("d1", 91.0)]));
    assert_ne!(first[0].id, second[0].id);
    assert_eq!(alerts.total_alerts(), 2);
    assert_eq!(second[0].state, AlertState::Active);
}
