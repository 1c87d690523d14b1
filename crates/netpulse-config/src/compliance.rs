//! Compliance evaluator
//!
//! Applies a rule set (`contains` / `not_contains` / `regex`) to captured
//! device configurations. Regex checks run multi-line and case-insensitive.
//! An empty config is `not_assessed` rather than failed.

use std::collections::HashMap;

use chrono::Utc;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use netpulse_model::{
    new_id, AlertSeverity, CheckKind, ComplianceResult, ComplianceRule, ComplianceStatus,
};

/// The built-in rule set spanning NIST 800-53, CIS, and PCI-DSS controls.
pub fn builtin_rules() -> Vec<ComplianceRule> {
    let rule = |name: &str,
                description: &str,
                framework: &str,
                control_id: &str,
                severity: AlertSeverity,
                check: CheckKind,
                pattern: &str,
                remediation: &str| ComplianceRule {
        id: new_id(),
        name: name.to_string(),
        description: description.to_string(),
        framework: framework.to_string(),
        control_id: control_id.to_string(),
        severity,
        check,
        pattern: pattern.to_string(),
        remediation: remediation.to_string(),
    };

    vec![
        rule(
            "SSH v2 Required",
            "SSH version 2 must be configured (v1 is insecure)",
            "NIST-800-53",
            "AC-17(2)",
            AlertSeverity::Critical,
            CheckKind::Contains,
            "ip ssh version 2",
            "Configure: ip ssh version 2",
        ),
        rule(
            "Password Encryption",
            "Service password-encryption must be enabled",
            "NIST-800-53",
            "IA-5(1)",
            AlertSeverity::Critical,
            CheckKind::Contains,
            "service password-encryption",
            "Configure: service password-encryption",
        ),
        rule(
            "Banner Required",
            "Login banner must be configured for legal notice",
            "NIST-800-53",
            "AC-8",
            AlertSeverity::Warning,
            CheckKind::Regex,
            r"banner\s+(login|motd)\s+",
            "Configure: banner login ^Authorized access only^",
        ),
        rule(
            "NTP Configured",
            "NTP must be configured for accurate timestamps",
            "NIST-800-53",
            "AU-8",
            AlertSeverity::Warning,
            CheckKind::Regex,
            r"ntp server\s+\S+",
            "Configure: ntp server <NTP_SERVER_IP>",
        ),
        rule(
            "Logging Configured",
            "Remote syslog must be configured",
            "NIST-800-53",
            "AU-6",
            AlertSeverity::Critical,
            CheckKind::Regex,
            r"logging host\s+\S+",
            "Configure: logging host <SYSLOG_SERVER_IP>",
        ),
        rule(
            "Console Timeout",
            "Console line must have an exec-timeout",
            "CIS",
            "CIS-1.1.7",
            AlertSeverity::Warning,
            CheckKind::Regex,
            r"line con.*\n.*exec-timeout\s+\d+",
            "Configure under line con 0: exec-timeout 5 0",
        ),
        rule(
            "VTY Access Control",
            "VTY lines must have access-class configured",
            "CIS",
            "CIS-1.2.2",
            AlertSeverity::Critical,
            CheckKind::Regex,
            r"line vty.*\n.*access-class\s+\S+",
            "Configure under line vty 0 15: access-class ACL_VTY in",
        ),
        rule(
            "SNMP Community Not Default",
            "Default SNMP communities (public/private) must not be used",
            "CIS",
            "CIS-2.1.1",
            AlertSeverity::Critical,
            CheckKind::NotContains,
            "snmp-server community public",
            "Remove: no snmp-server community public",
        ),
        rule(
            "Unused Interfaces Shutdown",
            "Unused interfaces should be administratively shut down",
            "PCI-DSS",
            "PCI-1.1.6",
            AlertSeverity::Warning,
            CheckKind::Regex,
            r"interface.*\n\s+shutdown",
            "Shut down unused interfaces: shutdown",
        ),
        rule(
            "AAA Authentication",
            "AAA authentication must be configured",
            "NIST-800-53",
            "IA-2",
            AlertSeverity::Critical,
            CheckKind::Contains,
            "aaa authentication login",
            "Configure: aaa new-model; aaa authentication login default local",
        ),
    ]
}

/// One failed rule in a device audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFailure {
    pub rule: String,
    pub remediation: String,
}

/// Per-device audit rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAudit {
    pub compliant: usize,
    pub non_compliant: usize,
    pub total: usize,
    pub score: f64,
    pub failures: Vec<AuditFailure>,
}

/// Fleet-wide audit totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total_checks: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub overall_score: f64,
}

/// Audit across a device set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub devices: HashMap<String, DeviceAudit>,
    pub summary: AuditSummary,
}

/// Rule-driven static checker over captured configs.
pub struct ComplianceEvaluator {
    rules: Vec<ComplianceRule>,
}

impl ComplianceEvaluator {
    pub fn new(rules: Vec<ComplianceRule>) -> Self {
        Self { rules }
    }

    pub fn add_rule(&mut self, rule: ComplianceRule) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate one device against the (optionally framework-filtered) rule
    /// set.
    pub fn check_device(
        &self,
        device_id: &str,
        config: &str,
        framework: Option<&str>,
    ) -> Vec<ComplianceResult> {
        self.rules
            .iter()
            .filter(|rule| framework.map_or(true, |f| rule.framework == f))
            .map(|rule| {
                let status = evaluate_rule(rule, config);
                debug!(device = device_id, rule = %rule.name, ?status, "rule evaluated");
                ComplianceResult {
                    rule_id: rule.id.clone(),
                    device_id: device_id.to_string(),
                    device_hostname: device_id.to_string(),
                    status,
                    framework: rule.framework.clone(),
                    control_id: rule.control_id.clone(),
                    details: format!(
                        "{}: {}",
                        rule.name,
                        if status == ComplianceStatus::Compliant {
                            "PASS"
                        } else {
                            "FAIL"
                        }
                    ),
                    evidence: if status == ComplianceStatus::NonCompliant {
                        rule.remediation.clone()
                    } else {
                        String::new()
                    },
                    checked_at: Utc::now(),
                }
            })
            .collect()
    }

    /// Audit every `(device, config)` pair and aggregate scores.
    pub fn audit_devices(
        &self,
        configs: &[(String, String)],
        framework: Option<&str>,
    ) -> AuditReport {
        let mut devices = HashMap::new();
        let mut total_checks = 0;
        let mut total_compliant = 0;
        let mut total_non_compliant = 0;

        for (device_id, config) in configs {
            let results = self.check_device(device_id, config, framework);
            let compliant = results
                .iter()
                .filter(|r| r.status == ComplianceStatus::Compliant)
                .count();
            let non_compliant = results
                .iter()
                .filter(|r| r.status == ComplianceStatus::NonCompliant)
                .count();
            let failures = results
                .iter()
                .filter(|r| r.status == ComplianceStatus::NonCompliant)
                .map(|r| AuditFailure {
                    rule: r.details.clone(),
                    remediation: r.evidence.clone(),
                })
                .collect();

            total_checks += results.len();
            total_compliant += compliant;
            total_non_compliant += non_compliant;
            devices.insert(
                device_id.clone(),
                DeviceAudit {
                    compliant,
                    non_compliant,
                    total: results.len(),
                    score: score(compliant, results.len()),
                    failures,
                },
            );
        }

        AuditReport {
            devices,
            summary: AuditSummary {
                total_checks,
                compliant: total_compliant,
                non_compliant: total_non_compliant,
                overall_score: score(total_compliant, total_checks),
            },
        }
    }
}

impl Default for ComplianceEvaluator {
    fn default() -> Self {
        Self::new(builtin_rules())
    }
}

fn evaluate_rule(rule: &ComplianceRule, config: &str) -> ComplianceStatus {
    if config.is_empty() {
        return ComplianceStatus::NotAssessed;
    }

    match rule.check {
        CheckKind::Contains => {
            if config.contains(&rule.pattern) {
                ComplianceStatus::Compliant
            } else {
                ComplianceStatus::NonCompliant
            }
        }
        CheckKind::NotContains => {
            if config.contains(&rule.pattern) {
                ComplianceStatus::NonCompliant
            } else {
                ComplianceStatus::Compliant
            }
        }
        CheckKind::Regex => match RegexBuilder::new(&rule.pattern)
            .multi_line(true)
            .case_insensitive(true)
            .build()
        {
            Ok(re) if re.is_match(config) => ComplianceStatus::Compliant,
            Ok(_) => ComplianceStatus::NonCompliant,
            Err(_) => ComplianceStatus::NotAssessed,
        },
    }
}

fn score(compliant: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((compliant as f64 / total as f64) * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_configs;

    #[test]
    fn test_builtin_rule_count() {
        assert_eq!(builtin_rules().len(), 10);
    }

    #[test]
    fn test_contains_check() {
        let evaluator = ComplianceEvaluator::default();
        let results = evaluator.check_device("d1", "ip ssh version 2\n", None);
        let ssh = results.iter().find(|r| r.details.contains("SSH v2")).unwrap();
        assert_eq!(ssh.status, ComplianceStatus::Compliant);
    }

    #[test]
    fn test_not_contains_check() {
        let evaluator = ComplianceEvaluator::default();
        let results =
            evaluator.check_device("d1", "snmp-server community public RO\n", Some("CIS"));
        let snmp = results
            .iter()
            .find(|r| r.details.contains("SNMP Community"))
            .unwrap();
        assert_eq!(snmp.status, ComplianceStatus::NonCompliant);
        assert!(!snmp.evidence.is_empty());
    }

    #[test]
    fn test_regex_check_multiline_case_insensitive() {
        let evaluator = ComplianceEvaluator::default();
        let config = "LINE CON 0\n EXEC-TIMEOUT 5 0\n";
        let results = evaluator.check_device("d1", config, Some("CIS"));
        let timeout = results
            .iter()
            .find(|r| r.details.contains("Console Timeout"))
            .unwrap();
        assert_eq!(timeout.status, ComplianceStatus::Compliant);
    }

    #[test]
    fn test_empty_config_not_assessed() {
        let evaluator = ComplianceEvaluator::default();
        let results = evaluator.check_device("d1", "", None);
        assert!(results
            .iter()
            .all(|r| r.status == ComplianceStatus::NotAssessed));
    }

    #[test]
    fn test_framework_filter() {
        let evaluator = ComplianceEvaluator::default();
        let results = evaluator.check_device("d1", "anything", Some("PCI-DSS"));
        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|r| r.framework == "PCI-DSS"));
    }

    #[test]
    fn test_audit_weak_config_scores_low() {
        let evaluator = ComplianceEvaluator::default();
        let configs: Vec<(String, String)> = demo_configs()
            .into_iter()
            .map(|(d, c)| (d.to_string(), c.to_string()))
            .collect();
        let report = evaluator.audit_devices(&configs, None);

        assert_eq!(report.summary.total_checks, 30);
        let weak = &report.devices["switch-access-1"];
        let hardened = &report.devices["router-core-1"];
        assert!(weak.score < hardened.score);
        assert!(weak
            .failures
            .iter()
            .any(|f| f.rule.contains("SNMP Community")));
    }
}
