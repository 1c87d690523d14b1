//! Compliance handler
//!
//! Runs the rule-driven compliance evaluator over captured device configs.
//! In simulated mode the config store is seeded with the demo baselines;
//! tasks may also pass a config inline.

use async_trait::async_trait;
use serde_json::{json, Value};

use netpulse_config::demo::demo_configs;
use netpulse_config::{ComplianceEvaluator, ConfigStore};
use netpulse_model::AgentTask;

use crate::handler::{AgentHandler, HandlerLog};

pub struct ComplianceHandler {
    log: HandlerLog,
    pub evaluator: ComplianceEvaluator,
    pub store: ConfigStore,
}

impl ComplianceHandler {
    pub fn new(simulated: bool) -> Self {
        let mut store = ConfigStore::new();
        if simulated {
            for (device_id, config) in demo_configs() {
                store.backup(device_id, config, "seed", device_id);
            }
        }
        Self {
            log: HandlerLog::new(),
            evaluator: ComplianceEvaluator::default(),
            store,
        }
    }

    fn config_for(&self, device_id: &str, inline: Option<&str>) -> String {
        if let Some(config) = inline {
            if !config.is_empty() {
                return config.to_string();
            }
        }
        self.store
            .latest(device_id)
            .map(|s| s.config_text.clone())
            .unwrap_or_default()
    }

    fn audit_all(&self, framework: Option<&str>) -> Value {
        let configs: Vec<(String, String)> = self
            .store
            .device_ids()
            .into_iter()
            .filter_map(|device_id| {
                self.store
                    .latest(&device_id)
                    .map(|s| (device_id.clone(), s.config_text.clone()))
            })
            .collect();
        let report = self.evaluator.audit_devices(&configs, framework);
        json!({
            "devices": report.devices,
            "summary": report.summary,
        })
    }
}

#[async_trait]
impl AgentHandler for ComplianceHandler {
    fn name(&self) -> &'static str {
        "compliance"
    }

    fn description(&self) -> &'static str {
        "Configuration compliance auditing"
    }

    fn log(&self) -> &HandlerLog {
        &self.log
    }

    async fn process(&mut self, mut task: AgentTask) -> AgentTask {
        task.status = netpulse_model::TaskStatus::Running;

        let outcome = match task.task_kind.as_str() {
            "audit" => {
                let device_id = task.input_str("device_id").unwrap_or_default().to_string();
                let framework = task.input_str("framework").map(String::from);
                let config = self.config_for(&device_id, task.input_str("config"));
                let results =
                    self.evaluator
                        .check_device(&device_id, &config, framework.as_deref());
                let compliant = results
                    .iter()
                    .filter(|r| r.status == netpulse_model::ComplianceStatus::Compliant)
                    .count();
                let non_compliant = results
                    .iter()
                    .filter(|r| r.status == netpulse_model::ComplianceStatus::NonCompliant)
                    .count();
                Ok(json!({
                    "device_id": device_id,
                    "results": results,
                    "compliant": compliant,
                    "non_compliant": non_compliant,
                    "total": results.len(),
                }))
            }
            "audit_all" => {
                let framework = task.input_str("framework").map(String::from);
                Ok(self.audit_all(framework.as_deref()))
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
        self.log.log_message("user", message, "compliance");
        let lowered = message.to_lowercase();

        let framework = if lowered.contains("nist") {
            Some("NIST-800-53")
        } else if lowered.contains("cis") {
            Some("CIS")
        } else if lowered.contains("pci") {
            Some("PCI-DSS")
        } else if lowered.contains("audit") || lowered.contains("compliance") {
            None
        } else {
            self.log.log_message(
                "assistant",
                "I audit device configurations against NIST 800-53, CIS, and PCI-DSS.",
                "compliance",
            );
            return "I audit device configurations against NIST 800-53, CIS, and PCI-DSS."
                .to_string();
        };

        let report = self.audit_all(framework);
        let summary = &report["summary"];
        let response = format!(
            "Compliance audit ({}): overall score {}%, {} of {} checks passed across {} devices.",
            framework.unwrap_or("all frameworks"),
            summary["overall_score"],
            summary["compliant"],
            summary["total_checks"],
            report["devices"].as_object().map_or(0, |d| d.len()),
        );

        self.log.log_message("assistant", &response, "compliance");
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_model::TaskStatus;

    #[tokio::test]
    async fn test_audit_all() {
        let mut handler = ComplianceHandler::new(true);
        let task = AgentTask::new("compliance", "audit_all", Value::Null);
        let result = handler.process(task).await;
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.output["summary"]["total_checks"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_weak_config_fails_snmp_rule() {
        let mut handler = ComplianceHandler::new(true);
        let task = AgentTask::new("compliance", "audit_all", Value::Null);
        let result = handler.process(task).await;

        let weak = &result.output["devices"]["switch-access-1"];
        let failures = weak["failures"].as_array().unwrap();
        assert!(failures
            .iter()
            .any(|f| f["rule"].as_str().unwrap().contains("SNMP Community")));
        assert!(weak["score"].as_f64().unwrap() < 100.0);
    }

    #[tokio::test]
    async fn test_audit_single_device() {
        let mut handler = ComplianceHandler::new(true);
        let task = AgentTask::new(
            "compliance",
            "audit",
            json!({"device_id": "router-core-1"}),
        );
        let result = handler.process(task).await;
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.output["total"].as_u64(), Some(10));
        assert!(result.output["compliant"].as_u64().unwrap() >= 8);
    }

    #[tokio::test]
    async fn test_audit_with_inline_config() {
        let mut handler = ComplianceHandler::new(true);
        let task = AgentTask::new(
            "compliance",
            "audit",
            json!({"device_id": "lab-1", "config": "ip ssh version 2\n", "framework": "NIST-800-53"}),
        );
        let result = handler.process(task).await;
        assert!(result.output["compliant"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_chat_audit() {
        let mut handler = ComplianceHandler::new(true);
        let response = handler.chat("Run a compliance audit", None).await;
        assert!(response.contains("overall score"));
    }
}
