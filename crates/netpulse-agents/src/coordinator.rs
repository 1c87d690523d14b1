//! Coordinator
//!
//! Routes free-text queries to domain handlers from an ordered
//! `(pattern, handler)` table, keeps the conversation log, and runs the
//! named multi-step workflows. Routing is data-driven: the handler whose
//! patterns match the most times wins, and ties break toward the earlier
//! pattern.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use netpulse_model::{AgentMessage, AgentTask, TaskStatus};

use crate::compliance::ComplianceHandler;
use crate::diagnosis::DiagnosisHandler;
use crate::discovery::DiscoveryHandler;
use crate::forecast::ForecastHandler;
use crate::handler::AgentHandler;
use crate::knowledge::KnowledgeHandler;
use crate::remediation::RemediationHandler;
use crate::verification::VerificationHandler;

const CONVERSATION_LIMIT: usize = 200;

/// Intent patterns in evaluation order.
const ROUTING_PATTERNS: &[(&str, &str)] = &[
    (r"discover|scan|topology|neighbor|lldp|cdp", "discovery"),
    (r"why|diagnos|root.?cause|rca|anomal|flap|down|error|fail", "diagnosis"),
    (r"what.*(mean|is)|document|vendor|knowledge|explain|how.*(work|config)", "knowledge"),
    (r"complian|audit|nist|cis|pci|security.*(check|scan)|baseline", "compliance"),
    (r"predict|forecast|capacity|trend|when.*will|exhaustion|growth", "forecast"),
    (r"fix|remedia|change|config|propose|rollback|patch", "remediation"),
    (r"verif|check|regression|health|post.?change|validate", "verification"),
];

/// Snapshot of one handler's activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerStatus {
    pub name: String,
    pub description: String,
    pub tasks_completed: usize,
    pub messages: usize,
}

/// One recorded workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub handler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Routes queries and tasks to domain handlers and chains workflows.
pub struct Coordinator {
    handlers: HashMap<&'static str, Box<dyn AgentHandler>>,
    routes: Vec<(Regex, &'static str)>,
    conversation: Vec<AgentMessage>,
}

impl Coordinator {
    pub fn new(simulated: bool) -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn AgentHandler>> = HashMap::new();
        handlers.insert("discovery", Box::new(DiscoveryHandler::new(simulated)));
        handlers.insert("knowledge", Box::new(KnowledgeHandler::new(simulated)));
        handlers.insert("diagnosis", Box::new(DiagnosisHandler::new(simulated)));
        handlers.insert("compliance", Box::new(ComplianceHandler::new(simulated)));
        handlers.insert("forecast", Box::new(ForecastHandler::new(simulated)));
        handlers.insert("remediation", Box::new(RemediationHandler::new(simulated)));
        handlers.insert("verification", Box::new(VerificationHandler::new(simulated)));

        Self {
            handlers,
            routes: ROUTING_PATTERNS
                .iter()
                .filter_map(|(pattern, name)| Regex::new(pattern).ok().map(|re| (re, *name)))
                .collect(),
            conversation: Vec::new(),
        }
    }

    /// Pick the handler whose patterns match the message most often.
    /// Evaluation order breaks ties toward the earlier pattern.
    pub fn route(&self, message: &str) -> Option<&'static str> {
        let lowered = message.to_lowercase();
        let mut best: Option<&'static str> = None;
        let mut best_score = 0usize;

        for (re, handler) in &self.routes {
            let matches = re.find_iter(&lowered).count();
            if matches > best_score {
                best_score = matches;
                best = Some(handler);
            }
        }
        best
    }

    /// Route a chat message to the winning handler and record both sides of
    /// the exchange.
    pub async fn chat(&mut self, message: &str, context: Option<&Value>) -> String {
        self.push_conversation(AgentMessage::new("user", message));

        let routed = self.route(message);
        let (handler_name, response) = match routed {
            Some(name) => {
                info!(handler = name, "routing chat message");
                let handler = match self.handlers.get_mut(name) {
                    Some(h) => h,
                    None => return self.default_response(),
                };
                (name, format!("[{name}] {}", handler.chat(message, context).await))
            }
            None => ("coordinator", self.default_response()),
        };

        let mut reply = AgentMessage::new("assistant", &response);
        reply.handler = Some(handler_name.to_string());
        self.push_conversation(reply);
        response
    }

    /// Route a task to its target handler.
    pub async fn process(&mut self, task: AgentTask) -> AgentTask {
        let target = task
            .input_str("target_handler")
            .unwrap_or(&task.handler)
            .to_string();
        match self.handlers.get_mut(target.as_str()) {
            Some(handler) => handler.process(task).await,
            None => task.fail(format!("unknown handler: {target}")),
        }
    }

    /// Run a named workflow, chaining handlers sequentially. A failed step
    /// is recorded and the remaining steps still run.
    pub async fn run_workflow(&mut self, workflow: &str, input: &Value) -> Value {
        let mut steps: Vec<WorkflowStep> = Vec::new();

        match workflow {
            "diagnose_and_fix" => {
                let device_id = input.get("device_id").and_then(Value::as_str).unwrap_or("");
                let issue = input
                    .get("issue")
                    .and_then(Value::as_str)
                    .unwrap_or("generic");

                let diagnose = AgentTask::new("diagnosis", "diagnose", input.clone());
                steps.push(self.run_step("diagnosis", diagnose).await);

                let fix = AgentTask::new(
                    "remediation",
                    "propose_fix",
                    json!({"issue": issue, "device_id": device_id}),
                );
                steps.push(self.run_step("remediation", fix).await);

                let verify = AgentTask::new(
                    "verification",
                    "verify_change",
                    json!({"device_id": device_id, "change_type": issue}),
                );
                steps.push(self.run_step("verification", verify).await);
            }
            "full_audit" => {
                let subnet = input
                    .get("subnet")
                    .and_then(Value::as_str)
                    .unwrap_or("10.0.0.0/24");
                let scan = AgentTask::new("discovery", "scan_subnet", json!({"subnet": subnet}));
                steps.push(self.run_step("discovery", scan).await);

                let audit = AgentTask::new(
                    "compliance",
                    "audit_all",
                    json!({"framework": input.get("framework").cloned().unwrap_or(Value::Null)}),
                );
                steps.push(self.run_step("compliance", audit).await);
            }
            other => {
                return json!({
                    "workflow": other,
                    "status": "failed",
                    "error": format!("unknown workflow: {other}"),
                    "steps": [],
                });
            }
        }

        json!({
            "workflow": workflow,
            "status": "completed",
            "steps": steps,
        })
    }

    async fn run_step(&mut self, handler: &str, task: AgentTask) -> WorkflowStep {
        let finished = self.process(task).await;
        if finished.status == TaskStatus::Failed {
            WorkflowStep {
                handler: handler.to_string(),
                result: None,
                error: finished.error,
            }
        } else {
            WorkflowStep {
                handler: handler.to_string(),
                result: Some(finished.output),
                error: None,
            }
        }
    }

    /// Recent conversation, oldest first.
    pub fn conversation(&self, limit: usize) -> Vec<AgentMessage> {
        let limit = if limit == 0 { 50 } else { limit };
        self.conversation
            .iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    /// Activity snapshot for every handler.
    pub fn status(&self) -> HashMap<String, HandlerStatus> {
        self.handlers
            .iter()
            .map(|(name, handler)| {
                (
                    (*name).to_string(),
                    HandlerStatus {
                        name: handler.name().to_string(),
                        description: handler.description().to_string(),
                        tasks_completed: handler.log().task_count(),
                        messages: handler.log().message_count(),
                    },
                )
            })
            .collect()
    }

    fn push_conversation(&mut self, msg: AgentMessage) {
        self.conversation.push(msg);
        if self.conversation.len() > CONVERSATION_LIMIT {
            let excess = self.conversation.len() - CONVERSATION_LIMIT;
            self.conversation.drain(..excess);
        }
    }

    fn default_response(&self) -> String {
        "I route network operations queries. Try: 'Discover devices on 10.0.0.0/24', \
         'Why is BGP flapping on router-core-1?', 'Run a NIST 800-53 compliance audit', \
         'When will WAN bandwidth run out?', 'Fix the compliance failures', or \
         'Verify the last change'."
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_table() {
        let coordinator = Coordinator::new(true);
        assert_eq!(coordinator.route("discover devices on my network"), Some("discovery"));
        assert_eq!(
            coordinator.route("why is bgp flapping on router-core-1?"),
            Some("diagnosis")
        );
        assert_eq!(coordinator.route("run a nist compliance audit"), Some("compliance"));
        assert_eq!(coordinator.route("predict bandwidth capacity"), Some("forecast"));
        assert_eq!(coordinator.route("hello there"), None);
    }

    #[test]
    fn test_routing_tie_breaks_to_earlier_pattern() {
        let coordinator = Coordinator::new(true);
        // One match each for discovery ("scan") and verification ("check");
        // discovery is declared first.
        assert_eq!(coordinator.route("scan then check"), Some("discovery"));
    }

    #[tokio::test]
    async fn test_chat_routes_and_logs() {
        let mut coordinator = Coordinator::new(true);
        let response = coordinator.chat("Discover devices on my network", None).await;
        assert!(response.starts_with("[discovery]"));

        let history = coordinator.conversation(10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].role, "assistant");
    }

    #[tokio::test]
    async fn test_chat_default_response() {
        let mut coordinator = Coordinator::new(true);
        let response = coordinator.chat("hello", None).await;
        assert!(response.contains("route network operations queries"));
    }

    #[tokio::test]
    async fn test_process_routes_by_handler() {
        let mut coordinator = Coordinator::new(true);
        let task = AgentTask::new("discovery", "scan_subnet", json!({"subnet": "10.0.0.0/24"}));
        let result = coordinator.process(task).await;
        assert_eq!(result.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_process_unknown_handler_fails() {
        let mut coordinator = Coordinator::new(true);
        let task = AgentTask::new("nonexistent", "anything", Value::Null);
        let result = coordinator.process(task).await;
        assert_eq!(result.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_workflow_diagnose_and_fix() {
        let mut coordinator = Coordinator::new(true);
        let result = coordinator
            .run_workflow(
                "diagnose_and_fix",
                &json!({"device_id": "router-core-1", "issue": "bgp_flapping"}),
            )
            .await;

        assert_eq!(result["status"], "completed");
        let steps = result["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0]["handler"], "diagnosis");
        assert_eq!(steps[1]["handler"], "remediation");
        assert_eq!(steps[2]["handler"], "verification");

        let rollback = steps[1]["result"]["proposal"]["rollback_commands"]
            .as_array()
            .unwrap();
        assert!(!rollback.is_empty());
    }

    #[tokio::test]
    async fn test_workflow_full_audit() {
        let mut coordinator = Coordinator::new(true);
        let result = coordinator
            .run_workflow("full_audit", &json!({"subnet": "10.0.0.0/24"}))
            .await;
        assert_eq!(result["status"], "completed");
        let steps = result["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0]["handler"], "discovery");
        assert_eq!(steps[1]["handler"], "compliance");
    }

    #[tokio::test]
    async fn test_workflow_unknown_name() {
        let mut coordinator = Coordinator::new(true);
        let result = coordinator.run_workflow("health_check", &Value::Null).await;
        assert_eq!(result["status"], "failed");
    }

    #[tokio::test]
    async fn test_workflow_step_failure_does_not_abort() {
        let mut coordinator = Coordinator::new(true);
        // An empty issue still yields the generic proposal; force a failure
        // by routing a task kind the diagnosis handler does not implement.
        let task = AgentTask::new("diagnosis", "nonexistent_kind", Value::Null);
        let failed = coordinator.process(task).await;
        assert_eq!(failed.status, TaskStatus::Failed);

        // The workflow proper still completes all three steps.
        let result = coordinator
            .run_workflow("diagnose_and_fix", &json!({"device_id": "r1", "issue": "x"}))
            .await;
        assert_eq!(result["steps"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_status_lists_all_handlers() {
        let coordinator = Coordinator::new(true);
        let status = coordinator.status();
        for name in [
            "discovery",
            "knowledge",
            "diagnosis",
            "compliance",
            "forecast",
            "remediation",
            "verification",
        ] {
            assert!(status.contains_key(name), "missing handler {name}");
        }
    }
}
