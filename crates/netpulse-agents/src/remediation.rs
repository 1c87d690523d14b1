//! Remediation handler
//!
//! Generates configuration-change proposals for known issues. Every
//! proposal carries an ordered rollback plan and requires human approval;
//! this handler never pushes configuration itself.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use netpulse_model::{AgentTask, RemediationProposal, RiskLevel};

use crate::handler::{AgentHandler, HandlerLog};

pub struct RemediationHandler {
    log: HandlerLog,
    proposals: Vec<RemediationProposal>,
}

impl RemediationHandler {
    pub fn new(_simulated: bool) -> Self {
        Self {
            log: HandlerLog::new(),
            proposals: Vec::new(),
        }
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }

    pub fn pending_count(&self) -> usize {
        self.proposals.iter().filter(|p| !p.approved).count()
    }

    fn generate_proposal(issue: &str, device_id: &str) -> RemediationProposal {
        match issue {
            "bgp_flapping" => {
                let mut proposal = RemediationProposal::new(
                    device_id,
                    "Stabilize BGP session with dampening and BFD",
                    "BGP flapping detected from physical-layer instability. Dampening limits \
                     route churn; BFD gives sub-second failure detection.",
                );
                proposal.config_commands = vec![
                    "router bgp 65001".to_string(),
                    " address-family ipv4 unicast".to_string(),
                    "  bgp dampening 15 750 2000 60".to_string(),
                    " neighbor 10.0.0.2 bfd".to_string(),
                    " neighbor 10.0.0.2 fall-over bfd".to_string(),
                ];
                proposal.rollback_commands = vec![
                    "router bgp 65001".to_string(),
                    " address-family ipv4 unicast".to_string(),
                    "  no bgp dampening".to_string(),
                    " no neighbor 10.0.0.2 bfd".to_string(),
                    " no neighbor 10.0.0.2 fall-over bfd".to_string(),
                ];
                proposal.risk_level = RiskLevel::Medium;
                proposal
            }
            "compliance_failure" => {
                let mut proposal = RemediationProposal::new(
                    device_id,
                    "Harden configuration to baseline",
                    "Compliance failures detected: default SNMP community, missing password \
                     encryption, missing console timeout, missing VTY access control.",
                );
                proposal.config_commands = vec![
                    "service password-encryption".to_string(),
                    "no snmp-server community public".to_string(),
                    "snmp-server community N3tOps$ecure RO".to_string(),
                    "line con 0".to_string(),
                    " exec-timeout 5 0".to_string(),
                    "line vty 0 15".to_string(),
                    " access-class ACL_VTY in".to_string(),
                    " transport input ssh".to_string(),
                    "aaa new-model".to_string(),
                    "aaa authentication login default local".to_string(),
                ];
                proposal.rollback_commands = vec![
                    "no service password-encryption".to_string(),
                    "snmp-server community public RO".to_string(),
                    "no snmp-server community N3tOps$ecure".to_string(),
                    "line con 0".to_string(),
                    " no exec-timeout".to_string(),
                    "line vty 0 15".to_string(),
                    " no access-class ACL_VTY in".to_string(),
                    " transport input ssh telnet".to_string(),
                ];
                proposal.risk_level = RiskLevel::Low;
                proposal
            }
            other => {
                let mut proposal = RemediationProposal::new(
                    device_id,
                    format!("Remediation for {other}"),
                    format!("No automated fix catalogued for {other}; manual review required."),
                );
                proposal.config_commands = vec!["! No automated fix available".to_string()];
                proposal.rollback_commands = vec!["! No rollback needed".to_string()];
                proposal
            }
        }
    }

    /// Approve a proposal. Approving an already-approved proposal is
    /// idempotent.
    fn approve(&mut self, proposal_id: &str, approved_by: &str) -> Value {
        for proposal in &mut self.proposals {
            if proposal.id == proposal_id {
                if !proposal.approved {
                    proposal.approved = true;
                    proposal.approved_by = Some(approved_by.to_string());
                    info!(proposal = proposal_id, by = approved_by, "proposal approved");
                }
                return json!({
                    "status": "approved",
                    "proposal_id": proposal_id,
                    "approved_by": proposal.approved_by,
                    "message": format!("Proposal '{}' approved", proposal.title),
                });
            }
        }
        json!({
            "status": "not_found",
            "message": format!("Proposal {proposal_id} not found"),
        })
    }
}

#[async_trait]
impl AgentHandler for RemediationHandler {
    fn name(&self) -> &'static str {
        "remediation"
    }

    fn description(&self) -> &'static str {
        "Configuration change proposals with approval gates"
    }

    fn log(&self) -> &HandlerLog {
        &self.log
    }

    async fn process(&mut self, mut task: AgentTask) -> AgentTask {
        task.status = netpulse_model::TaskStatus::Running;

        let outcome = match task.task_kind.as_str() {
            "propose_fix" => {
                let issue = task.input_str("issue").unwrap_or_default().to_string();
                let device_id = task.input_str("device_id").unwrap_or_default().to_string();
                let proposal = Self::generate_proposal(&issue, &device_id);
                let payload = json!({
                    "proposal": proposal,
                    "status": "awaiting_approval",
                });
                self.proposals.push(proposal);
                Ok(payload)
            }
            "approve" => {
                let proposal_id = task.input_str("proposal_id").unwrap_or_default().to_string();
                let approved_by = task.input_str("approved_by").unwrap_or("admin").to_string();
                Ok(self.approve(&proposal_id, &approved_by))
            }
            "list_proposals" => Ok(json!({
                "proposals": self.proposals,
                "pending": self.pending_count(),
            })),
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
        self.log.log_message("user", message, "remediation");
        let lowered = message.to_lowercase();

        let response = if lowered.contains("fix") && lowered.contains("bgp") {
            let proposal = Self::generate_proposal("bgp_flapping", "router-core-1");
            let summary = format!(
                "Proposed: {} on {} ({} risk, {} commands, rollback ready). Awaiting approval.",
                proposal.title,
                proposal.device_hostname,
                proposal.risk_level.as_str(),
                proposal.config_commands.len(),
            );
            self.proposals.push(proposal);
            summary
        } else if lowered.contains("fix") && lowered.contains("compliance") {
            let proposal = Self::generate_proposal("compliance_failure", "switch-access-1");
            let summary = format!(
                "Proposed: {} on {} ({} risk). Awaiting approval.",
                proposal.title,
                proposal.device_hostname,
                proposal.risk_level.as_str(),
            );
            self.proposals.push(proposal);
            summary
        } else if lowered.contains("pending") || lowered.contains("proposal") {
            let pending = self.pending_count();
            if pending == 0 {
                "No pending remediation proposals.".to_string()
            } else {
                format!("{pending} proposals awaiting approval.")
            }
        } else {
            "I generate configuration change proposals with rollback plans; every change \
             needs human approval before execution."
                .to_string()
        };

        self.log.log_message("assistant", &response, "remediation");
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_model::TaskStatus;

    #[tokio::test]
    async fn test_propose_fix_has_rollback() {
        let mut handler = RemediationHandler::new(true);
        let task = AgentTask::new(
            "remediation",
            "propose_fix",
            json!({"issue": "bgp_flapping", "device_id": "router-core-1"}),
        );
        let result = handler.process(task).await;
        assert_eq!(result.status, TaskStatus::Completed);
        let rollback = result.output["proposal"]["rollback_commands"].as_array().unwrap();
        assert!(!rollback.is_empty());
        assert_eq!(handler.proposal_count(), 1);
    }

    #[tokio::test]
    async fn test_approve_is_idempotent() {
        let mut handler = RemediationHandler::new(true);
        let result = handler
            .process(AgentTask::new(
                "remediation",
                "propose_fix",
                json!({"issue": "bgp_flapping", "device_id": "r1"}),
            ))
            .await;
        let proposal_id = result.output["proposal"]["id"].as_str().unwrap().to_string();

        let first = handler
            .process(AgentTask::new(
                "remediation",
                "approve",
                json!({"proposal_id": proposal_id, "approved_by": "alice"}),
            ))
            .await;
        assert_eq!(first.output["status"], "approved");

        // A second approval does not change the approver.
        let second = handler
            .process(AgentTask::new(
                "remediation",
                "approve",
                json!({"proposal_id": proposal_id, "approved_by": "bob"}),
            ))
            .await;
        assert_eq!(second.output["status"], "approved");
        assert_eq!(second.output["approved_by"], "alice");
        assert_eq!(handler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_approve_unknown_proposal() {
        let mut handler = RemediationHandler::new(true);
        let result = handler
            .process(AgentTask::new(
                "remediation",
                "approve",
                json!({"proposal_id": "nope"}),
            ))
            .await;
        assert_eq!(result.output["status"], "not_found");
    }

    #[tokio::test]
    async fn test_list_proposals() {
        let mut handler = RemediationHandler::new(true);
        handler
            .process(AgentTask::new(
                "remediation",
                "propose_fix",
                json!({"issue": "anything", "device_id": "r1"}),
            ))
            .await;
        let result = handler
            .process(AgentTask::new("remediation", "list_proposals", Value::Null))
            .await;
        assert_eq!(result.output["pending"], 1);
    }

    #[test]
    fn test_generic_issue_fallback() {
        let proposal = RemediationHandler::generate_proposal("mtu_mismatch", "r1");
        assert!(proposal.title.contains("mtu_mismatch"));
        assert!(!proposal.rollback_commands.is_empty());
    }
}
