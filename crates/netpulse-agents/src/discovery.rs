//! Discovery handler
//!
//! Scans subnets, maintains the device inventory, and answers topology
//! queries (neighbors, paths, blast radius).

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::error;

use netpulse_model::AgentTask;
use netpulse_topology::{seed_demo_topology, NetworkScanner, TopologyGraph};

use crate::handler::{AgentHandler, HandlerLog};

pub struct DiscoveryHandler {
    log: HandlerLog,
    pub scanner: NetworkScanner,
    pub topology: TopologyGraph,
}

impl DiscoveryHandler {
    pub fn new(simulated: bool) -> Self {
        Self {
            log: HandlerLog::new(),
            scanner: NetworkScanner::new(simulated),
            topology: TopologyGraph::new(),
        }
    }

    async fn scan(&mut self, subnet: &str, community: &str) -> Result<Value, String> {
        let devices = self
            .scanner
            .scan_subnet(subnet, community)
            .await
            .map_err(|e| e.to_string())?;
        self.topology.add_devices(devices.clone());
        Ok(json!({
            "devices_found": devices.len(),
            "devices": devices,
        }))
    }

    async fn build_topology(&mut self) -> Result<Value, String> {
        if self.topology.device_count() == 0 {
            let devices = self
                .scanner
                .scan_subnet("10.0.0.0/24", "public")
                .await
                .map_err(|e| e.to_string())?;
            seed_demo_topology(&mut self.topology, &devices);
        } else {
            let devices: Vec<_> = self.topology.devices().into_iter().cloned().collect();
            seed_demo_topology(&mut self.topology, &devices);
        }
        let snapshot = self.topology.build_topology();
        Ok(json!({
            "device_count": snapshot.devices.len(),
            "link_count": snapshot.links.len(),
            "topology": self.topology.to_value(),
        }))
    }
}

#[async_trait]
impl AgentHandler for DiscoveryHandler {
    fn name(&self) -> &'static str {
        "discovery"
    }

    fn description(&self) -> &'static str {
        "Network discovery and topology mapping"
    }

    fn log(&self) -> &HandlerLog {
        &self.log
    }

    async fn process(&mut self, mut task: AgentTask) -> AgentTask {
        task.status = netpulse_model::TaskStatus::Running;

        let outcome = match task.task_kind.as_str() {
            "scan_subnet" => {
                let subnet = task.input_str("subnet").unwrap_or("10.0.0.0/24").to_string();
                let community = task.input_str("community").unwrap_or("public").to_string();
                self.scan(&subnet, &community).await
            }
            "build_topology" => self.build_topology().await,
            "get_neighbors" => {
                let device_id = task.input_str("device_id").unwrap_or_default();
                Ok(json!({
                    "device_id": device_id,
                    "neighbors": self.topology.neighbors(device_id),
                }))
            }
            "blast_radius" => {
                let device_id = task.input_str("device_id").unwrap_or_default();
                let max_hops = task
                    .input
                    .get("max_hops")
                    .and_then(Value::as_u64)
                    .unwrap_or(2) as usize;
                let affected = self.topology.blast_radius(device_id, max_hops);
                let mut affected: Vec<String> = affected.into_iter().collect();
                affected.sort();
                Ok(json!({
                    "device_id": device_id,
                    "affected_devices": affected,
                    "count": affected.len(),
                }))
            }
            other => Err(format!("unknown task kind: {other}")),
        };

        let finished = match outcome {
            Ok(output) => task.complete(output),
            Err(e) => {
                error!(handler = "discovery", "task failed: {e}");
                task.fail(e)
            }
        };
        self.log.record_task(&finished);
        finished
    }

    async fn chat(&mut self, message: &str, _context: Option<&Value>) -> String {
        self.log.log_message("user", message, "discovery");
        let lowered = message.to_lowercase();

        let response = if lowered.contains("discover") || lowered.contains("scan") {
            match self.scan("10.0.0.0/24", "public").await {
                Ok(result) => {
                    let count = result["devices_found"].as_u64().unwrap_or(0);
                    format!(
                        "Discovered {count} devices; the inventory now holds {} and the \
                         topology tracks {} neighbor relations.",
                        self.scanner.discovered_count(),
                        self.topology.neighbor_count(),
                    )
                }
                Err(e) => format!("Discovery failed: {e}"),
            }
        } else if lowered.contains("topology") {
            match self.build_topology().await {
                Ok(result) => {
                    let critical = self.topology.critical_devices();
                    let top = critical
                        .iter()
                        .take(3)
                        .map(|c| {
                            format!(
                                "{} ({} links, blast radius {})",
                                c.hostname, c.neighbor_count, c.blast_radius
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(
                        "Topology: {} devices, {} links. Most connected: {top}.",
                        result["device_count"], result["link_count"],
                    )
                }
                Err(e) => format!("Topology build failed: {e}"),
            }
        } else if lowered.contains("device") {
            let count = self.scanner.discovered_count();
            if count > 0 {
                format!("{count} devices in inventory.")
            } else {
                "No devices discovered yet. Run a subnet scan first.".to_string()
            }
        } else {
            "I handle network discovery: subnet scans, topology mapping, neighbor lookups, \
             and blast-radius queries."
                .to_string()
        };

        self.log.log_message("assistant", &response, "discovery");
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_model::TaskStatus;

    #[tokio::test]
    async fn test_scan_subnet_task() {
        let mut handler = DiscoveryHandler::new(true);
        let task = AgentTask::new("discovery", "scan_subnet", json!({"subnet": "10.0.0.0/24"}));
        let result = handler.process(task).await;
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.output["devices_found"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_blast_radius_task() {
        let mut handler = DiscoveryHandler::new(true);
        handler
            .process(AgentTask::new("discovery", "build_topology", Value::Null))
            .await;
        let core = handler
            .topology
            .device_by_hostname("router-core-1")
            .unwrap()
            .id
            .clone();

        let task = AgentTask::new("discovery", "blast_radius", json!({"device_id": core}));
        let result = handler.process(task).await;
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.output["count"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_unknown_task_kind_fails() {
        let mut handler = DiscoveryHandler::new(true);
        let result = handler
            .process(AgentTask::new("discovery", "bogus", Value::Null))
            .await;
        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.error.unwrap().contains("unknown task kind"));
    }

    #[tokio::test]
    async fn test_chat_discover() {
        let mut handler = DiscoveryHandler::new(true);
        let response = handler.chat("Discover devices on my network", None).await;
        assert!(response.to_lowercase().contains("discovered"));
        assert_eq!(handler.log().message_count(), 2);
    }
}
