//! Knowledge handler
//!
//! Pluggable search capability over network operations knowledge. The
//! built-in backend is keyword-overlap scoring against a curated topic map;
//! a semantic-search backend can replace it behind the same task surface
//! (`query`, `ingest`).

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use netpulse_model::AgentTask;

use crate::handler::{AgentHandler, HandlerLog};

const CHUNK_WORDS: usize = 500;
const CHUNK_OVERLAP: usize = 50;
const MIN_CHUNK_WORDS: usize = 20;
const TOP_K: usize = 3;

struct Topic {
    key: &'static str,
    title: &'static str,
    content: &'static str,
    vendor: &'static str,
    tags: &'static [&'static str],
}

const TOPICS: &[Topic] = &[
    Topic {
        key: "bgp_flapping",
        title: "BGP Session Flapping",
        content: "Common causes: physical link instability, MTU mismatch resetting the TCP \
                  session, hold-timer expiry from lost keepalives, aggressive route policy \
                  churn, and memory exhaustion on full-table platforms.",
        vendor: "multi-vendor",
        tags: &["bgp", "flapping", "troubleshooting"],
    },
    Topic {
        key: "ospf_adjacency",
        title: "OSPF Adjacency Formation Failures",
        content: "Check for area ID mismatch, hello/dead timer mismatch, authentication \
                  mismatch, MTU mismatch in DBD exchange, network type mismatch, and stub \
                  flag mismatch.",
        vendor: "multi-vendor",
        tags: &["ospf", "adjacency", "troubleshooting"],
    },
    Topic {
        key: "high_cpu",
        title: "High CPU Utilization on Routers",
        content: "Usual suspects: process-switched traffic in the IP Input process, BGP \
                  scanner churn during convergence, excessive SNMP polling, and memory \
                  pressure. Start from the per-process CPU listing.",
        vendor: "cisco",
        tags: &["cpu", "cisco", "troubleshooting"],
    },
    Topic {
        key: "stp_topology_change",
        title: "Spanning Tree Topology Changes",
        content: "Frequent topology changes flush MAC tables and cause flooding; look for \
                  unstable links, missing portfast on host ports, unidirectional links, and \
                  unplanned root bridge elections.",
        vendor: "multi-vendor",
        tags: &["stp", "spanning-tree", "topology-change"],
    },
    Topic {
        key: "interface_errors",
        title: "Interface Error Counter Analysis",
        content: "CRC errors point at the physical layer, output drops at queue saturation \
                  during bursts, runts at collisions, giants at MTU mismatch, and late \
                  collisions at duplex mismatch.",
        vendor: "multi-vendor",
        tags: &["interface", "errors", "troubleshooting"],
    },
    Topic {
        key: "ha_failover",
        title: "Firewall HA Failover Triggers",
        content: "Failovers follow link-monitor or path-monitor trips, heartbeat loss on the \
                  HA links, or preemption by a higher-priority peer; verify session sync \
                  before failing back.",
        vendor: "palo_alto",
        tags: &["ha", "failover", "firewall"],
    },
];

struct DocumentChunk {
    chunk_id: String,
    text: String,
    source: String,
    position: usize,
}

pub struct KnowledgeHandler {
    log: HandlerLog,
    chunks: Vec<DocumentChunk>,
    word_re: Regex,
}

impl KnowledgeHandler {
    pub fn new(_simulated: bool) -> Self {
        Self {
            log: HandlerLog::new(),
            chunks: Vec::new(),
            word_re: Regex::new(r"\w+").unwrap(),
        }
    }

    fn words(&self, text: &str) -> HashSet<String> {
        self.word_re
            .find_iter(&text.to_lowercase())
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Keyword-overlap search over the topic map and any ingested chunks.
    fn search(&self, query: &str) -> Vec<Value> {
        let query_words = self.words(query);
        if query_words.is_empty() {
            return Vec::new();
        }
        let score_of = |doc_words: &HashSet<String>| {
            let overlap = query_words.intersection(doc_words).count();
            overlap as f64 / query_words.len() as f64
        };

        let mut scored: Vec<(f64, Value)> = TOPICS
            .iter()
            .filter_map(|topic| {
                let mut doc_words = self.words(topic.content);
                doc_words.extend(self.words(topic.title));
                doc_words.extend(topic.tags.iter().map(|t| (*t).to_string()));

                let score = score_of(&doc_words);
                (score > 0.1).then(|| {
                    (
                        score,
                        json!({
                            "key": topic.key,
                            "title": topic.title,
                            "content": topic.content,
                            "vendor": topic.vendor,
                            "tags": topic.tags,
                            "score": (score * 1000.0).round() / 1000.0,
                        }),
                    )
                })
            })
            .collect();

        for chunk in &self.chunks {
            let doc_words = self.words(&chunk.text);
            let score = score_of(&doc_words);
            if score > 0.1 {
                let preview: String = chunk.text.chars().take(200).collect();
                scored.push((
                    score,
                    json!({
                        "key": chunk.chunk_id,
                        "title": format!("{} (chunk at word {})", chunk.source, chunk.position),
                        "content": preview,
                        "vendor": "ingested",
                        "tags": ["ingested"],
                        "score": (score * 1000.0).round() / 1000.0,
                    }),
                ));
            }
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(TOP_K).map(|(_, doc)| doc).collect()
    }

    /// Split a document into overlapping word chunks; fragments under
    /// `MIN_CHUNK_WORDS` are dropped.
    fn chunk_document(&self, text: &str, source: &str) -> Vec<DocumentChunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut chunks = Vec::new();
        let step = CHUNK_WORDS - CHUNK_OVERLAP;

        let mut position = 0;
        while position < words.len() {
            let end = (position + CHUNK_WORDS).min(words.len());
            let slice = &words[position..end];
            if slice.len() >= MIN_CHUNK_WORDS {
                let text = slice.join(" ");
                let digest = hex::encode(Sha256::digest(text.as_bytes()));
                chunks.push(DocumentChunk {
                    chunk_id: digest[..12].to_string(),
                    text,
                    source: source.to_string(),
                    position,
                });
            }
            position += step;
        }
        chunks
    }
}

#[async_trait]
impl AgentHandler for KnowledgeHandler {
    fn name(&self) -> &'static str {
        "knowledge"
    }

    fn description(&self) -> &'static str {
        "Search over network operations knowledge"
    }

    fn log(&self) -> &HandlerLog {
        &self.log
    }

    async fn process(&mut self, mut task: AgentTask) -> AgentTask {
        task.status = netpulse_model::TaskStatus::Running;

        let outcome = match task.task_kind.as_str() {
            "query" => {
                let query = task.input_str("query").unwrap_or_default();
                let results = self.search(query);
                Ok(json!({
                    "query": query,
                    "sources": results.len(),
                    "results": results,
                }))
            }
            "ingest" => {
                let text = task.input_str("text").unwrap_or_default().to_string();
                let source = task.input_str("source").unwrap_or("manual").to_string();
                let chunks = self.chunk_document(&text, &source);
                let created = chunks.len();
                self.chunks.extend(chunks);
                Ok(json!({
                    "chunks_created": created,
                    "total_chunks": self.chunks.len(),
                }))
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
        self.log.log_message("user", message, "knowledge");

        let results = self.search(message);
        let response = match results.first() {
            Some(top) => {
                let mut text = format!(
                    "{}: {} (source: {} documentation)",
                    top["title"].as_str().unwrap_or_default(),
                    top["content"].as_str().unwrap_or_default(),
                    top["vendor"].as_str().unwrap_or_default(),
                );
                if results.len() > 1 {
                    let related: Vec<&str> = results[1..]
                        .iter()
                        .filter_map(|r| r["title"].as_str())
                        .collect();
                    text.push_str(&format!(" Related: {}.", related.join(", ")));
                }
                text
            }
            None => "No matching topic in the knowledge base. I cover BGP, OSPF, STP, \
                     interface errors, router CPU, and firewall HA."
                .to_string(),
        };

        self.log.log_message("assistant", &response, "knowledge");
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_model::TaskStatus;

    #[tokio::test]
    async fn test_query_bgp() {
        let mut handler = KnowledgeHandler::new(true);
        let response = handler.chat("Why is BGP flapping?", None).await;
        assert!(response.to_lowercase().contains("bgp"));
    }

    #[tokio::test]
    async fn test_query_task() {
        let mut handler = KnowledgeHandler::new(true);
        let task = AgentTask::new("knowledge", "query", json!({"query": "ospf adjacency"}));
        let result = handler.process(task).await;
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.output["sources"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_unmatched_query() {
        let mut handler = KnowledgeHandler::new(true);
        let response = handler.chat("zzzz qqqq xxxx", None).await;
        assert!(response.contains("No matching topic"));
    }

    #[tokio::test]
    async fn test_ingest_chunks() {
        let mut handler = KnowledgeHandler::new(true);
        let text = "network troubleshooting notes ".repeat(300);
        let task = AgentTask::new(
            "knowledge",
            "ingest",
            json!({"text": text, "source": "runbook"}),
        );
        let result = handler.process(task).await;
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.output["chunks_created"].as_u64().unwrap() > 1);
    }

    #[tokio::test]
    async fn test_ingested_chunks_searchable() {
        let mut handler = KnowledgeHandler::new(true);
        let text = "datacenter fabric underlay vxlan evpn rollout notes ".repeat(50);
        handler
            .process(AgentTask::new(
                "knowledge",
                "ingest",
                json!({"text": text, "source": "runbook"}),
            ))
            .await;
        let results = handler.search("vxlan evpn underlay");
        assert!(!results.is_empty());
        assert_eq!(results[0]["vendor"], "ingested");
    }

    #[test]
    fn test_tiny_fragment_dropped() {
        let handler = KnowledgeHandler::new(true);
        let chunks = handler.chunk_document("too short", "x");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunk_ids_stable() {
        let handler = KnowledgeHandler::new(true);
        let text = "word ".repeat(100);
        let a = handler.chunk_document(&text, "x");
        let b = handler.chunk_document(&text, "x");
        assert_eq!(a[0].chunk_id, b[0].chunk_id);
        assert_eq!(a[0].chunk_id.len(), 12);
    }
}
