//! Unified collector
//!
//! Lifecycle owner for all collection engines and the retained metric
//! buffer. `collect_all` gathers synchronously from the poll and HTTP
//! collectors; the flow and syslog listeners run their own ingest loops
//! between collections.

use chrono::{DateTime, Utc};
use tracing::info;

use netpulse_model::{Metric, MetricType};

use crate::flow::FlowReceiver;
use crate::poll::PollCollector;
use crate::rest::RestCollector;
use crate::syslog::SyslogListener;
use crate::CollectError;

/// Process-wide cap on retained metrics; trimming is a FIFO tail-cut.
pub const MAX_RETAINED_METRICS: usize = 10_000;

/// Filters for querying the retained buffer.
#[derive(Debug, Clone, Default)]
pub struct MetricQuery {
    pub device_id: Option<String>,
    pub metric_type: Option<MetricType>,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}

/// Orchestrates the collection engines into one pipeline.
pub struct UnifiedCollector {
    pub poll: PollCollector,
    pub flows: FlowReceiver,
    pub events: SyslogListener,
    pub http: RestCollector,
    started: bool,
    collection_count: usize,
    retained: Vec<Metric>,
}

impl UnifiedCollector {
    pub fn new(simulated: bool) -> Self {
        Self {
            poll: PollCollector::new(simulated),
            flows: FlowReceiver::new(2055, simulated),
            events: SyslogListener::new(514, simulated),
            http: RestCollector::new(simulated),
            started: false,
            collection_count: 0,
            retained: Vec::new(),
        }
    }

    /// Start the listening engines (flow + syslog).
    pub async fn start(&mut self) -> Result<(), CollectError> {
        self.flows.start().await?;
        self.events.start().await?;
        self.started = true;
        info!("unified collector started (all engines active)");
        Ok(())
    }

    /// Stop the listening engines.
    pub async fn stop(&mut self) {
        self.flows.stop().await;
        self.events.stop().await;
        self.started = false;
        info!("unified collector stopped");
    }

    /// Pull one batch from the on-demand collectors and retain it. The
    /// poll and HTTP pulls fan out concurrently and join before returning.
    pub async fn collect_all(&mut self) -> Vec<Metric> {
        let (mut metrics, http_metrics) =
            tokio::join!(self.poll.poll_all(), self.http.collect_all());
        metrics.extend(http_metrics);

        self.collection_count += 1;
        self.retained.extend(metrics.iter().cloned());
        if self.retained.len() > MAX_RETAINED_METRICS {
            let excess = self.retained.len() - MAX_RETAINED_METRICS;
            self.retained.drain(..excess);
        }
        metrics
    }

    /// Return the most recent retained metrics matching the query.
    pub fn metrics(&self, query: &MetricQuery) -> Vec<Metric> {
        let limit = if query.limit == 0 { 1000 } else { query.limit };
        let matching: Vec<&Metric> = self
            .retained
            .iter()
            .filter(|m| query.device_id.as_deref().map_or(true, |d| m.device_id == d))
            .filter(|m| query.metric_type.map_or(true, |t| m.metric_type == t))
            .filter(|m| query.since.map_or(true, |s| m.timestamp >= s))
            .collect();
        matching
            .into_iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.started
    }

    pub fn collection_count(&self) -> usize {
        self.collection_count
    }

    pub fn total_metrics(&self) -> usize {
        self.retained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollTarget;
    use netpulse_model::MetricSource;

    #[tokio::test]
    async fn test_start_stop() {
        let mut collector = UnifiedCollector::new(true);
        collector.start().await.unwrap();
        assert!(collector.is_running());
        collector.stop().await;
        assert!(!collector.is_running());
    }

    #[tokio::test]
    async fn test_collect_all() {
        let mut collector = UnifiedCollector::new(true);
        collector.poll.add_target(PollTarget::new("10.0.0.1"));

        let metrics = collector.collect_all().await;
        assert!(!metrics.is_empty());
        assert_eq!(collector.collection_count(), 1);
        assert_eq!(collector.total_metrics(), metrics.len());
    }

    #[tokio::test]
    async fn test_metric_filters() {
        let mut collector = UnifiedCollector::new(true);
        collector.poll.add_target(PollTarget::new("10.0.0.1"));
        collector.poll.add_target(PollTarget::new("10.0.0.2"));
        collector.collect_all().await;

        let by_device = collector.metrics(&MetricQuery {
            device_id: Some("10.0.0.1".to_string()),
            ..MetricQuery::default()
        });
        assert!(!by_device.is_empty());
        assert!(by_device.iter().all(|m| m.device_id == "10.0.0.1"));

        let by_type = collector.metrics(&MetricQuery {
            metric_type: Some(MetricType::Cpu),
            ..MetricQuery::default()
        });
        assert!(by_type.iter().all(|m| m.metric_type == MetricType::Cpu));
    }

    #[tokio::test]
    async fn test_retention_cap() {
        let mut collector = UnifiedCollector::new(true);
        for i in 0..MAX_RETAINED_METRICS + 500 {
            collector.retained.push(Metric::new(
                format!("d{}", i % 7),
                MetricType::Cpu,
                1.0,
                "percent",
                MetricSource::Snmp,
            ));
        }
        collector.poll.add_target(PollTarget::new("10.0.0.1"));
        collector.collect_all().await;
        assert_eq!(collector.total_metrics(), MAX_RETAINED_METRICS);
    }

    #[tokio::test]
    async fn test_limit_returns_most_recent() {
        let mut collector = UnifiedCollector::new(true);
        for i in 0..20 {
            let mut metric =
                Metric::new("d1", MetricType::Cpu, f64::from(i), "percent", MetricSource::Snmp);
            metric.timestamp = Utc::now();
            collector.retained.push(metric);
        }
        let recent = collector.metrics(&MetricQuery {
            limit: 5,
            ..MetricQuery::default()
        });
        assert_eq!(recent.len(), 5);
        assert_eq!(recent.last().map(|m| m.value), Some(19.0));
        assert_eq!(recent.first().map(|m| m.value), Some(15.0));
    }
}
