//! NetPulse telemetry ingestion
//!
//! Four collectors share a common contract (start, stop, collect) and emit
//! metrics in the unified format:
//! - [`poll::PollCollector`] — SNMP-style device polling
//! - [`flow::FlowReceiver`] — NetFlow v5 ingest with aggregation queries
//! - [`syslog::SyslogListener`] — RFC 3164/5424 event ingest with classification
//! - [`rest::RestCollector`] — vendor HTTP APIs (Meraki, Arista, generic)
//!
//! [`unified::UnifiedCollector`] owns their lifecycle and the retained metric
//! buffer. Every collector runs in a simulated mode that generates
//! deterministic-shape synthetic data behind the same contract.

pub mod flow;
pub mod poll;
pub mod rest;
pub mod syslog;
pub mod unified;

use thiserror::Error;

/// Errors at the collection boundary.
///
/// Per-target failures are swallowed by the batch operations (`poll_all`,
/// `collect_all`) and logged; only API misuse surfaces to the caller.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("unknown poll target: {0}")]
    UnknownTarget(String),

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("live collection unavailable: {0}")]
    Unsupported(String),

    #[error("timed out collecting from {0}")]
    Timeout(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

pub use flow::{FlowReceiver, FlowSummary};
pub use poll::{PollCollector, PollProtocol, PollTarget};
pub use rest::{RestCollector, RestEndpoint};
pub use syslog::{SyslogListener, render_rfc5424};
pub use unified::{MetricQuery, UnifiedCollector};
