//! NetPulse detection engines
//!
//! - [`health::HealthEngine`] — threshold evaluation over the metric stream
//!   with per-device rolling windows and trend classification
//! - [`alerting::AlertManager`] — alert dedup, state machine, suppression
//! - [`sla::SlaEvaluator`] — rolling SLA target evaluation

pub mod alerting;
pub mod health;
pub mod sla;

pub use alerting::{AlertManager, AlertQuery, SuppressionRule};
pub use health::{default_thresholds, DeviceHealth, HealthEngine, MetricStats};
pub use sla::{default_sla_targets, SlaEvaluator};
