//! NetPulse model layer
//!
//! Canonical value types shared by every NetPulse component. All telemetry,
//! inventory, alerting, configuration, and agent data is normalized to these
//! types, giving the poll, flow, syslog, and HTTP collectors one schema.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fresh entity identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ═══════════════════════════════════════════════════════════════════════════
// Enums
// ═══════════════════════════════════════════════════════════════════════════

/// Device category in the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Router,
    Switch,
    Firewall,
    LoadBalancer,
    WirelessController,
    AccessPoint,
    Server,
    Unknown,
}

/// Hardware vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceVendor {
    Cisco,
    Juniper,
    Arista,
    PaloAlto,
    Fortinet,
    Meraki,
    Unknown,
}

impl DeviceVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceVendor::Cisco => "cisco",
            DeviceVendor::Juniper => "juniper",
            DeviceVendor::Arista => "arista",
            DeviceVendor::PaloAlto => "palo_alto",
            DeviceVendor::Fortinet => "fortinet",
            DeviceVendor::Meraki => "meraki",
            DeviceVendor::Unknown => "unknown",
        }
    }
}

/// Unified metric taxonomy across all collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Cpu,
    Memory,
    BandwidthIn,
    BandwidthOut,
    ErrorRate,
    DiscardRate,
    Latency,
    Jitter,
    PacketLoss,
    Temperature,
    Power,
    FanSpeed,
    Uptime,
    BgpPrefixes,
    OspfNeighbors,
    Custom,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Cpu => "cpu",
            MetricType::Memory => "memory",
            MetricType::BandwidthIn => "bandwidth_in",
            MetricType::BandwidthOut => "bandwidth_out",
            MetricType::ErrorRate => "error_rate",
            MetricType::DiscardRate => "discard_rate",
            MetricType::Latency => "latency",
            MetricType::Jitter => "jitter",
            MetricType::PacketLoss => "packet_loss",
            MetricType::Temperature => "temperature",
            MetricType::Power => "power",
            MetricType::FanSpeed => "fan_speed",
            MetricType::Uptime => "uptime",
            MetricType::BgpPrefixes => "bgp_prefixes",
            MetricType::OspfNeighbors => "ospf_neighbors",
            MetricType::Custom => "custom",
        }
    }

    /// Parse the wire name back into the enum (inverse of [`as_str`]).
    ///
    /// [`as_str`]: MetricType::as_str
    pub fn parse(s: &str) -> Option<Self> {
        let t = match s {
            "cpu" => MetricType::Cpu,
            "memory" => MetricType::Memory,
            "bandwidth_in" => MetricType::BandwidthIn,
            "bandwidth_out" => MetricType::BandwidthOut,
            "error_rate" => MetricType::ErrorRate,
            "discard_rate" => MetricType::DiscardRate,
            "latency" => MetricType::Latency,
            "jitter" => MetricType::Jitter,
            "packet_loss" => MetricType::PacketLoss,
            "temperature" => MetricType::Temperature,
            "power" => MetricType::Power,
            "fan_speed" => MetricType::FanSpeed,
            "uptime" => MetricType::Uptime,
            "bgp_prefixes" => MetricType::BgpPrefixes,
            "ospf_neighbors" => MetricType::OspfNeighbors,
            "custom" => MetricType::Custom,
            _ => return None,
        };
        Some(t)
    }
}

/// Alert severity. Declaration order defines escalation order, so the derived
/// `Ord` gives `Info < Warning < Critical < Emergency`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
            AlertSeverity::Emergency => "emergency",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(AlertSeverity::Info),
            "warning" => Some(AlertSeverity::Warning),
            "critical" => Some(AlertSeverity::Critical),
            "emergency" => Some(AlertSeverity::Emergency),
            _ => None,
        }
    }
}

/// Alert lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Active,
    Acknowledged,
    Resolved,
    Suppressed,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Active => "active",
            AlertState::Acknowledged => "acknowledged",
            AlertState::Resolved => "resolved",
            AlertState::Suppressed => "suppressed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AlertState::Active),
            "acknowledged" => Some(AlertState::Acknowledged),
            "resolved" => Some(AlertState::Resolved),
            "suppressed" => Some(AlertState::Suppressed),
            _ => None,
        }
    }
}

/// Which collector produced a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSource {
    Snmp,
    Netflow,
    Syslog,
    RestApi,
}

/// Operational status of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceStatus {
    Up,
    Down,
    AdminDown,
    Unknown,
}

/// Outcome of a single compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    NotAssessed,
    Exempted,
}

/// Kind of pattern a compliance rule applies to a captured config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Contains,
    NotContains,
    Regex,
}

/// Direction of an SLA target comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaComparison {
    /// Current value must stay below the target.
    Lt,
    /// Current value must stay above the target.
    Gt,
}

/// Agent task lifecycle. `Completed` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Blast-radius style risk classification for proposed changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Inventory
// ═══════════════════════════════════════════════════════════════════════════

/// Network interface on a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub index: u32,
    pub description: String,
    pub speed_mbps: u64,
    pub admin_status: InterfaceStatus,
    pub oper_status: InterfaceStatus,
    pub ip_address: Option<String>,
    pub subnet_mask: Option<String>,
    pub mac_address: Option<String>,
    pub vlan_id: Option<u16>,
    pub mtu: u32,
    pub in_octets: u64,
    pub out_octets: u64,
    pub in_errors: u64,
    pub out_errors: u64,
    pub in_discards: u64,
    pub out_discards: u64,
}

impl Default for Interface {
    fn default() -> Self {
        Self {
            name: String::new(),
            index: 0,
            description: String::new(),
            speed_mbps: 0,
            admin_status: InterfaceStatus::Unknown,
            oper_status: InterfaceStatus::Unknown,
            ip_address: None,
            subnet_mask: None,
            mac_address: None,
            vlan_id: None,
            mtu: 1500,
            in_octets: 0,
            out_octets: 0,
            in_errors: 0,
            out_errors: 0,
            in_discards: 0,
            out_discards: 0,
        }
    }
}

/// Network device in the inventory.
///
/// The identifier is immutable once assigned; hostname + address uniquely
/// identify a device within a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub hostname: String,
    pub ip_address: String,
    pub device_type: DeviceType,
    pub vendor: DeviceVendor,
    pub model: String,
    pub os_version: String,
    pub serial_number: String,
    pub location: String,
    pub site: String,
    pub snmp_community: Option<String>,
    pub interfaces: Vec<Interface>,
    pub tags: HashMap<String, String>,
    pub discovered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_managed: bool,
    pub uptime_seconds: u64,
    pub sys_description: String,
}

impl Device {
    pub fn new(hostname: impl Into<String>, ip_address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            hostname: hostname.into(),
            ip_address: ip_address.into(),
            device_type: DeviceType::Unknown,
            vendor: DeviceVendor::Unknown,
            model: String::new(),
            os_version: String::new(),
            serial_number: String::new(),
            location: String::new(),
            site: String::new(),
            snmp_community: None,
            interfaces: Vec::new(),
            tags: HashMap::new(),
            discovered_at: now,
            last_seen: now,
            is_managed: true,
            uptime_seconds: 0,
            sys_description: String::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Telemetry
// ═══════════════════════════════════════════════════════════════════════════

/// Unified metric emitted by every collector. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    pub device_id: String,
    pub device_hostname: String,
    pub interface_name: Option<String>,
    pub metric_type: MetricType,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub source: MetricSource,
    pub tags: HashMap<String, String>,
}

impl Metric {
    pub fn new(
        device_id: impl Into<String>,
        metric_type: MetricType,
        value: f64,
        unit: impl Into<String>,
        source: MetricSource,
    ) -> Self {
        Self {
            id: new_id(),
            device_id: device_id.into(),
            device_hostname: String::new(),
            interface_name: None,
            metric_type,
            value,
            unit: unit.into(),
            timestamp: Utc::now(),
            source,
            tags: HashMap::new(),
        }
    }

    /// Per-series key used by the rolling-window engines.
    pub fn series_key(&self) -> String {
        format!("{}:{}", self.device_id, self.metric_type.as_str())
    }
}

/// Threshold tiers for one metric type. Comparisons are `>=`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub metric_type: MetricType,
    pub warning: f64,
    pub critical: f64,
    pub emergency: Option<f64>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Alerts
// ═══════════════════════════════════════════════════════════════════════════

/// Alert raised from a threshold violation or anomaly detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub device_id: String,
    pub device_hostname: String,
    pub interface_name: Option<String>,
    pub severity: AlertSeverity,
    pub state: AlertState,
    pub title: String,
    pub description: String,
    pub metric_type: Option<MetricType>,
    pub metric_value: Option<f64>,
    pub threshold_value: Option<f64>,
    pub source: String,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub tags: HashMap<String, String>,
}

impl Alert {
    pub fn new(
        device_id: impl Into<String>,
        severity: AlertSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            device_id: device_id.into(),
            device_hostname: String::new(),
            interface_name: None,
            severity,
            state: AlertState::Active,
            title: title.into(),
            description: description.into(),
            metric_type: None,
            metric_value: None,
            threshold_value: None,
            source: "threshold".to_string(),
            correlation_id: None,
            created_at: Utc::now(),
            acknowledged_at: None,
            resolved_at: None,
            acknowledged_by: None,
            tags: HashMap::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Topology
// ═══════════════════════════════════════════════════════════════════════════

/// Neighbor relationship discovered via LLDP/CDP/BGP/OSPF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neighbor {
    pub local_device_id: String,
    pub local_interface: String,
    pub remote_device_id: String,
    pub remote_interface: String,
    pub remote_hostname: String,
    pub remote_ip: Option<String>,
    pub protocol: String,
    pub discovered_at: DateTime<Utc>,
}

impl Neighbor {
    pub fn new(
        local_device_id: impl Into<String>,
        local_interface: impl Into<String>,
        remote_device_id: impl Into<String>,
        remote_interface: impl Into<String>,
    ) -> Self {
        Self {
            local_device_id: local_device_id.into(),
            local_interface: local_interface.into(),
            remote_device_id: remote_device_id.into(),
            remote_interface: remote_interface.into(),
            remote_hostname: String::new(),
            remote_ip: None,
            protocol: "lldp".to_string(),
            discovered_at: Utc::now(),
        }
    }
}

/// Undirected link between two devices. A canonicalized endpoint pair is
/// stored exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyLink {
    pub source_device_id: String,
    pub source_interface: String,
    pub target_device_id: String,
    pub target_interface: String,
    pub link_speed_mbps: u64,
    pub protocol: String,
}

/// Materialized topology graph for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub devices: Vec<Device>,
    pub links: Vec<TopologyLink>,
    pub generated_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Flows & syslog
// ═══════════════════════════════════════════════════════════════════════════

/// Single NetFlow/IPFIX flow record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    pub src_addr: String,
    pub dst_addr: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    pub bytes: u64,
    pub packets: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub src_as: u32,
    pub dst_as: u32,
    pub input_interface: u32,
    pub output_interface: u32,
    pub tcp_flags: u8,
    pub tos: u8,
    pub exporter_ip: String,
}

/// Parsed syslog message. `structured_data` carries the classifier category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyslogMessage {
    pub id: String,
    pub device_hostname: String,
    pub source_ip: String,
    pub facility: u8,
    pub severity: u8,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub program: String,
    pub pid: Option<u32>,
    pub structured_data: HashMap<String, String>,
}

impl SyslogMessage {
    pub fn new(source_ip: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            device_hostname: String::new(),
            source_ip: source_ip.into(),
            facility: 1,
            severity: 6,
            timestamp: Utc::now(),
            message: message.into(),
            program: String::new(),
            pid: None,
            structured_data: HashMap::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Configuration & compliance
// ═══════════════════════════════════════════════════════════════════════════

/// Content-addressed snapshot of a device's running configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub id: String,
    pub device_id: String,
    pub device_hostname: String,
    pub config_text: String,
    pub config_hash: String,
    pub captured_at: DateTime<Utc>,
    pub source: String,
}

/// Diff between two configuration snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDiff {
    pub device_id: String,
    pub before_snapshot_id: String,
    pub after_snapshot_id: String,
    pub diff_text: String,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub lines_changed: usize,
    pub generated_at: DateTime<Utc>,
}

/// Single compliance check rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub framework: String,
    pub control_id: String,
    pub severity: AlertSeverity,
    pub check: CheckKind,
    pub pattern: String,
    pub remediation: String,
}

/// Result of one rule applied to one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub rule_id: String,
    pub device_id: String,
    pub device_hostname: String,
    pub status: ComplianceStatus,
    pub framework: String,
    pub control_id: String,
    pub details: String,
    pub evidence: String,
    pub checked_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════
// SLA
// ═══════════════════════════════════════════════════════════════════════════

/// SLA target definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaTarget {
    pub name: String,
    pub description: String,
    pub metric_type: MetricType,
    pub target_value: f64,
    pub comparison: SlaComparison,
    pub measurement_window: String,
    pub device_filter: Option<String>,
}

/// SLA compliance report for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaReport {
    pub target: SlaTarget,
    pub current_value: f64,
    pub is_met: bool,
    pub compliance_percentage: f64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub violations: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// Agent envelopes
// ═══════════════════════════════════════════════════════════════════════════

/// Message in a handler conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: String,
    pub content: String,
    pub handler: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            handler: None,
            timestamp: Utc::now(),
        }
    }
}

/// Task envelope dispatched to a domain handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub handler: String,
    pub task_kind: String,
    pub description: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl AgentTask {
    pub fn new(
        handler: impl Into<String>,
        task_kind: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id: new_id(),
            handler: handler.into(),
            task_kind: task_kind.into(),
            description: String::new(),
            input,
            output: serde_json::Value::Null,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Read a string field from the input mapping.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(serde_json::Value::as_str)
    }

    /// Read a float field from the input mapping.
    pub fn input_f64(&self, key: &str) -> Option<f64> {
        self.input.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Mark the task completed with its output mapping.
    pub fn complete(mut self, output: serde_json::Value) -> Self {
        self.status = TaskStatus::Completed;
        self.output = output;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Mark the task failed with an explanatory error.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        self
    }
}

/// Proposed configuration change awaiting human approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationProposal {
    pub id: String,
    pub device_id: String,
    pub device_hostname: String,
    pub title: String,
    pub description: String,
    pub config_commands: Vec<String>,
    pub rollback_commands: Vec<String>,
    pub risk_level: RiskLevel,
    pub approved: bool,
    pub approved_by: Option<String>,
    pub executed: bool,
    pub created_at: DateTime<Utc>,
}

impl RemediationProposal {
    pub fn new(
        device_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let device_id = device_id.into();
        Self {
            id: new_id(),
            device_hostname: device_id.clone(),
            device_id,
            title: title.into(),
            description: description.into(),
            config_commands: Vec::new(),
            rollback_commands: Vec::new(),
            risk_level: RiskLevel::Low,
            approved: false,
            approved_by: None,
            executed: false,
            created_at: Utc::now(),
        }
    }
}
