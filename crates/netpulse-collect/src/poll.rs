//! Device poller
//!
//! Polls registered targets for CPU, memory, per-interface bandwidth, error
//! rate, and temperature. In simulated mode each target keeps last-value
//! memory so successive polls produce continuous traces (baseline drift with
//! an occasional spike) instead of white noise.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures_util::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use netpulse_model::{
    Device, DeviceType, DeviceVendor, Interface, InterfaceStatus, Metric, MetricSource,
    MetricType,
};

use crate::CollectError;

/// Poll protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollProtocol {
    V2c,
    V3,
}

/// Polling target configuration, keyed by address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollTarget {
    pub host: String,
    pub port: u16,
    pub community: String,
    pub version: PollProtocol,
    pub username: Option<String>,
    pub auth_password: Option<String>,
    pub priv_password: Option<String>,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
    pub retries: u32,
}

impl PollTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 161,
            community: "public".to_string(),
            version: PollProtocol::V2c,
            username: None,
            auth_password: None,
            priv_password: None,
            poll_interval_secs: 60,
            timeout_secs: 5,
            retries: 2,
        }
    }
}

/// Polling engine with per-target last-value memory.
pub struct PollCollector {
    simulated: bool,
    targets: HashMap<String, PollTarget>,
    // Baselines for the simulated traces, keyed target -> series name.
    last_values: Mutex<HashMap<String, HashMap<String, f64>>>,
    poll_count: AtomicUsize,
}

impl PollCollector {
    pub fn new(simulated: bool) -> Self {
        Self {
            simulated,
            targets: HashMap::new(),
            last_values: Mutex::new(HashMap::new()),
            poll_count: AtomicUsize::new(0),
        }
    }

    /// Register a device for polling.
    pub fn add_target(&mut self, target: PollTarget) {
        info!(host = %target.host, version = ?target.version, "added poll target");
        self.targets.insert(target.host.clone(), target);
    }

    /// Remove a device from polling.
    pub fn remove_target(&mut self, host: &str) {
        self.targets.remove(host);
        if let Ok(mut last) = self.last_values.lock() {
            last.remove(host);
        }
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::Relaxed)
    }

    /// Poll a single target and return its unified metrics.
    ///
    /// Calling this for an unregistered target is API misuse and surfaces an
    /// error; batch polling never does that.
    pub async fn poll_one(&self, host: &str) -> Result<Vec<Metric>, CollectError> {
        let target = self
            .targets
            .get(host)
            .ok_or_else(|| CollectError::UnknownTarget(host.to_string()))?;

        if self.simulated {
            return Ok(self.simulate_poll(target));
        }
        Err(CollectError::Unsupported(
            "live SNMP polling requires an SNMP transport".to_string(),
        ))
    }

    /// Poll every registered target concurrently and return the union.
    ///
    /// Per-target errors are logged and skipped; they never fail the batch.
    pub async fn poll_all(&self) -> Vec<Metric> {
        let polls = self.targets.keys().map(|host| self.poll_one(host));
        let mut metrics = Vec::new();
        for result in join_all(polls).await {
            match result {
                Ok(batch) => metrics.extend(batch),
                Err(e) => warn!("poll error: {e}"),
            }
        }
        self.poll_count.fetch_add(1, Ordering::Relaxed);
        metrics
    }

    /// Probe a host for its system identity.
    pub async fn discover(&self, host: &str, community: &str) -> Result<Device, CollectError> {
        if !self.simulated {
            return Err(CollectError::Unsupported(
                "live SNMP discovery requires an SNMP transport".to_string(),
            ));
        }

        let mut rng = rand::thread_rng();
        let platforms = [
            (DeviceVendor::Cisco, DeviceType::Router, "ISR4451-X", "IOS-XE 17.6.4"),
            (DeviceVendor::Cisco, DeviceType::Switch, "C9300-48P", "IOS-XE 17.9.1"),
            (DeviceVendor::Arista, DeviceType::Switch, "DCS-7280R3", "EOS 4.31.1F"),
            (DeviceVendor::Juniper, DeviceType::Router, "MX204", "Junos 23.2R1"),
            (DeviceVendor::PaloAlto, DeviceType::Firewall, "PA-5260", "PAN-OS 11.1.0"),
        ];
        let (vendor, device_type, model, os_version) = platforms[rng.gen_range(0..platforms.len())];

        let mut device = Device::new(format!("device-{}", host.replace('.', "-")), host);
        device.device_type = device_type;
        device.vendor = vendor;
        device.model = model.to_string();
        device.os_version = os_version.to_string();
        device.serial_number = format!("SN{}", rng.gen_range(100_000..1_000_000));
        device.snmp_community = Some(community.to_string());
        device.uptime_seconds = rng.gen_range(86_400..31_536_000);
        device.sys_description = format!("{} {} running {}", vendor.as_str(), model, os_version);
        Ok(device)
    }

    /// Interface inventory for a target.
    pub async fn interfaces(&self, _host: &str) -> Result<Vec<Interface>, CollectError> {
        if !self.simulated {
            return Err(CollectError::Unsupported(
                "live interface polling requires an SNMP transport".to_string(),
            ));
        }

        let mut rng = rand::thread_rng();
        let mut interfaces = Vec::with_capacity(8);
        for i in 0..8u32 {
            let oper = if rng.gen_bool(0.85) {
                InterfaceStatus::Up
            } else {
                InterfaceStatus::Down
            };
            interfaces.push(Interface {
                name: format!("GigabitEthernet0/{i}"),
                index: i + 1,
                description: if i < 2 {
                    "Link to upstream".to_string()
                } else {
                    format!("Link to server-{i}")
                },
                speed_mbps: if i < 4 { 1_000 } else { 10_000 },
                admin_status: InterfaceStatus::Up,
                oper_status: oper,
                ip_address: (i < 4).then(|| format!("10.0.{i}.1")),
                subnet_mask: (i < 4).then(|| "255.255.255.0".to_string()),
                mac_address: Some(format!("00:1A:2B:3C:4D:{i:02X}")),
                vlan_id: (i < 4).then(|| (i as u16) * 10 + 10),
                mtu: if i >= 4 { 9216 } else { 1500 },
                in_octets: rng.gen_range(1_000_000..9_000_000_000),
                out_octets: rng.gen_range(1_000_000..9_000_000_000),
                in_errors: rng.gen_range(0..100),
                out_errors: rng.gen_range(0..50),
                ..Interface::default()
            });
        }
        Ok(interfaces)
    }

    /// Generate one poll's worth of metrics, evolving per-target baselines.
    fn simulate_poll(&self, target: &PollTarget) -> Vec<Metric> {
        let mut rng = rand::thread_rng();
        let mut store = match self.last_values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let last = store.entry(target.host.clone()).or_default();
        let device_id = target.host.clone();
        let mut metrics = Vec::new();

        // CPU fluctuates around a baseline; ~2% of polls spike.
        let cpu_base = *last
            .entry("cpu_base".to_string())
            .or_insert_with(|| rng.gen_range(15.0..45.0));
        let mut cpu = (cpu_base + rng.gen_range(-5.0..5.0)).clamp(0.0, 100.0);
        if rng.gen_bool(0.02) {
            cpu = (cpu + rng.gen_range(20.0..40.0)).min(100.0);
        }
        metrics.push(Metric::new(
            &device_id,
            MetricType::Cpu,
            round1(cpu),
            "percent",
            MetricSource::Snmp,
        ));
        last.insert("cpu_base".to_string(), cpu_base + rng.gen_range(-0.5..0.5));

        let mem_base = *last
            .entry("mem_base".to_string())
            .or_insert_with(|| rng.gen_range(40.0..75.0));
        let mem = (mem_base + rng.gen_range(-2.0..2.0)).clamp(0.0, 100.0);
        metrics.push(Metric::new(
            &device_id,
            MetricType::Memory,
            round1(mem),
            "percent",
            MetricSource::Snmp,
        ));
        last.insert("mem_base".to_string(), mem_base + rng.gen_range(-0.3..0.3));

        // Four interfaces' worth of bandwidth in/out.
        for i in 0..4 {
            let in_key = format!("bw_in_{i}");
            let out_key = format!("bw_out_{i}");
            let bw_in = (*last
                .entry(in_key.clone())
                .or_insert_with(|| rng.gen_range(10.0..500.0))
                + rng.gen_range(-50.0..50.0))
            .max(0.0);
            let bw_out = (*last
                .entry(out_key.clone())
                .or_insert_with(|| rng.gen_range(10.0..500.0))
                + rng.gen_range(-50.0..50.0))
            .max(0.0);

            let mut metric_in = Metric::new(
                &device_id,
                MetricType::BandwidthIn,
                round2(bw_in),
                "Mbps",
                MetricSource::Snmp,
            );
            metric_in.interface_name = Some(format!("GigabitEthernet0/{i}"));
            metrics.push(metric_in);

            let mut metric_out = Metric::new(
                &device_id,
                MetricType::BandwidthOut,
                round2(bw_out),
                "Mbps",
                MetricSource::Snmp,
            );
            metric_out.interface_name = Some(format!("GigabitEthernet0/{i}"));
            metrics.push(metric_out);

            last.insert(in_key, bw_in);
            last.insert(out_key, bw_out);
        }

        let err_rate = rng.gen_range(0.0..0.6f64);
        metrics.push(Metric::new(
            &device_id,
            MetricType::ErrorRate,
            (err_rate * 1000.0).round() / 1000.0,
            "errors/sec",
            MetricSource::Snmp,
        ));

        let temp = *last
            .entry("temp".to_string())
            .or_insert_with(|| rng.gen_range(35.0..55.0))
            + rng.gen_range(-1.0..1.0);
        metrics.push(Metric::new(
            &device_id,
            MetricType::Temperature,
            round1(temp),
            "celsius",
            MetricSource::Snmp,
        ));
        last.insert("temp".to_string(), temp);

        metrics
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_poll_one() {
        let mut collector = PollCollector::new(true);
        collector.add_target(PollTarget::new("10.0.0.1"));

        let metrics = collector.poll_one("10.0.0.1").await.unwrap();
        assert!(metrics.iter().any(|m| m.metric_type == MetricType::Cpu));
        assert!(metrics.iter().any(|m| m.metric_type == MetricType::Memory));
        assert!(metrics.iter().any(|m| m.metric_type == MetricType::Temperature));
        // 2 device metrics + 8 interface metrics + error rate + temperature
        assert_eq!(metrics.len(), 12);
    }

    #[tokio::test]
    async fn test_poll_unknown_target() {
        let collector = PollCollector::new(true);
        let err = collector.poll_one("10.0.0.99").await.unwrap_err();
        assert!(matches!(err, CollectError::UnknownTarget(_)));
    }

    #[tokio::test]
    async fn test_poll_all() {
        let mut collector = PollCollector::new(true);
        collector.add_target(PollTarget::new("10.0.0.1"));
        collector.add_target(PollTarget::new("10.0.0.2"));

        let metrics = collector.poll_all().await;
        assert!(!metrics.is_empty());
        assert_eq!(collector.poll_count(), 1);
    }

    #[tokio::test]
    async fn test_metric_ranges() {
        let mut collector = PollCollector::new(true);
        collector.add_target(PollTarget::new("10.0.0.1"));

        for _ in 0..20 {
            let metrics = collector.poll_one("10.0.0.1").await.unwrap();
            for m in &metrics {
                match m.metric_type {
                    MetricType::Cpu | MetricType::Memory => {
                        assert!((0.0..=100.0).contains(&m.value));
                    }
                    MetricType::BandwidthIn | MetricType::BandwidthOut => {
                        assert!(m.value >= 0.0);
                        assert!(m.interface_name.is_some());
                    }
                    _ => {}
                }
            }
        }
    }

    #[tokio::test]
    async fn test_discover() {
        let collector = PollCollector::new(true);
        let device = collector.discover("10.0.0.1", "public").await.unwrap();
        assert_eq!(device.ip_address, "10.0.0.1");
        assert!(!device.hostname.is_empty());
        assert_eq!(device.snmp_community.as_deref(), Some("public"));
    }

    #[tokio::test]
    async fn test_interfaces() {
        let collector = PollCollector::new(true);
        let interfaces = collector.interfaces("10.0.0.1").await.unwrap();
        assert_eq!(interfaces.len(), 8);
        assert_eq!(interfaces[0].name, "GigabitEthernet0/0");
    }

    #[test]
    fn test_add_remove_target() {
        let mut collector = PollCollector::new(true);
        collector.add_target(PollTarget::new("10.0.0.1"));
        assert_eq!(collector.target_count(), 1);
        collector.remove_target("10.0.0.1");
        assert_eq!(collector.target_count(), 0);
    }
}
