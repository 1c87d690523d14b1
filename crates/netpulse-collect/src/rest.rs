//! Vendor HTTP collector
//!
//! Polls registered vendor API endpoints (Meraki dashboard, Arista eAPI,
//! generic JSON) and normalizes responses into unified metrics. Auth is a
//! bearer token or the vendor-specific header.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use netpulse_model::{Device, DeviceType, DeviceVendor, Metric, MetricSource, MetricType};

use crate::CollectError;

/// Configuration for one vendor API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestEndpoint {
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub vendor: String,
    pub headers: HashMap<String, String>,
    pub verify_ssl: bool,
}

impl RestEndpoint {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            vendor: "generic".to_string(),
            headers: HashMap::new(),
            verify_ssl: true,
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Attach an API key. Meraki uses its own header; everything else gets a
    /// bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        if self.vendor == "meraki" {
            self.headers
                .insert("X-Cisco-Meraki-API-Key".to_string(), api_key.clone());
        } else {
            self.headers
                .insert("Authorization".to_string(), format!("Bearer {api_key}"));
        }
        self.api_key = Some(api_key);
        self
    }
}

/// HTTP API collector with vendor-specific normalizers.
pub struct RestCollector {
    simulated: bool,
    endpoints: HashMap<String, RestEndpoint>,
    client: reqwest::Client,
}

impl RestCollector {
    pub fn new(simulated: bool) -> Self {
        Self {
            simulated,
            endpoints: HashMap::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Register an endpoint under its name.
    pub fn add_endpoint(&mut self, endpoint: RestEndpoint) {
        info!(name = %endpoint.name, vendor = %endpoint.vendor, "added REST endpoint");
        self.endpoints.insert(endpoint.name.clone(), endpoint);
    }

    pub fn remove_endpoint(&mut self, name: &str) {
        self.endpoints.remove(name);
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Collect normalized metrics from one endpoint.
    pub async fn collect_one(&self, name: &str) -> Result<Vec<Metric>, CollectError> {
        let endpoint = self
            .endpoints
            .get(name)
            .ok_or_else(|| CollectError::UnknownEndpoint(name.to_string()))?;

        if self.simulated {
            return Ok(simulate_collect(endpoint));
        }
        self.fetch_live(endpoint).await
    }

    /// Collect from every registered endpoint, tolerating per-endpoint errors.
    pub async fn collect_all(&self) -> Vec<Metric> {
        let mut metrics = Vec::new();
        for name in self.endpoints.keys() {
            match self.collect_one(name).await {
                Ok(batch) => metrics.extend(batch),
                Err(e) => warn!(endpoint = %name, "REST collection error: {e}"),
            }
        }
        metrics
    }

    /// Device inventory exposed by an endpoint.
    pub async fn devices(&self, name: &str) -> Result<Vec<Device>, CollectError> {
        let endpoint = self
            .endpoints
            .get(name)
            .ok_or_else(|| CollectError::UnknownEndpoint(name.to_string()))?;

        if self.simulated {
            return Ok(simulate_devices(endpoint));
        }
        Err(CollectError::Unsupported(
            "live inventory requires a vendor-specific pager".to_string(),
        ))
    }

    async fn fetch_live(&self, endpoint: &RestEndpoint) -> Result<Vec<Metric>, CollectError> {
        let mut request = self
            .client
            .get(&endpoint.base_url)
            .timeout(Duration::from_secs(5));
        for (key, value) in &endpoint.headers {
            request = request.header(key, value);
        }

        let body: serde_json::Value = request.send().await?.json().await?;
        Ok(normalize_payload(endpoint, &body))
    }
}

/// Normalize a generic `{"metrics": [...]}` payload into unified metrics.
///
/// Entries missing required fields are skipped; the vendor tag is attached to
/// every accepted metric.
fn normalize_payload(endpoint: &RestEndpoint, body: &serde_json::Value) -> Vec<Metric> {
    let Some(entries) = body.get("metrics").and_then(serde_json::Value::as_array) else {
        warn!(endpoint = %endpoint.name, "payload carried no metrics array");
        return Vec::new();
    };

    let mut metrics = Vec::new();
    for entry in entries {
        let Some(device_id) = entry.get("device_id").and_then(serde_json::Value::as_str) else {
            continue;
        };
        let Some(metric_type) = entry
            .get("metric_type")
            .and_then(serde_json::Value::as_str)
            .and_then(MetricType::parse)
        else {
            continue;
        };
        let Some(value) = entry.get("value").and_then(serde_json::Value::as_f64) else {
            continue;
        };
        let unit = entry
            .get("unit")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        let mut metric = Metric::new(device_id, metric_type, value, unit, MetricSource::RestApi);
        if let Some(hostname) = entry.get("device_hostname").and_then(serde_json::Value::as_str) {
            metric.device_hostname = hostname.to_string();
        }
        metric
            .tags
            .insert("vendor".to_string(), endpoint.vendor.clone());
        metrics.push(metric);
    }
    metrics
}

fn simulate_collect(endpoint: &RestEndpoint) -> Vec<Metric> {
    let mut rng = rand::thread_rng();
    let mut metrics = Vec::new();

    match endpoint.vendor.as_str() {
        "meraki" => {
            for i in 0..3 {
                let mut metric = Metric::new(
                    format!("meraki-{i}"),
                    MetricType::Cpu,
                    round1(rng.gen_range(5.0..35.0)),
                    "percent",
                    MetricSource::RestApi,
                );
                metric.device_hostname = format!("meraki-ap-{}", i + 1);
                metric.tags.insert("vendor".to_string(), "meraki".to_string());
                metric
                    .tags
                    .insert("type".to_string(), "access_point".to_string());
                metrics.push(metric);
            }
        }
        "arista" => {
            for i in 0..2 {
                for (metric_type, range) in [
                    (MetricType::Cpu, 10.0..50.0),
                    (MetricType::Memory, 30.0..60.0),
                ] {
                    let mut metric = Metric::new(
                        format!("arista-{i}"),
                        metric_type,
                        round1(rng.gen_range(range)),
                        "percent",
                        MetricSource::RestApi,
                    );
                    metric.device_hostname = format!("arista-leaf-{}", i + 1);
                    metric.tags.insert("vendor".to_string(), "arista".to_string());
                    metrics.push(metric);
                }
            }
        }
        _ => {
            let mut metric = Metric::new(
                "generic-0",
                MetricType::Cpu,
                round1(rng.gen_range(10.0..70.0)),
                "percent",
                MetricSource::RestApi,
            );
            metric.device_hostname = "generic-device".to_string();
            metric
                .tags
                .insert("vendor".to_string(), endpoint.vendor.clone());
            metrics.push(metric);
        }
    }
    metrics
}

fn simulate_devices(endpoint: &RestEndpoint) -> Vec<Device> {
    let mut devices = Vec::new();
    match endpoint.vendor.as_str() {
        "meraki" => {
            for i in 0..3 {
                let mut device = Device::new(format!("meraki-ap-{}", i + 1), format!("10.10.{i}.1"));
                device.device_type = DeviceType::AccessPoint;
                device.vendor = DeviceVendor::Meraki;
                device.model = "MR46".to_string();
                device.os_version = "30.1".to_string();
                device.site = "main-office".to_string();
                devices.push(device);
            }
        }
        "arista" => {
            for i in 0..2 {
                let mut device =
                    Device::new(format!("arista-leaf-{}", i + 1), format!("10.20.{i}.1"));
                device.device_type = DeviceType::Switch;
                device.vendor = DeviceVendor::Arista;
                device.model = "DCS-7050TX3-48C8".to_string();
                device.os_version = "EOS 4.31.1F".to_string();
                device.site = "datacenter-1".to_string();
                devices.push(device);
            }
        }
        _ => {}
    }
    devices
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
