//! Network scanner
//!
//! Discovers SNMP-manageable devices on a subnet, identifies platforms from
//! sysDescription signatures, and maintains the discovered inventory. The
//! simulated inventory models a small dual-core campus: two core routers,
//! two distribution and two access switches, an edge firewall, and a branch
//! router.

use std::collections::HashMap;

use tracing::info;

use netpulse_collect::{CollectError, PollCollector};
use netpulse_model::{Device, DeviceType, DeviceVendor, Interface, Neighbor, TopologySnapshot};

use crate::graph::TopologyGraph;

/// sysDescription substrings mapped to (vendor, device type).
const PLATFORM_SIGNATURES: &[(&str, DeviceVendor, DeviceType)] = &[
    ("cisco ios-xe", DeviceVendor::Cisco, DeviceType::Router),
    ("cisco ios", DeviceVendor::Cisco, DeviceType::Router),
    ("cisco nx-os", DeviceVendor::Cisco, DeviceType::Switch),
    ("cisco adaptive security", DeviceVendor::Cisco, DeviceType::Firewall),
    ("arista networks eos", DeviceVendor::Arista, DeviceType::Switch),
    ("juniper networks", DeviceVendor::Juniper, DeviceType::Router),
    ("palo alto networks", DeviceVendor::PaloAlto, DeviceType::Firewall),
    ("fortinet fortigate", DeviceVendor::Fortinet, DeviceType::Firewall),
];

/// Scans networks and keeps the discovered device inventory.
pub struct NetworkScanner {
    simulated: bool,
    poll: PollCollector,
    discovered: HashMap<String, Device>,
}

impl NetworkScanner {
    pub fn new(simulated: bool) -> Self {
        Self {
            simulated,
            poll: PollCollector::new(simulated),
            discovered: HashMap::new(),
        }
    }

    /// Scan a subnet for manageable devices and absorb them into the
    /// inventory.
    pub async fn scan_subnet(
        &mut self,
        subnet: &str,
        community: &str,
    ) -> Result<Vec<Device>, CollectError> {
        info!(subnet, "scanning for devices");
        if !self.simulated {
            return Err(CollectError::Unsupported(
                "live subnet scanning requires an SNMP transport".to_string(),
            ));
        }

        let devices = demo_inventory(community);
        for device in &devices {
            self.discovered.insert(device.id.clone(), device.clone());
        }
        info!(subnet, count = devices.len(), "discovery complete");
        Ok(devices)
    }

    /// Probe a single host.
    pub async fn scan_host(&self, host: &str, community: &str) -> Result<Device, CollectError> {
        self.poll.discover(host, community).await
    }

    /// Interface inventory for a discovered device.
    pub async fn interface_inventory(
        &self,
        device: &Device,
    ) -> Result<Vec<Interface>, CollectError> {
        self.poll.interfaces(&device.ip_address).await
    }

    /// Identify platform from a sysDescription string.
    pub fn identify_platform(sys_description: &str) -> (DeviceVendor, DeviceType) {
        let lowered = sys_description.to_lowercase();
        for (signature, vendor, device_type) in PLATFORM_SIGNATURES {
            if lowered.contains(signature) {
                return (*vendor, *device_type);
            }
        }
        (DeviceVendor::Unknown, DeviceType::Unknown)
    }

    pub fn discovered_devices(&self) -> Vec<Device> {
        self.discovered.values().cloned().collect()
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.discovered.get(device_id)
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }
}

/// Seed a graph with the canonical demo inventory and its cabling.
pub fn seed_demo_topology(graph: &mut TopologyGraph, devices: &[Device]) -> TopologySnapshot {
    graph.add_devices(devices.to_vec());

    let by_hostname: HashMap<&str, &Device> =
        devices.iter().map(|d| (d.hostname.as_str(), d)).collect();

    let neighbor_pairs = [
        ("router-core-1", "Gi0/0", "router-core-2", "Gi0/0", "lldp"),
        ("router-core-1", "Gi0/1", "switch-dist-1", "Et1", "lldp"),
        ("router-core-1", "Gi0/2", "switch-dist-2", "Et1", "lldp"),
        ("router-core-2", "Gi0/1", "switch-dist-1", "Et2", "lldp"),
        ("router-core-2", "Gi0/2", "switch-dist-2", "Et2", "lldp"),
        ("switch-dist-1", "Et3", "switch-access-1", "Gi0/1", "lldp"),
        ("switch-dist-1", "Et4", "switch-access-2", "Gi0/1", "lldp"),
        ("switch-dist-2", "Et3", "switch-access-1", "Gi0/2", "lldp"),
        ("switch-dist-2", "Et4", "switch-access-2", "Gi0/2", "lldp"),
        ("router-core-1", "Gi0/3", "firewall-edge-1", "eth1/1", "lldp"),
        ("router-core-2", "Gi0/3", "firewall-edge-1", "eth1/2", "lldp"),
        ("router-core-1", "Gi0/4", "router-branch-1", "ge-0/0/0", "bgp"),
    ];

    for (local_host, local_intf, remote_host, remote_intf, protocol) in neighbor_pairs {
        let (Some(local), Some(remote)) = (by_hostname.get(local_host), by_hostname.get(remote_host))
        else {
            continue;
        };
        let mut neighbor = Neighbor::new(&local.id, local_intf, &remote.id, remote_intf);
        neighbor.remote_hostname = remote_host.to_string();
        neighbor.remote_ip = Some(remote.ip_address.clone());
        neighbor.protocol = protocol.to_string();
        graph.add_neighbor(neighbor);
    }

    graph.build_topology()
}

/// The demo inventory returned by simulated subnet scans.
pub fn demo_inventory(community: &str) -> Vec<Device> {
    let specs = [
        (
            "router-core-1", "10.0.0.1", DeviceType::Router, DeviceVendor::Cisco,
            "ISR4451-X", "IOS-XE 17.6.4", "FTX2150A1BC", "DC1-ROW1-RACK3",
            "datacenter-1", 15_724_800u64, "Cisco IOS-XE ISR4451-X running 17.6.4",
        ),
        (
            "router-core-2", "10.0.0.2", DeviceType::Router, DeviceVendor::Cisco,
            "ISR4451-X", "IOS-XE 17.6.4", "FTX2150A1BD", "DC1-ROW1-RACK4",
            "datacenter-1", 15_724_800, "Cisco IOS-XE ISR4451-X running 17.6.4",
        ),
        (
            "switch-dist-1", "10.0.1.1", DeviceType::Switch, DeviceVendor::Arista,
            "DCS-7280R3", "EOS 4.31.1F", "SSJ21140123", "DC1-ROW2-RACK1",
            "datacenter-1", 8_640_000, "Arista Networks EOS DCS-7280R3 4.31.1F",
        ),
        (
            "switch-dist-2", "10.0.1.2", DeviceType::Switch, DeviceVendor::Arista,
            "DCS-7280R3", "EOS 4.31.1F", "SSJ21140124", "DC1-ROW2-RACK2",
            "datacenter-1", 8_640_000, "Arista Networks EOS DCS-7280R3 4.31.1F",
        ),
        (
            "switch-access-1", "10.0.2.1", DeviceType::Switch, DeviceVendor::Cisco,
            "C9300-48P", "IOS-XE 17.9.1", "FCW2234L0PQ", "Office-Floor2",
            "main-office", 2_592_000, "Cisco IOS-XE C9300-48P running 17.9.1",
        ),
        (
            "switch-access-2", "10.0.2.2", DeviceType::Switch, DeviceVendor::Cisco,
            "C9300-48P", "IOS-XE 17.9.1", "FCW2234L0PR", "Office-Floor3",
            "main-office", 2_592_000, "Cisco IOS-XE C9300-48P running 17.9.1",
        ),
        (
            "firewall-edge-1", "10.0.0.254", DeviceType::Firewall, DeviceVendor::PaloAlto,
            "PA-5260", "PAN-OS 11.1.0", "PA5260-SN001", "DC1-ROW1-RACK1",
            "datacenter-1", 31_536_000, "Palo Alto Networks PA-5260 PAN-OS 11.1.0",
        ),
        (
            "router-branch-1", "10.0.3.1", DeviceType::Router, DeviceVendor::Juniper,
            "MX204", "Junos 23.2R1", "JN1234567890", "Branch-Office-1",
            "branch-1", 5_184_000, "Juniper Networks MX204 Junos 23.2R1",
        ),
    ];

    specs
        .into_iter()
        .map(
            |(hostname, ip, device_type, vendor, model, os, serial, location, site, uptime, sys)| {
                let mut device = Device::new(hostname, ip);
                device.device_type = device_type;
                device.vendor = vendor;
                device.model = model.to_string();
                device.os_version = os.to_string();
                device.serial_number = serial.to_string();
                device.location = location.to_string();
                device.site = site.to_string();
                device.snmp_community = Some(community.to_string());
                device.uptime_seconds = uptime;
                device.sys_description = sys.to_string();
                device
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_subnet() {
        let mut scanner = NetworkScanner::new(true);
        let devices = scanner.scan_subnet("10.0.0.0/24", "public").await.unwrap();
        assert_eq!(devices.len(), 8);
        assert_eq!(scanner.discovered_count(), 8);
        assert!(devices.iter().any(|d| d.hostname == "router-core-1"));
    }

    #[tokio::test]
    async fn test_scan_host() {
        let scanner = NetworkScanner::new(true);
        let device = scanner.scan_host("10.0.0.7", "public").await.unwrap();
        assert_eq!(device.ip_address, "10.0.0.7");
    }

    #[test]
    fn test_identify_platform() {
        let (vendor, device_type) =
            NetworkScanner::identify_platform("Arista Networks EOS DCS-7280R3 4.31.1F");
        assert_eq!(vendor, DeviceVendor::Arista);
        assert_eq!(device_type, DeviceType::Switch);

        let (vendor, device_type) = NetworkScanner::identify_platform("Mystery OS 1.0");
        assert_eq!(vendor, DeviceVendor::Unknown);
        assert_eq!(device_type, DeviceType::Unknown);
    }

    #[test]
    fn test_seed_demo_topology() {
        let mut graph = TopologyGraph::new();
        let devices = demo_inventory("public");
        let snapshot = seed_demo_topology(&mut graph, &devices);

        assert_eq!(snapshot.devices.len(), 8);
        assert_eq!(snapshot.links.len(), 12);

        // Core routers are the most connected devices.
        let critical = graph.critical_devices();
        assert!(critical[0].hostname.starts_with("router-core"));
        assert_eq!(critical[0].neighbor_count, 5);
    }

    #[test]
    fn test_demo_path_core_to_access() {
        let mut graph = TopologyGraph::new();
        let devices = demo_inventory("public");
        seed_demo_topology(&mut graph, &devices);

        let core = graph.device_by_hostname("router-core-1").unwrap().id.clone();
        let access = graph.device_by_hostname("switch-access-1").unwrap().id.clone();
        let path = graph.path(&core, &access);
        assert_eq!(path.len(), 3); // core -> dist -> access
    }
}
