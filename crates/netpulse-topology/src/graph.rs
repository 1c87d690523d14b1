//! Topology graph
//!
//! Undirected multigraph over devices keyed by device id. Endpoints are
//! stored as stable identifiers rather than references; BFS queries use a
//! visited set, so cycles are safe.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use netpulse_model::{Device, Neighbor, TopologyLink, TopologySnapshot};

/// Device ranked by connectivity for fault-impact analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalDevice {
    pub device_id: String,
    pub hostname: String,
    pub neighbor_count: usize,
    pub blast_radius: usize,
}

/// The network topology graph.
#[derive(Debug, Default)]
pub struct TopologyGraph {
    devices: HashMap<String, Device>,
    neighbors: Vec<Neighbor>,
    links: Vec<TopologyLink>,
    adjacency: HashMap<String, HashSet<String>>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, device: Device) {
        self.devices.insert(device.id.clone(), device);
    }

    pub fn add_devices(&mut self, devices: Vec<Device>) {
        for device in devices {
            self.add_device(device);
        }
    }

    /// Record a neighbor relation and update the adjacency both ways.
    pub fn add_neighbor(&mut self, neighbor: Neighbor) {
        self.adjacency
            .entry(neighbor.local_device_id.clone())
            .or_default()
            .insert(neighbor.remote_device_id.clone());
        self.adjacency
            .entry(neighbor.remote_device_id.clone())
            .or_default()
            .insert(neighbor.local_device_id.clone());
        self.neighbors.push(neighbor);
    }

    /// Materialize the link set, deduplicating by canonicalized endpoint pair.
    pub fn build_topology(&mut self) -> TopologySnapshot {
        self.links.clear();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for neighbor in &self.neighbors {
            let a = format!("{}:{}", neighbor.local_device_id, neighbor.local_interface);
            let b = format!("{}:{}", neighbor.remote_device_id, neighbor.remote_interface);
            let key = if a <= b { (a, b) } else { (b, a) };
            if !seen.insert(key) {
                continue;
            }

            self.links.push(TopologyLink {
                source_device_id: neighbor.local_device_id.clone(),
                source_interface: neighbor.local_interface.clone(),
                target_device_id: neighbor.remote_device_id.clone(),
                target_interface: neighbor.remote_interface.clone(),
                link_speed_mbps: 0,
                protocol: neighbor.protocol.clone(),
            });
        }

        TopologySnapshot {
            devices: self.devices.values().cloned().collect(),
            links: self.links.clone(),
            generated_at: Utc::now(),
        }
    }

    /// Adjacency set of a device.
    pub fn neighbors(&self, device_id: &str) -> Vec<String> {
        self.adjacency
            .get(device_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// BFS shortest path. Returns `[src]` when `src == dst` and an empty
    /// path when the target is unreachable.
    pub fn path(&self, source_id: &str, target_id: &str) -> Vec<String> {
        if source_id == target_id {
            return vec![source_id.to_string()];
        }
        if !self.adjacency.contains_key(source_id) {
            return Vec::new();
        }

        let mut visited: HashSet<String> = HashSet::from([source_id.to_string()]);
        let mut queue: VecDeque<Vec<String>> = VecDeque::from([vec![source_id.to_string()]]);

        while let Some(path) = queue.pop_front() {
            let Some(current) = path.last() else { continue };
            if let Some(adjacent) = self.adjacency.get(current) {
                for neighbor in adjacent {
                    if neighbor == target_id {
                        let mut full = path.clone();
                        full.push(neighbor.clone());
                        return full;
                    }
                    if visited.insert(neighbor.clone()) {
                        let mut next = path.clone();
                        next.push(neighbor.clone());
                        queue.push_back(next);
                    }
                }
            }
        }
        Vec::new()
    }

    /// Devices reachable within `max_hops` hops, excluding the source.
    pub fn blast_radius(&self, device_id: &str, max_hops: usize) -> HashSet<String> {
        let mut affected: HashSet<String> = HashSet::new();
        let mut current_layer: HashSet<String> = HashSet::from([device_id.to_string()]);

        for _ in 0..max_hops {
            let mut next_layer: HashSet<String> = HashSet::new();
            for dev in &current_layer {
                if let Some(adjacent) = self.adjacency.get(dev) {
                    for neighbor in adjacent {
                        if neighbor != device_id && affected.insert(neighbor.clone()) {
                            next_layer.insert(neighbor.clone());
                        }
                    }
                }
            }
            current_layer = next_layer;
        }
        affected
    }

    /// Devices ranked by degree, with a 2-hop blast-radius count.
    pub fn critical_devices(&self) -> Vec<CriticalDevice> {
        let mut ranking: Vec<CriticalDevice> = self
            .adjacency
            .iter()
            .map(|(device_id, adjacent)| CriticalDevice {
                device_id: device_id.clone(),
                hostname: self
                    .devices
                    .get(device_id)
                    .map_or_else(|| "unknown".to_string(), |d| d.hostname.clone()),
                neighbor_count: adjacent.len(),
                blast_radius: self.blast_radius(device_id, 2).len(),
            })
            .collect();
        ranking.sort_by(|a, b| b.neighbor_count.cmp(&a.neighbor_count));
        ranking
    }

    /// Serialize the graph for the API.
    pub fn to_value(&mut self) -> serde_json::Value {
        let snapshot = self.build_topology();
        serde_json::json!({
            "devices": snapshot.devices,
            "links": snapshot.links,
            "generated_at": snapshot.generated_at,
            "device_count": snapshot.devices.len(),
            "link_count": snapshot.links.len(),
        })
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.get(device_id)
    }

    pub fn device_by_hostname(&self, hostname: &str) -> Option<&Device> {
        self.devices.values().find(|d| d.hostname == hostname)
    }

    pub fn devices(&self) -> Vec<&Device> {
        self.devices.values().collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(hostname: &str, ip: &str) -> Device {
        Device::new(hostname, ip)
    }

    #[test]
    fn test_add_device() {
        let mut graph = TopologyGraph::new();
        graph.add_device(device("r1", "10.0.0.1"));
        assert_eq!(graph.device_count(), 1);
    }

    #[test]
    fn test_build_topology_dedups_links() {
        let mut graph = TopologyGraph::new();
        let d1 = device("r1", "10.0.0.1");
        let d2 = device("r2", "10.0.0.2");
        let (id1, id2) = (d1.id.clone(), d2.id.clone());
        graph.add_devices(vec![d1, d2]);

        // Same physical link reported from both ends.
        graph.add_neighbor(Neighbor::new(&id1, "Gi0/0", &id2, "Gi0/0"));
        graph.add_neighbor(Neighbor::new(&id2, "Gi0/0", &id1, "Gi0/0"));

        let snapshot = graph.build_topology();
        assert_eq!(snapshot.devices.len(), 2);
        assert_eq!(snapshot.links.len(), 1);
        assert_eq!(graph.neighbor_count(), 2);
    }

    #[test]
    fn test_path_bfs() {
        let mut graph = TopologyGraph::new();
        let d1 = device("r1", "10.0.0.1");
        let d2 = device("r2", "10.0.0.2");
        let d3 = device("s1", "10.0.1.1");
        let (id1, id2, id3) = (d1.id.clone(), d2.id.clone(), d3.id.clone());
        graph.add_devices(vec![d1, d2, d3]);
        graph.add_neighbor(Neighbor::new(&id1, "Gi0/0", &id2, "Gi0/0"));
        graph.add_neighbor(Neighbor::new(&id2, "Gi0/1", &id3, "Et1"));

        let path = graph.path(&id1, &id3);
        assert_eq!(path, vec![id1.clone(), id2, id3]);
        assert_eq!(graph.path(&id1, &id1), vec![id1.clone()]);
        assert!(graph.path(&id1, "missing").is_empty());
        assert!(graph.path("missing", &id1).is_empty());
    }

    #[test]
    fn test_blast_radius_one_hop_equals_degree() {
        let mut graph = TopologyGraph::new();
        let core = device("core", "10.0.0.1");
        let d1 = device("dist1", "10.0.1.1");
        let d2 = device("dist2", "10.0.1.2");
        let (cid, id1, id2) = (core.id.clone(), d1.id.clone(), d2.id.clone());
        graph.add_devices(vec![core, d1, d2]);
        graph.add_neighbor(Neighbor::new(&cid, "Gi0/0", &id1, "Et1"));
        graph.add_neighbor(Neighbor::new(&cid, "Gi0/1", &id2, "Et1"));

        let radius = graph.blast_radius(&cid, 1);
        assert_eq!(radius.len(), graph.neighbors(&cid).len());
        assert!(!radius.contains(&cid));
    }

    #[test]
    fn test_blast_radius_two_hops() {
        let mut graph = TopologyGraph::new();
        let a = device("a", "10.0.0.1");
        let b = device("b", "10.0.0.2");
        let c = device("c", "10.0.0.3");
        let (ida, idb, idc) = (a.id.clone(), b.id.clone(), c.id.clone());
        graph.add_devices(vec![a, b, c]);
        graph.add_neighbor(Neighbor::new(&ida, "Gi0/0", &idb, "Gi0/0"));
        graph.add_neighbor(Neighbor::new(&idb, "Gi0/1", &idc, "Gi0/0"));

        assert_eq!(graph.blast_radius(&ida, 1).len(), 1);
        assert_eq!(graph.blast_radius(&ida, 2).len(), 2);
    }

    #[test]
    fn test_critical_devices_ranked_by_degree() {
        let mut graph = TopologyGraph::new();
        let hub = device("hub", "10.0.0.1");
        let s1 = device("s1", "10.0.1.1");
        let s2 = device("s2", "10.0.1.2");
        let (hid, id1, id2) = (hub.id.clone(), s1.id.clone(), s2.id.clone());
        graph.add_devices(vec![hub, s1, s2]);
        graph.add_neighbor(Neighbor::new(&hid, "Gi0/0", &id1, "Et1"));
        graph.add_neighbor(Neighbor::new(&hid, "Gi0/1", &id2, "Et1"));

        let critical = graph.critical_devices();
        assert_eq!(critical[0].hostname, "hub");
        assert_eq!(critical[0].neighbor_count, 2);
        assert_eq!(critical[0].blast_radius, 2);
    }

    #[test]
    fn test_to_value() {
        let mut graph = TopologyGraph::new();
        graph.add_device(device("r1", "10.0.0.1"));
        let value = graph.to_value();
        assert_eq!(value["device_count"], 1);
        assert_eq!(value["link_count"], 0);
    }
}
