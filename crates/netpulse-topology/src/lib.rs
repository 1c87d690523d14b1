//! NetPulse topology
//!
//! Undirected device graph built from neighbor relations (LLDP/CDP/BGP/OSPF)
//! with path, blast-radius, and criticality queries, plus the network
//! scanner that populates the inventory.

pub mod graph;
pub mod scanner;

pub use graph::{CriticalDevice, TopologyGraph};
pub use scanner::{demo_inventory, seed_demo_topology, NetworkScanner};
