//! Config store
//!
//! Append-only, content-addressed snapshots of device configurations.
//! Writing a config whose hash matches the latest snapshot is a no-op that
//! returns the existing snapshot, so duplicate captures are free.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use similar::TextDiff;
use tracing::{debug, info};

use netpulse_model::{new_id, ConfigDiff, ConfigSnapshot};

/// One line matched by a config search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub device_id: String,
    pub line_number: usize,
    pub line: String,
}

/// Per-device snapshot history plus golden baselines.
#[derive(Default)]
pub struct ConfigStore {
    snapshots: HashMap<String, Vec<ConfigSnapshot>>,
    golden: HashMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a configuration snapshot, deduplicating against the latest.
    pub fn backup(
        &mut self,
        device_id: &str,
        config_text: &str,
        source: &str,
        hostname: &str,
    ) -> ConfigSnapshot {
        let config_hash = hex::encode(Sha256::digest(config_text.as_bytes()));

        if let Some(latest) = self.snapshots.get(device_id).and_then(|s| s.last()) {
            if latest.config_hash == config_hash {
                debug!(device = device_id, "config unchanged, reusing snapshot");
                return latest.clone();
            }
        }

        let snapshot = ConfigSnapshot {
            id: new_id(),
            device_id: device_id.to_string(),
            device_hostname: if hostname.is_empty() {
                device_id.to_string()
            } else {
                hostname.to_string()
            },
            config_text: config_text.to_string(),
            config_hash: config_hash.clone(),
            captured_at: Utc::now(),
            source: source.to_string(),
        };
        info!(device = device_id, hash = &config_hash[..12], "config backed up");
        self.snapshots
            .entry(device_id.to_string())
            .or_default()
            .push(snapshot.clone());
        snapshot
    }

    /// Latest snapshot for a device.
    pub fn latest(&self, device_id: &str) -> Option<&ConfigSnapshot> {
        self.snapshots.get(device_id).and_then(|s| s.last())
    }

    /// Version history, most recent `limit` snapshots.
    pub fn history(&self, device_id: &str, limit: usize) -> Vec<ConfigSnapshot> {
        self.snapshots
            .get(device_id)
            .map(|snapshots| {
                snapshots
                    .iter()
                    .rev()
                    .take(limit)
                    .rev()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Diff two snapshots; defaults to the two most recent.
    pub fn diff(
        &self,
        device_id: &str,
        before_id: Option<&str>,
        after_id: Option<&str>,
    ) -> Option<ConfigDiff> {
        let snapshots = self.snapshots.get(device_id)?;
        if snapshots.len() < 2 && (before_id.is_none() || after_id.is_none()) {
            return None;
        }

        let before = match before_id {
            Some(id) => snapshots.iter().find(|s| s.id == id)?,
            None => &snapshots[snapshots.len() - 2],
        };
        let after = match after_id {
            Some(id) => snapshots.iter().find(|s| s.id == id)?,
            None => snapshots.last()?,
        };

        let diff_text = unified_diff(
            &before.config_text,
            &after.config_text,
            &format!("{device_id} ({})", before.captured_at.to_rfc3339()),
            &format!("{device_id} ({})", after.captured_at.to_rfc3339()),
        );
        let (added, removed) = count_changes(&diff_text);

        Some(ConfigDiff {
            device_id: device_id.to_string(),
            before_snapshot_id: before.id.clone(),
            after_snapshot_id: after.id.clone(),
            diff_text,
            lines_added: added,
            lines_removed: removed,
            lines_changed: added.min(removed),
            generated_at: Utc::now(),
        })
    }

    /// Set the golden (baseline) configuration for a device.
    pub fn set_golden(&mut self, device_id: &str, config_text: &str) {
        self.golden
            .insert(device_id.to_string(), config_text.to_string());
    }

    /// Diff the current snapshot against the golden baseline.
    pub fn compare_to_golden(&self, device_id: &str) -> Option<String> {
        let golden = self.golden.get(device_id)?;
        let latest = self.latest(device_id)?;
        if *golden == latest.config_text {
            return Some("Configuration matches golden baseline.".to_string());
        }
        Some(unified_diff(
            golden,
            &latest.config_text,
            &format!("{device_id} (golden)"),
            &format!("{device_id} (current)"),
        ))
    }

    /// Case-insensitive substring search across each device's latest
    /// snapshot.
    pub fn search(&self, pattern: &str) -> Vec<SearchHit> {
        let needle = pattern.to_lowercase();
        let mut hits = Vec::new();
        for (device_id, snapshots) in &self.snapshots {
            let Some(latest) = snapshots.last() else { continue };
            for (index, line) in latest.config_text.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    hits.push(SearchHit {
                        device_id: device_id.clone(),
                        line_number: index + 1,
                        line: line.trim().to_string(),
                    });
                }
            }
        }
        hits
    }

    pub fn device_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn total_snapshots(&self) -> usize {
        self.snapshots.values().map(Vec::len).sum()
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.snapshots.keys().cloned().collect()
    }
}

fn unified_diff(before: &str, after: &str, from_label: &str, to_label: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .header(from_label, to_label)
        .to_string()
}

fn count_changes(diff_text: &str) -> (usize, usize) {
    let mut added = 0;
    let mut removed = 0;
    for line in diff_text.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if line.starts_with('+') {
            added += 1;
        } else if line.starts_with('-') {
            removed += 1;
        }
    }
    (added, removed)
}
