//! Core data model: cluster resources as this tool sees them, plus the
//! snapshot types held by the metrics caches.
//!
//! Everything deserialized from the cluster is read-only here and parsed
//! defensively: a field the API server did not send becomes a default, not a
//! deserialization error.

#![allow(dead_code)]

pub mod node;
pub mod pod;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

pub use node::{MetricsAware, NodeAdapter};
pub use pod::{aggregate_pod_metrics, PodMetrics, PodMetricsItem};

/// CPU/memory usage pair as quantity strings, e.g. `{cpu: "250m", memory: "512Mi"}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub cpu: String,
    pub memory: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeMetadata {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub taints: Vec<Taint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeStatus {
    pub capacity: BTreeMap<String, String>,
    pub allocatable: BTreeMap<String, String>,
    pub addresses: Vec<NodeAddress>,
}

/// A node as reported by the core API. Externally owned; never mutated here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeResource {
    pub metadata: NodeMetadata,
    pub spec: NodeSpec,
    pub status: NodeStatus,
}

impl NodeResource {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// The node's InternalIP address, used to match Prometheus instances.
    pub fn internal_ip(&self) -> Option<&str> {
        self.status
            .addresses
            .iter()
            .find(|addr| addr.kind == "InternalIP")
            .map(|addr| addr.address.as_str())
    }

    pub fn allocatable(&self, resource: &str) -> &str {
        self.status
            .allocatable
            .get(resource)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Point-in-time usage for every node in the cluster, from one metrics API
/// call. Replaced wholesale on refresh; never merged.
#[derive(Debug, Clone)]
pub struct NodeMetricsSnapshot {
    pub usage: IndexMap<String, Usage>,
    pub captured_at: DateTime<Utc>,
}

impl NodeMetricsSnapshot {
    pub fn usage_for(&self, node_name: &str) -> Option<&Usage> {
        self.usage.get(node_name)
    }
}

/// Disk-used percentage per Prometheus instance ("ip:port"), from one range
/// query. Same wholesale-replacement rule as `NodeMetricsSnapshot`.
#[derive(Debug, Clone)]
pub struct DiskMetricsSnapshot {
    pub used_percent: IndexMap<String, f64>,
    pub captured_at: DateTime<Utc>,
}

impl DiskMetricsSnapshot {
    /// Match an instance to a node by bare IP, ignoring the scrape port.
    /// First match wins; no match means no data for that node.
    pub fn percent_for_ip(&self, internal_ip: &str) -> Option<f64> {
        self.used_percent.iter().find_map(|(instance, percent)| {
            let bare_ip = instance
                .rsplit_once(':')
                .map(|(ip, _)| ip)
                .unwrap_or(instance.as_str());
            (bare_ip == internal_ip).then_some(*percent)
        })
    }
}

/// Summed container requests for the pods scheduled on one node. Used as the
/// usage estimate when the metrics API has nothing for the node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestedResources {
    pub cpu_milli: f64,
    pub memory_mib: f64,
}
