//! Pod-level metrics from the `metrics.k8s.io/v1beta1` API.

use serde::Deserialize;

use crate::model::Usage;
use crate::units::{format_cpu, format_memory, parse_cpu, parse_memory};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodMetricsMetadata {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodMetricsContainer {
    pub name: String,
    pub usage: Usage,
}

/// One pod's entry in the metrics list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodMetricsItem {
    pub metadata: PodMetricsMetadata,
    pub timestamp: String,
    pub window: String,
    pub containers: Vec<PodMetricsContainer>,
}

impl PodMetricsItem {
    /// `namespace/name`, the key pod views index by.
    pub fn key(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }
}

/// Container usage summed across a pod, normalized and pre-formatted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodMetrics {
    pub cpu_milli: f64,
    pub memory_mib: f64,
    pub cpu_display: String,
    pub memory_display: String,
}

/// Sum all container usage in a pod. Tolerates items with no containers.
pub fn aggregate_pod_metrics(item: &PodMetricsItem) -> PodMetrics {
    let mut cpu_milli = 0.0;
    let mut memory_mib = 0.0;

    for container in &item.containers {
        cpu_milli += parse_cpu(&container.usage.cpu);
        memory_mib += parse_memory(&container.usage.memory);
    }

    PodMetrics {
        cpu_milli,
        memory_mib,
        cpu_display: format_cpu(cpu_milli),
        memory_display: format_memory(memory_mib),
    }
}
