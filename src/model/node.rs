//! Metrics-aware node view.
//!
//! The node list and node detail views of the upstream dashboard used to
//! disagree: one divided pod requests by total capacity, the other divided
//! live usage by allocatable. This adapter pins down the second reading for
//! everything: usage always comes from the metrics API when available, and
//! both CPU and RAM percentages are computed against allocatable.

use crate::model::{NodeResource, RequestedResources, Usage};
use crate::units::{parse_cpu, parse_memory};

/// The metrics contract a node view renders from. Percentages are strings so
/// a zero capacity can degrade to `"0"` instead of NaN or infinity.
pub trait MetricsAware {
    /// CPU usage in millicores.
    fn cpu_usage(&self) -> f64;
    /// CPU allocatable in millicores. Deliberately allocatable, not total
    /// capacity, to match the detail view's denominator.
    fn cpu_capacity(&self) -> f64;
    /// RAM usage in MiB.
    fn ram_usage(&self) -> f64;
    /// RAM allocatable in MiB.
    fn ram_capacity(&self) -> f64;

    fn cpu_usage_percentage(&self) -> String {
        percentage(self.cpu_usage(), self.cpu_capacity())
    }

    fn ram_usage_percentage(&self) -> String {
        percentage(self.ram_usage(), self.ram_capacity())
    }

    /// Legacy alias for `ram_capacity`. The upstream model exposed both names
    /// with identical values; kept so the two never drift apart again.
    fn ram_reserved(&self) -> f64 {
        self.ram_capacity()
    }

    /// Legacy alias for `ram_usage_percentage`; see `ram_reserved`.
    fn ram_reserved_percentage(&self) -> String {
        self.ram_usage_percentage()
    }
}

fn percentage(usage: f64, capacity: f64) -> String {
    if capacity == 0.0 {
        return "0".to_string();
    }
    format!("{}", (usage * 100.0) / capacity)
}

/// Plain data adapter binding a node to whatever metrics were available when
/// the view was composed.
#[derive(Debug, Clone)]
pub struct NodeAdapter {
    pub resource: NodeResource,
    /// Live usage from the metrics snapshot, if the node appeared in it.
    pub usage: Option<Usage>,
    /// Requests-based estimate, used only when live usage is absent or zero.
    pub pod_requests: Option<RequestedResources>,
    /// Disk-used percent matched from the Prometheus snapshot, if any.
    pub disk_used_percent: Option<f64>,
}

impl NodeAdapter {
    pub fn new(resource: NodeResource) -> Self {
        Self {
            resource,
            usage: None,
            pod_requests: None,
            disk_used_percent: None,
        }
    }

    pub fn name(&self) -> &str {
        self.resource.name()
    }

    /// Whether live usage (not the request estimate) backs this adapter.
    pub fn has_metrics_data(&self) -> bool {
        self.usage
            .as_ref()
            .map(|usage| !usage.cpu.is_empty() && !usage.memory.is_empty())
            .unwrap_or(false)
    }

    /// Human format in cores or millicores, e.g. `"2.10 cores"` or `"500m"`.
    pub fn cpu_usage_formatted(&self) -> String {
        let millis = self.cpu_usage();
        if millis >= 1000.0 {
            format!("{:.2} cores", millis / 1000.0)
        } else {
            format!("{}m", millis.round() as i64)
        }
    }

    /// Human format in GiB or MiB, e.g. `"8.50 GiB"` or `"512 MiB"`.
    pub fn ram_usage_formatted(&self) -> String {
        let mib = self.ram_usage();
        if mib >= 1024.0 {
            format!("{:.2} GiB", mib / 1024.0)
        } else {
            format!("{} MiB", mib.round() as i64)
        }
    }
}

impl MetricsAware for NodeAdapter {
    fn cpu_usage(&self) -> f64 {
        let live = self
            .usage
            .as_ref()
            .map(|usage| parse_cpu(&usage.cpu))
            .unwrap_or(0.0);
        if live > 0.0 {
            return live;
        }
        self.pod_requests
            .map(|requests| requests.cpu_milli)
            .unwrap_or(0.0)
    }

    fn cpu_capacity(&self) -> f64 {
        parse_cpu(self.resource.allocatable("cpu"))
    }

    fn ram_usage(&self) -> f64 {
        let live = self
            .usage
            .as_ref()
            .map(|usage| parse_memory(&usage.memory))
            .unwrap_or(0.0);
        if live > 0.0 {
            return live;
        }
        self.pod_requests
            .map(|requests| requests.memory_mib)
            .unwrap_or(0.0)
    }

    fn ram_capacity(&self) -> f64 {
        parse_memory(self.resource.allocatable("memory"))
    }
}
