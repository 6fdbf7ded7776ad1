//! Diagnostic reporting for a single node's metrics pipeline.
//!
//! A `MetricsReport` captures every input and derived value the accessors
//! used, plus consistency checks, as one serializable structure. It exists to
//! answer "why does this node show that percentage" without attaching a
//! debugger or dumping state ad hoc.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::model::{MetricsAware, NodeAdapter};

/// The raw quantity strings the accessors started from.
#[derive(Debug, Clone, Serialize)]
pub struct RawSources {
    pub capacity_cpu: String,
    pub capacity_memory: String,
    pub allocatable_cpu: String,
    pub allocatable_memory: String,
    pub usage_cpu: Option<String>,
    pub usage_memory: Option<String>,
    pub pod_requests_cpu_milli: Option<f64>,
    pub pod_requests_memory_mib: Option<f64>,
}

/// Normalized values after quantity parsing.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedValues {
    pub cpu_usage_milli: f64,
    pub cpu_capacity_milli: f64,
    pub ram_usage_mib: f64,
    pub ram_capacity_mib: f64,
    pub ram_reserved_mib: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Percentages {
    pub cpu_usage: String,
    pub ram_usage: String,
    pub ram_reserved: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Checks {
    /// Live usage from the metrics API backs this node.
    pub has_metrics_data: bool,
    /// The reserved alias and the capacity accessor agree.
    pub reserved_alias_consistent: bool,
    /// Percentages divide by allocatable, not total capacity.
    pub capacity_is_allocatable: bool,
    pub disk_metrics_matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub node: String,
    pub generated_at: DateTime<Utc>,
    /// Age of the usage snapshot behind this report, if one exists.
    pub snapshot_age_secs: Option<u64>,
    pub raw: RawSources,
    pub parsed: ParsedValues,
    pub percentages: Percentages,
    pub disk_used_percent: Option<f64>,
    pub checks: Checks,
    pub issues: Vec<String>,
}

impl MetricsReport {
    pub fn for_node(adapter: &NodeAdapter, snapshot_age: Option<Duration>) -> Self {
        let status = &adapter.resource.status;
        let raw = RawSources {
            capacity_cpu: status.capacity.get("cpu").cloned().unwrap_or_default(),
            capacity_memory: status.capacity.get("memory").cloned().unwrap_or_default(),
            allocatable_cpu: status.allocatable.get("cpu").cloned().unwrap_or_default(),
            allocatable_memory: status.allocatable.get("memory").cloned().unwrap_or_default(),
            usage_cpu: adapter.usage.as_ref().map(|u| u.cpu.clone()),
            usage_memory: adapter.usage.as_ref().map(|u| u.memory.clone()),
            pod_requests_cpu_milli: adapter.pod_requests.map(|r| r.cpu_milli),
            pod_requests_memory_mib: adapter.pod_requests.map(|r| r.memory_mib),
        };

        let parsed = ParsedValues {
            cpu_usage_milli: adapter.cpu_usage(),
            cpu_capacity_milli: adapter.cpu_capacity(),
            ram_usage_mib: adapter.ram_usage(),
            ram_capacity_mib: adapter.ram_capacity(),
            ram_reserved_mib: adapter.ram_reserved(),
        };

        let percentages = Percentages {
            cpu_usage: adapter.cpu_usage_percentage(),
            ram_usage: adapter.ram_usage_percentage(),
            ram_reserved: adapter.ram_reserved_percentage(),
        };

        let checks = Checks {
            has_metrics_data: adapter.has_metrics_data(),
            reserved_alias_consistent: parsed.ram_reserved_mib == parsed.ram_capacity_mib
                && percentages.ram_reserved == percentages.ram_usage,
            capacity_is_allocatable: parsed.ram_capacity_mib
                == crate::units::parse_memory(&raw.allocatable_memory),
            disk_metrics_matched: adapter.disk_used_percent.is_some(),
        };

        let mut issues = Vec::new();
        if !checks.has_metrics_data {
            if adapter.pod_requests.is_some() {
                issues.push(
                    "metrics API data unavailable; values estimated from pod requests".to_string(),
                );
            } else {
                issues.push("no usage data from any source; values are zero".to_string());
            }
        }
        if parsed.cpu_capacity_milli == 0.0 {
            issues.push("cpu allocatable is zero or unparseable".to_string());
        }
        if parsed.ram_capacity_mib == 0.0 {
            issues.push("memory allocatable is zero or unparseable".to_string());
        }
        if !checks.reserved_alias_consistent {
            issues.push("ram reserved alias diverged from ram capacity".to_string());
        }
        if adapter.disk_used_percent.is_none() {
            issues.push("no disk metrics matched this node's internal IP".to_string());
        }

        Self {
            node: adapter.name().to_string(),
            generated_at: Utc::now(),
            snapshot_age_secs: snapshot_age.map(|age| age.as_secs()),
            raw,
            parsed,
            percentages,
            disk_used_percent: adapter.disk_used_percent,
            checks,
            issues,
        }
    }
}
