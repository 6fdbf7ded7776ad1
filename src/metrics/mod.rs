//! Metrics service: the cache-and-fallback layer behind every view.
//!
//! Owns the two data sources and three independent TTL caches (node metrics,
//! disk usage, endpoint probe). Each cache can be stale relative to the
//! others; a refresh failure anywhere degrades to stale or missing data and
//! is never surfaced as an error to a view.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::TtlCache;
use crate::filter;
use crate::integrations::kube::KubeClient;
use crate::integrations::prometheus::PromClient;
use crate::integrations::FetchError;
use crate::model::{
    aggregate_pod_metrics, DiskMetricsSnapshot, NodeAdapter, NodeMetricsSnapshot, NodeResource,
    PodMetrics, PodMetricsItem, RequestedResources,
};
use crate::units::{parse_cpu, parse_memory};

/// Cluster-side source of nodes, node metrics, and pod data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeSource: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeResource>, FetchError>;
    async fn node_metrics(&self) -> Result<NodeMetricsSnapshot, FetchError>;
    async fn pod_metrics<'a>(
        &self,
        namespace: Option<&'a str>,
    ) -> Result<Vec<PodMetricsItem>, FetchError>;
    async fn pod_requests(&self) -> Result<HashMap<String, RequestedResources>, FetchError>;
}

#[async_trait]
impl NodeSource for KubeClient {
    async fn list_nodes(&self) -> Result<Vec<NodeResource>, FetchError> {
        KubeClient::list_nodes(self).await
    }

    async fn node_metrics(&self) -> Result<NodeMetricsSnapshot, FetchError> {
        KubeClient::node_metrics(self).await
    }

    async fn pod_metrics<'a>(
        &self,
        namespace: Option<&'a str>,
    ) -> Result<Vec<PodMetricsItem>, FetchError> {
        KubeClient::pod_metrics(self, namespace).await
    }

    async fn pod_requests(&self) -> Result<HashMap<String, RequestedResources>, FetchError> {
        KubeClient::pod_requests(self).await
    }
}

/// Source of per-instance disk usage (Prometheus).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiskSource: Send + Sync {
    async fn disk_usage(&self) -> Result<DiskMetricsSnapshot, FetchError>;
    async fn probe(&self) -> bool;
}

#[async_trait]
impl DiskSource for PromClient {
    async fn disk_usage(&self) -> Result<DiskMetricsSnapshot, FetchError> {
        PromClient::disk_usage(self).await
    }

    async fn probe(&self) -> bool {
        PromClient::probe(self).await
    }
}

/// TTLs for the three caches. Metrics and disk share the short window; a
/// successful endpoint probe is remembered much longer.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub metrics: Duration,
    pub disk: Duration,
    pub probe: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            metrics: Duration::from_secs(25),
            disk: Duration::from_secs(25),
            probe: Duration::from_secs(300),
        }
    }
}

pub type ClusterMetricsService = MetricsService<KubeClient, PromClient>;

pub struct MetricsService<S, D> {
    source: S,
    disk_source: D,
    metrics_cache: TtlCache<NodeMetricsSnapshot>,
    disk_cache: TtlCache<DiskMetricsSnapshot>,
    probe_cache: TtlCache<bool>,
}

impl<S: NodeSource, D: DiskSource> MetricsService<S, D> {
    pub fn new(source: S, disk_source: D, ttls: CacheTtls) -> Self {
        Self {
            source,
            disk_source,
            metrics_cache: TtlCache::new(ttls.metrics),
            disk_cache: TtlCache::new(ttls.disk),
            probe_cache: TtlCache::new(ttls.probe),
        }
    }

    /// Current all-nodes usage snapshot: cached, refreshed past the TTL,
    /// stale on refresh failure, `None` only if nothing was ever fetched.
    pub async fn usage_snapshot(&self) -> Option<NodeMetricsSnapshot> {
        self.metrics_cache
            .get_or_refresh("node-metrics", || self.source.node_metrics())
            .await
    }

    /// Disk snapshot, gated on the endpoint probe. Only a successful probe
    /// is remembered; a failure is retried on the next view so a recovered
    /// endpoint shows up without waiting out the probe TTL.
    pub async fn disk_snapshot(&self) -> Option<DiskMetricsSnapshot> {
        let available = match self.probe_cache.fresh() {
            Some(flag) => flag,
            None => {
                let up = self.disk_source.probe().await;
                if up {
                    self.probe_cache.put(true);
                }
                up
            }
        };

        if !available {
            tracing::debug!("prometheus endpoint unavailable, skipping disk metrics");
            return None;
        }

        self.disk_cache
            .get_or_refresh("disk-usage", || self.disk_source.disk_usage())
            .await
    }

    /// Age of the node-metrics snapshot since its last successful refresh.
    pub fn metrics_age(&self) -> Option<Duration> {
        self.metrics_cache.age()
    }

    /// Compose the node list view: every node passing the label filter,
    /// bound to its usage entry, request-based fallback, and disk percent.
    pub async fn node_views(
        &self,
        label_key: Option<&str>,
        label_value: &str,
    ) -> Result<Vec<NodeAdapter>, FetchError> {
        let (nodes, snapshot) = futures::join!(self.source.list_nodes(), self.usage_snapshot());
        let nodes = nodes?;

        // The request estimate is only needed when some node has no live
        // usage; skip the pod listing otherwise. An entry that parses to
        // zero counts as "no usage" so the adapter's fallback has data.
        let needs_fallback = match &snapshot {
            None => true,
            Some(snapshot) => nodes.iter().any(|node| {
                match snapshot.usage_for(node.name()) {
                    None => true,
                    Some(usage) => {
                        parse_cpu(&usage.cpu) == 0.0 && parse_memory(&usage.memory) == 0.0
                    }
                }
            }),
        };
        let requests = if needs_fallback {
            match self.source.pod_requests().await {
                Ok(requests) => requests,
                Err(err) => {
                    tracing::warn!(error = %err, "pod request fallback unavailable");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        let disk = self.disk_snapshot().await;

        let mut views = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !filter::matches_label_filter(&node, label_key, label_value) {
                continue;
            }
            let usage = snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.usage_for(node.name()).cloned());
            let pod_requests = requests.get(node.name()).copied();
            let disk_used_percent = node
                .internal_ip()
                .and_then(|ip| disk.as_ref().and_then(|disk| disk.percent_for_ip(ip)));
            views.push(NodeAdapter {
                resource: node,
                usage,
                pod_requests,
                disk_used_percent,
            });
        }
        Ok(views)
    }

    /// Aggregated pod metrics keyed `namespace/name`, in API order.
    pub async fn pod_views(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<(String, PodMetrics)>, FetchError> {
        let items = self.source.pod_metrics(namespace).await?;
        Ok(items
            .iter()
            .map(|item| (item.key(), aggregate_pod_metrics(item)))
            .collect())
    }

    /// The unfiltered node list (for label-key discovery).
    pub async fn nodes(&self) -> Result<Vec<NodeResource>, FetchError> {
        self.source.list_nodes().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pod::{PodMetricsContainer, PodMetricsMetadata};
    use crate::model::{NodeAddress, NodeMetadata, NodeStatus, Usage};
    use crate::model::MetricsAware;
    use chrono::Utc;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn test_node(name: &str, internal_ip: &str, labels: &[(&str, &str)]) -> NodeResource {
        NodeResource {
            metadata: NodeMetadata {
                name: name.to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            },
            status: NodeStatus {
                allocatable: [
                    ("cpu".to_string(), "4".to_string()),
                    ("memory".to_string(), "8Gi".to_string()),
                ]
                .into_iter()
                .collect(),
                addresses: vec![NodeAddress {
                    kind: "InternalIP".to_string(),
                    address: internal_ip.to_string(),
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn snapshot_with(entries: &[(&str, &str, &str)]) -> NodeMetricsSnapshot {
        let mut usage: IndexMap<String, Usage> = IndexMap::new();
        for (name, cpu, memory) in entries {
            usage.insert(
                name.to_string(),
                Usage {
                    cpu: cpu.to_string(),
                    memory: memory.to_string(),
                },
            );
        }
        NodeMetricsSnapshot {
            usage,
            captured_at: Utc::now(),
        }
    }

    fn quiet_disk_source() -> MockDiskSource {
        let mut disk = MockDiskSource::new();
        disk.expect_probe().returning(|| false);
        disk
    }

    #[tokio::test]
    async fn snapshot_calls_within_ttl_fetch_once() {
        let mut source = MockNodeSource::new();
        source
            .expect_node_metrics()
            .times(1)
            .returning(|| Ok(snapshot_with(&[("node-a", "1", "1Gi")])));

        let service = MetricsService::new(source, quiet_disk_source(), CacheTtls::default());

        let first = service.usage_snapshot().await.unwrap();
        let second = service.usage_snapshot().await.unwrap();
        assert_eq!(first.usage_for("node-a"), second.usage_for("node-a"));
    }

    #[tokio::test]
    async fn failed_probe_skips_disk_query_and_is_retried() {
        let source = MockNodeSource::new();
        let mut disk = MockDiskSource::new();
        // A failed probe is not cached, so every view probes again.
        disk.expect_probe().times(2).returning(|| false);
        disk.expect_disk_usage().times(0);

        let service = MetricsService::new(source, disk, CacheTtls::default());
        assert!(service.disk_snapshot().await.is_none());
        assert!(service.disk_snapshot().await.is_none());
    }

    #[tokio::test]
    async fn successful_probe_is_cached_across_views() {
        let source = MockNodeSource::new();
        let mut disk = MockDiskSource::new();
        disk.expect_probe().times(1).returning(|| true);
        disk.expect_disk_usage().returning(|| {
            Ok(DiskMetricsSnapshot {
                used_percent: [("10.0.0.4:9100".to_string(), 12.0)].into_iter().collect(),
                captured_at: Utc::now(),
            })
        });

        let service = MetricsService::new(source, disk, CacheTtls::default());
        assert!(service.disk_snapshot().await.is_some());
        // Second view hits the probe cache, not the endpoint.
        assert!(service.disk_snapshot().await.is_some());
    }

    #[tokio::test]
    async fn node_views_bind_usage_requests_and_disk() {
        let mut source = MockNodeSource::new();
        source.expect_list_nodes().returning(|| {
            Ok(vec![
                test_node("node-a", "10.0.0.4", &[("env", "prod")]),
                test_node("node-b", "10.0.0.5", &[("env", "prod")]),
            ])
        });
        // node-b is missing from the snapshot, so the request fallback runs.
        source
            .expect_node_metrics()
            .returning(|| Ok(snapshot_with(&[("node-a", "2", "4Gi")])));
        source.expect_pod_requests().times(1).returning(|| {
            Ok(HashMap::from([(
                "node-b".to_string(),
                RequestedResources {
                    cpu_milli: 300.0,
                    memory_mib: 512.0,
                },
            )]))
        });

        let mut disk = MockDiskSource::new();
        disk.expect_probe().returning(|| true);
        disk.expect_disk_usage().returning(|| {
            Ok(DiskMetricsSnapshot {
                used_percent: [("10.0.0.5:9100".to_string(), 81.5)].into_iter().collect(),
                captured_at: Utc::now(),
            })
        });

        let service = MetricsService::new(source, disk, CacheTtls::default());
        let views = service.node_views(None, "").await.unwrap();
        assert_eq!(views.len(), 2);

        assert_eq!(views[0].name(), "node-a");
        assert_eq!(views[0].cpu_usage(), 2000.0);
        assert_eq!(views[0].disk_used_percent, None);

        assert_eq!(views[1].name(), "node-b");
        assert_eq!(views[1].cpu_usage(), 300.0);
        assert_eq!(views[1].ram_usage(), 512.0);
        assert_eq!(views[1].disk_used_percent, Some(81.5));
    }

    #[tokio::test]
    async fn node_views_apply_the_label_filter() {
        let mut source = MockNodeSource::new();
        source.expect_list_nodes().returning(|| {
            Ok(vec![
                test_node("node-a", "10.0.0.4", &[("env", "prod")]),
                test_node("node-b", "10.0.0.5", &[("env", "dev")]),
            ])
        });
        source
            .expect_node_metrics()
            .returning(|| Ok(snapshot_with(&[("node-a", "1", "1Gi"), ("node-b", "1", "1Gi")])));

        let service = MetricsService::new(source, quiet_disk_source(), CacheTtls::default());
        let views = service.node_views(Some("env"), "PROD").await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name(), "node-a");
    }

    #[tokio::test]
    async fn zero_usage_in_snapshot_triggers_request_fallback() {
        let mut source = MockNodeSource::new();
        source
            .expect_list_nodes()
            .returning(|| Ok(vec![test_node("node-a", "10.0.0.4", &[])]));
        // Present in the snapshot, but both quantities parse to zero.
        source
            .expect_node_metrics()
            .returning(|| Ok(snapshot_with(&[("node-a", "0", "0")])));
        source.expect_pod_requests().times(1).returning(|| {
            Ok(HashMap::from([(
                "node-a".to_string(),
                RequestedResources {
                    cpu_milli: 300.0,
                    memory_mib: 512.0,
                },
            )]))
        });

        let service = MetricsService::new(source, quiet_disk_source(), CacheTtls::default());
        let views = service.node_views(None, "").await.unwrap();
        assert_eq!(views[0].cpu_usage(), 300.0);
        assert_eq!(views[0].ram_usage(), 512.0);
    }

    #[tokio::test]
    async fn pod_views_key_by_namespaced_name() {
        let mut source = MockNodeSource::new();
        source.expect_pod_metrics().returning(|_| {
            Ok(vec![PodMetricsItem {
                metadata: PodMetricsMetadata {
                    name: "web-0".to_string(),
                    namespace: "default".to_string(),
                },
                containers: vec![PodMetricsContainer {
                    name: "web".to_string(),
                    usage: Usage {
                        cpu: "250m".to_string(),
                        memory: "256Mi".to_string(),
                    },
                }],
                ..Default::default()
            }])
        });

        let service = MetricsService::new(source, quiet_disk_source(), CacheTtls::default());
        let pods = service.pod_views(Some("default")).await.unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].0, "default/web-0");
        assert_eq!(pods[0].1.cpu_milli, 250.0);
    }

    #[tokio::test]
    async fn fallback_skipped_when_every_node_has_usage() {
        let mut source = MockNodeSource::new();
        source
            .expect_list_nodes()
            .returning(|| Ok(vec![test_node("node-a", "10.0.0.4", &[])]));
        source
            .expect_node_metrics()
            .returning(|| Ok(snapshot_with(&[("node-a", "1", "1Gi")])));
        source.expect_pod_requests().times(0);

        let service = MetricsService::new(source, quiet_disk_source(), CacheTtls::default());
        let views = service.node_views(None, "").await.unwrap();
        assert_eq!(views[0].pod_requests, None);
    }
}
