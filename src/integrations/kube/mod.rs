//! Kubernetes API client: core resources plus the `metrics.k8s.io` endpoint.
//!
//! Talks to the API server through a plain base URL (typically a `kubectl
//! proxy`) with an optional bearer token. Every listing is one request for
//! the whole cluster so snapshot consumers share a single API call.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::integrations::FetchError;
use crate::model::{NodeMetricsSnapshot, NodeResource, PodMetricsItem, RequestedResources, Usage};
use crate::units::{parse_cpu, parse_memory};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NodeList {
    items: Vec<NodeResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NamedMetadata {
    name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NodeMetricsItem {
    metadata: NamedMetadata,
    usage: Usage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NodeMetricsList {
    items: Vec<NodeMetricsItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PodMetricsList {
    items: Vec<PodMetricsItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ContainerResources {
    requests: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PodContainer {
    resources: ContainerResources,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PodSpec {
    #[serde(rename = "nodeName")]
    node_name: String,
    containers: Vec<PodContainer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PodItem {
    spec: PodSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PodList {
    items: Vec<PodItem>,
}

/// Thin wrapper over the API server's HTTP surface.
pub struct KubeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl KubeClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        Ok(response.json::<T>().await?)
    }

    /// All nodes in the cluster.
    pub async fn list_nodes(&self) -> Result<Vec<NodeResource>, FetchError> {
        let list: NodeList = self.fetch_json("/api/v1/nodes").await?;
        Ok(list.items)
    }

    /// One metrics-server call covering every node, timestamped on receipt.
    pub async fn node_metrics(&self) -> Result<NodeMetricsSnapshot, FetchError> {
        let list: NodeMetricsList = self
            .fetch_json("/apis/metrics.k8s.io/v1beta1/nodes")
            .await?;

        let mut usage: IndexMap<String, Usage> = IndexMap::new();
        for item in list.items {
            if item.metadata.name.is_empty() {
                continue;
            }
            usage.insert(item.metadata.name, item.usage);
        }

        Ok(NodeMetricsSnapshot {
            usage,
            captured_at: Utc::now(),
        })
    }

    /// Pod metrics, optionally limited to one namespace.
    pub async fn pod_metrics(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<PodMetricsItem>, FetchError> {
        let path = match namespace {
            Some(ns) => format!("/apis/metrics.k8s.io/v1beta1/namespaces/{}/pods", ns),
            None => "/apis/metrics.k8s.io/v1beta1/pods".to_string(),
        };
        let list: PodMetricsList = self.fetch_json(&path).await?;
        Ok(list
            .items
            .into_iter()
            .filter(|item| !item.metadata.name.is_empty() && !item.metadata.namespace.is_empty())
            .collect())
    }

    /// Container requests summed per node, the estimate used when the
    /// metrics API has no usage for a node.
    pub async fn pod_requests(&self) -> Result<HashMap<String, RequestedResources>, FetchError> {
        let list: PodList = self.fetch_json("/api/v1/pods").await?;
        Ok(sum_requests(list.items))
    }
}

fn sum_requests(pods: Vec<PodItem>) -> HashMap<String, RequestedResources> {
    let mut per_node: HashMap<String, RequestedResources> = HashMap::new();
    for pod in pods {
        // Unscheduled pods have no node yet and count nowhere.
        if pod.spec.node_name.is_empty() {
            continue;
        }
        let entry = per_node.entry(pod.spec.node_name).or_default();
        for container in &pod.spec.containers {
            if let Some(cpu) = container.resources.requests.get("cpu") {
                entry.cpu_milli += parse_cpu(cpu);
            }
            if let Some(memory) = container.resources.requests.get("memory") {
                entry.memory_mib += parse_memory(memory);
            }
        }
    }
    per_node
}
