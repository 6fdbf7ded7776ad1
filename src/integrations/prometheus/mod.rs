//! Disk metrics via a Prometheus service behind the API-server proxy.
//!
//! The Prometheus location is configured as `namespace/services/name:port`
//! and resolved to the service-proxy URL. Disk usage comes from one instant
//! query over the node-exporter filesystem gauges; results are keyed by the
//! scrape `instance` label ("ip:port").

use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::integrations::FetchError;
use crate::model::DiskMetricsSnapshot;

/// Root-filesystem used percent per instance.
const DISK_USED_QUERY: &str = "100 - (node_filesystem_avail_bytes{mountpoint=\"/\"} * 100 / node_filesystem_size_bytes{mountpoint=\"/\"})";

/// Cheap query used only to probe that the endpoint answers at all.
const PROBE_QUERY: &str = "up";

static ENDPOINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^/\s]+)/services/([^/:\s]+):(\d{1,5})$").expect("valid regex"));

/// A `namespace/services/name:port` triple locating the Prometheus service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrometheusEndpoint {
    pub namespace: String,
    pub service: String,
    pub port: u16,
}

impl PrometheusEndpoint {
    pub fn parse(raw: &str) -> Option<Self> {
        let captures = ENDPOINT_RE.captures(raw.trim())?;
        Some(Self {
            namespace: captures[1].to_string(),
            service: captures[2].to_string(),
            port: captures[3].parse().ok()?,
        })
    }

    /// The API-server service-proxy prefix for this endpoint.
    pub fn proxy_url(&self, api_base: &str) -> String {
        format!(
            "{}/api/v1/namespaces/{}/services/{}:{}/proxy",
            api_base.trim_end_matches('/'),
            self.namespace,
            self.service,
            self.port
        )
    }
}

impl std::fmt::Display for PrometheusEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/services/{}:{}", self.namespace, self.service, self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct QueryMetric {
    instance: String,
}

#[derive(Debug, Clone, Deserialize)]
struct QueryResult {
    #[serde(default)]
    metric: QueryMetric,
    /// `[unix_ts, "stringified number"]`
    value: (f64, String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct QueryData {
    result: Vec<QueryResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct QueryResponse {
    status: String,
    data: QueryData,
}

/// Prometheus HTTP API client, bound to one configured endpoint.
pub struct PromClient {
    http: reqwest::Client,
    query_url: String,
    timeout: Duration,
}

impl PromClient {
    pub fn new(
        api_base: &str,
        endpoint: &PrometheusEndpoint,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            query_url: format!("{}/api/v1/query", endpoint.proxy_url(api_base)),
            timeout,
        })
    }

    async fn query(&self, expr: &str) -> Result<QueryResponse, FetchError> {
        let response = self
            .http
            .get(&self.query_url)
            .query(&[("query", expr)])
            // Bounded so a wedged Prometheus degrades to "no data" instead
            // of stalling the whole view.
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let body = response.json::<QueryResponse>().await?;
        if body.status != "success" {
            return Err(FetchError::Shape("prometheus status was not success"));
        }
        Ok(body)
    }

    /// Disk-used percent for every scraped instance, one query.
    pub async fn disk_usage(&self) -> Result<DiskMetricsSnapshot, FetchError> {
        let body = self.query(DISK_USED_QUERY).await?;

        let mut used_percent: IndexMap<String, f64> = IndexMap::new();
        for result in body.data.result {
            if result.metric.instance.is_empty() {
                continue;
            }
            let Ok(percent) = result.value.1.parse::<f64>() else {
                continue;
            };
            // First entry per instance wins.
            used_percent.entry(result.metric.instance).or_insert(percent);
        }

        Ok(DiskMetricsSnapshot {
            used_percent,
            captured_at: Utc::now(),
        })
    }

    /// Does the configured endpoint answer queries right now?
    pub async fn probe(&self) -> bool {
        match self.query(PROBE_QUERY).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "prometheus endpoint probe failed");
                false
            }
        }
    }
}
