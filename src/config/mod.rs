//! Configuration system for nodelens.
//!
//! Two persistence surfaces: the TOML config file (cluster access, cache
//! TTLs, Prometheus defaults) and a tiny per-user endpoint file holding the
//! Prometheus endpoint override, which can be changed at runtime without
//! touching the main config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::integrations::prometheus::PrometheusEndpoint;
use crate::metrics::CacheTtls;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub cache: CacheConfig,
    pub prometheus: PrometheusConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nodelens").join("config.toml"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// API server base URL; the default assumes a local `kubectl proxy`.
    pub api_base: String,
    /// Optional bearer token for direct API server access.
    pub token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8001".to_string(),
            token: None,
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub metrics_ttl_secs: u64,
    pub disk_ttl_secs: u64,
    pub probe_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metrics_ttl_secs: 25,
            disk_ttl_secs: 25,
            probe_ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            metrics: Duration::from_secs(self.metrics_ttl_secs),
            disk: Duration::from_secs(self.disk_ttl_secs),
            probe: Duration::from_secs(self.probe_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Used when no endpoint override has been stored.
    pub default_endpoint: String,
    pub query_timeout_secs: u64,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            default_endpoint: "ops/services/ops-prometheus-server:80".to_string(),
            query_timeout_secs: 8,
        }
    }
}

/// Persisted Prometheus endpoint override (a single trimmed line). Reading
/// never fails: anything unreadable or malformed falls back to the
/// configured default.
pub struct EndpointStore {
    path: PathBuf,
    default: String,
}

impl EndpointStore {
    pub fn new(path: PathBuf, default: String) -> Self {
        Self { path, default }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nodelens").join("prometheus-endpoint"))
    }

    /// The stored endpoint, or the default when unset, unreadable, or not a
    /// valid `namespace/services/name:port` string.
    pub fn get(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    self.default.clone()
                } else if PrometheusEndpoint::parse(trimmed).is_some() {
                    trimmed.to_string()
                } else {
                    tracing::warn!(stored = trimmed, "stored endpoint is invalid, using default");
                    self.default.clone()
                }
            }
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(error = %err, "could not read endpoint override");
                }
                self.default.clone()
            }
        }
    }

    /// Validate and persist an endpoint override.
    pub fn set(&self, raw: &str) -> Result<PrometheusEndpoint> {
        let Some(endpoint) = PrometheusEndpoint::parse(raw) else {
            anyhow::bail!(
                "invalid endpoint '{}': expected namespace/services/name:port",
                raw.trim()
            );
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", endpoint))?;
        Ok(endpoint)
    }

    /// Remove the override, returning to the default.
    pub fn reset(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
