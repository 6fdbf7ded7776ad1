//! Clients for the cluster-side data sources: the core/metrics APIs and the
//! Prometheus service proxy.

pub mod kube;
pub mod prometheus;

use thiserror::Error;

/// Why a fetch produced no data. Callers log these and degrade to stale or
/// empty values; nothing here is fatal.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Shape(&'static str),
}
