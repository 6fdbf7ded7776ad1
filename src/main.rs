//! nodelens - Synchronized Kubernetes node and pod metrics for your terminal
//!
//! Renders the node list the way the node detail view computes it: live
//! usage from the metrics API divided by allocatable, with pod-request
//! estimates when the metrics API is down, label-based filtering, and disk
//! usage matched in from a Prometheus endpoint behind the service proxy.

mod cache;
mod config;
mod diagnostics;
mod filter;
mod integrations;
mod metrics;
mod model;
mod units;
mod views;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, EndpointStore};
use crate::diagnostics::MetricsReport;
use crate::integrations::kube::KubeClient;
use crate::integrations::prometheus::{PromClient, PrometheusEndpoint};
use crate::metrics::{ClusterMetricsService, MetricsService};

#[derive(Parser)]
#[command(name = "nodelens")]
#[command(author = "Nodelens Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Synchronized Kubernetes node and pod metrics for your terminal", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List nodes with synchronized CPU/RAM/disk metrics
    Nodes {
        /// Label key to filter on
        #[arg(short = 'k', long)]
        label_key: Option<String>,

        /// Label value substring (case-insensitive)
        #[arg(short = 'l', long, default_value = "")]
        label_value: String,
    },

    /// Re-render the node list on an interval
    Watch {
        /// Label key to filter on
        #[arg(short = 'k', long)]
        label_key: Option<String>,

        /// Label value substring (case-insensitive)
        #[arg(short = 'l', long, default_value = "")]
        label_value: String,

        /// Seconds between renders
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },

    /// List pods with aggregated container metrics
    Pods {
        /// Limit to one namespace
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// List label keys available for node filtering
    Labels,

    /// Manage the configured Prometheus endpoint
    Endpoint {
        #[command(subcommand)]
        command: EndpointCommands,
    },

    /// Dump a metrics diagnostic report for one node
    Debug {
        /// Node name
        node: String,
    },
}

#[derive(Subcommand)]
enum EndpointCommands {
    /// Show the endpoint currently in effect
    Get,
    /// Store an endpoint override (namespace/services/name:port)
    Set { endpoint: String },
    /// Remove the override and return to the default
    Reset,
}

fn setup_logging(verbosity: u8) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let log_dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nodelens")
        .join("logs");

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "nodelens.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

fn endpoint_store(config: &Config) -> Result<EndpointStore> {
    let path = EndpointStore::default_path().context("could not determine config directory")?;
    Ok(EndpointStore::new(
        path,
        config.prometheus.default_endpoint.clone(),
    ))
}

fn build_service(config: &Config, store: &EndpointStore) -> Result<ClusterMetricsService> {
    let timeout = Duration::from_secs(config.cluster.request_timeout_secs);
    let kube = KubeClient::new(&config.cluster.api_base, config.cluster.token.clone(), timeout)?;

    let raw = store.get();
    let endpoint = PrometheusEndpoint::parse(&raw)
        .with_context(|| format!("configured prometheus endpoint '{}' is invalid", raw))?;
    let prom = PromClient::new(
        &config.cluster.api_base,
        &endpoint,
        Duration::from_secs(config.prometheus.query_timeout_secs),
    )?;

    Ok(MetricsService::new(kube, prom, config.cache.ttls()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive for the duration of the program
    let _logging_guard = setup_logging(cli.verbose)?;

    let config_path = cli.config.or_else(|| {
        let default_config = Config::default_path()?;
        if default_config.exists() {
            Some(default_config)
        } else {
            None
        }
    });

    let config = if let Some(path) = config_path {
        Config::load(&path)?
    } else {
        Config::default()
    };

    let store = endpoint_store(&config)?;

    match cli.command {
        Commands::Nodes {
            label_key,
            label_value,
        } => {
            let service = build_service(&config, &store)?;
            let nodes = service
                .node_views(label_key.as_deref(), &label_value)
                .await
                .context("failed to list nodes")?;
            views::print_node_table(&nodes);
        }
        Commands::Watch {
            label_key,
            label_value,
            interval,
        } => {
            let service = build_service(&config, &store)?;
            views::watch_nodes(
                &service,
                label_key.as_deref(),
                &label_value,
                Duration::from_secs(interval.max(1)),
            )
            .await?;
        }
        Commands::Pods { namespace } => {
            let service = build_service(&config, &store)?;
            let pods = service
                .pod_views(namespace.as_deref())
                .await
                .context("failed to fetch pod metrics")?;
            views::print_pod_table(&pods);
        }
        Commands::Labels => {
            let service = build_service(&config, &store)?;
            let nodes = service.nodes().await.context("failed to list nodes")?;
            views::print_label_keys(&filter::label_key_options(&nodes));
        }
        Commands::Endpoint { command } => match command {
            EndpointCommands::Get => {
                println!("{}", store.get());
            }
            EndpointCommands::Set { endpoint } => {
                let endpoint = store.set(&endpoint)?;
                println!("Prometheus endpoint set to {}", endpoint);
            }
            EndpointCommands::Reset => {
                store.reset()?;
                println!("Prometheus endpoint reset to {}", store.get());
            }
        },
        Commands::Debug { node } => {
            let service = build_service(&config, &store)?;
            let nodes = service
                .node_views(None, "")
                .await
                .context("failed to list nodes")?;
            let Some(adapter) = nodes.iter().find(|n| n.name() == node) else {
                anyhow::bail!("node '{}' not found", node);
            };
            let report = MetricsReport::for_node(adapter, service.metrics_age());
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
