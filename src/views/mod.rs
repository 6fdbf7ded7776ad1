//! Stdout table views - the CLI rendition of the node and pod lists.

use std::time::Duration;

use anyhow::Result;

use crate::metrics::{DiskSource, MetricsService, NodeSource};
use crate::model::{MetricsAware, NodeAdapter, PodMetrics};

/// Print the node list with synchronized metrics columns.
pub fn print_node_table(views: &[NodeAdapter]) {
    if views.is_empty() {
        println!("No nodes matched");
        return;
    }

    println!(
        "{:<24} {:<12} {:>7} {:<12} {:>7} {:>7}",
        "NAME", "CPU", "CPU%", "RAM", "RAM%", "DISK%"
    );
    println!("{}", "-".repeat(76));

    for node in views {
        let disk = node
            .disk_used_percent
            .map(|percent| format!("{:.1}%", percent))
            .unwrap_or_else(|| "N/A".to_string());

        println!(
            "{:<24} {:<12} {:>6.1}% {:<12} {:>6.1}% {:>7}",
            truncate(node.name(), 22),
            node.cpu_usage_formatted(),
            percent_value(&node.cpu_usage_percentage()),
            node.ram_usage_formatted(),
            percent_value(&node.ram_usage_percentage()),
            disk
        );
    }
}

/// Print aggregated pod metrics, one row per pod.
pub fn print_pod_table(rows: &[(String, PodMetrics)]) {
    if rows.is_empty() {
        println!("No pod metrics available");
        return;
    }

    println!("{:<48} {:<12} MEMORY", "POD", "CPU");
    println!("{}", "-".repeat(76));

    for (key, metrics) in rows {
        println!(
            "{:<48} {:<12} {}",
            truncate(key, 46),
            metrics.cpu_display,
            metrics.memory_display
        );
    }
}

/// Print the label keys available for filtering.
pub fn print_label_keys(keys: &[String]) {
    if keys.is_empty() {
        println!("No operator-set labels found");
        return;
    }
    for key in keys {
        println!("{}", key);
    }
}

/// Re-render the node table on an interval. The caches bound how often the
/// cluster actually gets asked, regardless of the render interval.
pub async fn watch_nodes<S: NodeSource, D: DiskSource>(
    service: &MetricsService<S, D>,
    label_key: Option<&str>,
    label_value: &str,
    interval: Duration,
) -> Result<()> {
    loop {
        match service.node_views(label_key, label_value).await {
            Ok(views) => {
                // Clear screen and home the cursor between renders.
                print!("\x1b[2J\x1b[H");
                let age = service
                    .metrics_age()
                    .map(|age| format!("{}s", age.as_secs()))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "nodelens - {} node(s), metrics age {} (ctrl-c to quit)\n",
                    views.len(),
                    age
                );
                print_node_table(&views);
            }
            Err(err) => {
                tracing::warn!(error = %err, "node list unavailable");
                println!("Node list unavailable: {}", err);
            }
        }
        tokio::time::sleep(interval).await;
    }
}

fn percent_value(percentage: &str) -> f64 {
    percentage.parse().unwrap_or(0.0)
}

fn truncate(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else if max_len > 3 {
        format!("{}...", s.chars().take(max_len - 3).collect::<String>())
    } else {
        s.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn percent_value_guards_unparseable_input() {
        assert_eq!(percent_value("25"), 25.0);
        assert_eq!(percent_value("12.5"), 12.5);
        assert_eq!(percent_value("0"), 0.0);
        assert_eq!(percent_value("not-a-number"), 0.0);
    }

    #[test]
    fn truncate_keeps_short_names() {
        assert_eq!(truncate("node-1", 22), "node-1");
        assert_eq!(
            truncate("a-rather-long-node-name-indeed", 10),
            "a-rathe..."
        );
    }
}
