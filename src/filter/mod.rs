//! Label-based node filtering.
//!
//! A filter is a selected label key plus a free-form value; a node passes
//! when its value for that key contains the filter value, case-insensitively.
//! System-managed labels are hidden from the key picker but still match if
//! filtered on explicitly.

use indexmap::IndexSet;

use crate::model::NodeResource;

/// Label prefixes that are cluster-managed noise in a key picker.
pub const SYSTEM_LABEL_PREFIXES: &[&str] = &["beta.kubernetes.io", "node.kubernetes.io"];

/// Exact label keys that are cluster-managed noise in a key picker.
pub const SYSTEM_LABEL_KEYS: &[&str] = &[
    "kubernetes.io/arch",
    "kubernetes.io/hostname",
    "kubernetes.io/os",
];

/// True if the key is set by the cluster rather than an operator.
pub fn is_system_label(key: &str) -> bool {
    if SYSTEM_LABEL_KEYS.contains(&key) {
        return true;
    }
    SYSTEM_LABEL_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}

/// Does a node pass the label filter?
///
/// No key or a blank value means no filter (everything passes). A node that
/// lacks the key never passes. Otherwise it is a case-insensitive substring
/// match of the trimmed filter value.
pub fn matches_label_filter(node: &NodeResource, label_key: Option<&str>, label_value: &str) -> bool {
    let Some(key) = label_key else {
        return true;
    };
    if label_value.trim().is_empty() {
        return true;
    }

    let Some(node_value) = node.metadata.labels.get(key) else {
        return false;
    };

    node_value
        .to_lowercase()
        .contains(&label_value.trim().to_lowercase())
}

/// Distinct non-system label keys across the given nodes, in first-seen
/// order. This is the source for the key-selection dropdown.
pub fn label_key_options(nodes: &[NodeResource]) -> Vec<String> {
    let mut keys: IndexSet<String> = IndexSet::new();
    for node in nodes {
        for key in node.metadata.labels.keys() {
            if !is_system_label(key) {
                keys.insert(key.clone());
            }
        }
    }
    keys.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeMetadata;
    use pretty_assertions::assert_eq;

    fn node_with_labels(labels: &[(&str, &str)]) -> NodeResource {
        NodeResource {
            metadata: NodeMetadata {
                name: "node-1".to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn no_key_means_no_filter() {
        let node = node_with_labels(&[]);
        assert!(matches_label_filter(&node, None, "anything"));
    }

    #[test]
    fn blank_value_means_no_filter() {
        let node = node_with_labels(&[]);
        assert!(matches_label_filter(&node, Some("env"), ""));
        assert!(matches_label_filter(&node, Some("env"), "   "));
    }

    #[test]
    fn missing_label_never_matches() {
        let node = node_with_labels(&[]);
        assert!(!matches_label_filter(&node, Some("env"), "prod"));
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let node = node_with_labels(&[("env", "prod")]);
        assert!(matches_label_filter(&node, Some("env"), "PRO"));
        assert!(matches_label_filter(&node, Some("env"), " prod "));
        assert!(!matches_label_filter(&node, Some("env"), "staging"));
    }

    #[test]
    fn system_labels_detected() {
        assert!(is_system_label("kubernetes.io/hostname"));
        assert!(is_system_label("beta.kubernetes.io/arch"));
        assert!(is_system_label("node.kubernetes.io/instance-type"));
        assert!(!is_system_label("env"));
        assert!(!is_system_label("topology.kubernetes.io/zone"));
    }

    #[test]
    fn key_options_exclude_system_labels_and_dedupe() {
        let nodes = vec![
            node_with_labels(&[("env", "prod"), ("kubernetes.io/os", "linux")]),
            node_with_labels(&[("env", "dev"), ("team", "storage")]),
        ];

        assert_eq!(
            label_key_options(&nodes),
            vec!["env".to_string(), "team".to_string()]
        );
    }
}
