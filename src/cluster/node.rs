//! BrokerNode status as reported by the broker's admin API
//!
//! A broker node is a member of EMQX's own cluster protocol. Each ready pod
//! hosts exactly one, named after the pod (see
//! [`ClusterInstance::node_name_for`](super::ClusterInstance::node_name_for)).

use serde::{Deserialize, Serialize};

/// One entry of the `api/v4/nodes` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerNodeStatus {
    /// Broker node name, e.g. "emqx@emqx-0.emqx-headless.default.svc.cluster.local"
    pub node: String,

    /// "Running" or "Stopped"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_release: Option<String>,

    /// Broker version, e.g. "4.4.14"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Human-readable uptime, e.g. "2 hours, 3 minutes"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,

    /// "opensource" or "enterprise"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,

    /// Live client connections on this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fds: Option<u64>,
}

impl BrokerNodeStatus {
    /// Minimal status carrying only a node name
    pub fn named(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            node_status: None,
            otp_release: None,
            version: None,
            uptime: None,
            edition: None,
            connections: None,
            max_fds: None,
        }
    }

    /// Whether the broker reports this node as running
    pub fn is_running(&self) -> bool {
        self.node_status.as_deref() == Some("Running")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_entry() {
        let json = r#"{
            "version": "4.4.14",
            "uptime": "1 hours, 2 minutes",
            "otp_release": "24.3.4.2/12.3.2.2",
            "node_status": "Running",
            "node": "emqx@emqx-0.emqx-headless.default.svc.cluster.local",
            "max_fds": 1048576,
            "connections": 12,
            "edition": "enterprise",
            "load1": "0.42"
        }"#;

        let node: BrokerNodeStatus = serde_json::from_str(json).unwrap();
        assert!(node.is_running());
        assert_eq!(node.version.as_deref(), Some("4.4.14"));
        assert_eq!(node.connections, Some(12));
    }

    #[test]
    fn test_deserialize_sparse_entry() {
        let node: BrokerNodeStatus = serde_json::from_str(r#"{"node": "emqx@a"}"#).unwrap();
        assert_eq!(node, BrokerNodeStatus::named("emqx@a"));
        assert!(!node.is_running());
    }
}
