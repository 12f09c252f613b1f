//! Pod topology - which pod groups and pods belong to an instance
//!
//! The orchestration platform owns pod groups ("generations") and their
//! pods. The bridge only enumerates them, through the [`PodTopology`] trait.
//! [`crate::k8s::KubeTopology`] is the Kubernetes implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::instance::ClusterInstance;

/// Errors raised while querying the orchestration platform
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Failed to list pod groups for {0}: {1}")]
    ListGroups(String, String),

    #[error("Failed to list pods of pod group {0}: {1}")]
    ListPods(String, String),
}

/// Which pod groups to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupScope {
    /// Groups hosting a broker node the instance has observed in the cluster
    Tracked,
    /// Every group the instance has ever had that still exists
    History,
}

/// One revision of the broker's pod template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodGroup {
    /// Group name, e.g. "emqx-7d9f8b6c4"
    pub name: String,

    /// Unique identifier of the group, used to match owned pods
    pub uid: String,
}

impl PodGroup {
    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
        }
    }
}

/// Readiness of one container in a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerReadiness {
    pub name: String,
    pub ready: bool,
}

/// A broker pod and the parts of its status the bridge cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerPod {
    pub name: String,

    /// Pod IP, absent until the pod is scheduled and networked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default)]
    pub containers: Vec<ContainerReadiness>,
}

impl BrokerPod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ip: None,
            containers: Vec::new(),
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_container(mut self, name: impl Into<String>, ready: bool) -> Self {
        self.containers.push(ContainerReadiness {
            name: name.into(),
            ready,
        });
        self
    }

    /// Whether the named container reports ready
    pub fn is_container_ready(&self, container: &str) -> bool {
        self.containers
            .iter()
            .any(|c| c.name == container && c.ready)
    }
}

/// Read-only view of an instance's pod groups and pods
#[async_trait]
pub trait PodTopology: Send + Sync {
    /// Pod groups of `instance` within `scope`, oldest first
    async fn pod_groups(
        &self,
        instance: &ClusterInstance,
        scope: GroupScope,
    ) -> Result<Vec<PodGroup>, TopologyError>;

    /// Pods belonging to `group`, in a stable enumeration order
    async fn pods(
        &self,
        instance: &ClusterInstance,
        group: &PodGroup,
    ) -> Result<Vec<BrokerPod>, TopologyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_readiness_matches_by_name() {
        let pod = BrokerPod::new("emqx-0")
            .with_container("sidecar", true)
            .with_container("emqx", false);

        assert!(!pod.is_container_ready("emqx"));
        assert!(pod.is_container_ready("sidecar"));
        assert!(!pod.is_container_ready("missing"));
    }
}
