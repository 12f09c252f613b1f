//! ClusterInstance - the managed EMQX cluster as seen by the bridge
//!
//! The instance is created and updated by the outer reconcile loop from a
//! declarative resource. The bridge only reads it to find:
//! - the pod groups and secret that belong to it
//! - whether its deployment flavor supports node evacuation
//! - the last node list it observed

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::node::BrokerNodeStatus;
use super::topology::BrokerPod;

/// Label carrying the owning instance name on every pod group and pod
pub const INSTANCE_LABEL: &str = "apps.emqx.io/instance";

/// Label marking objects managed by the operator
pub const MANAGED_BY_LABEL: &str = "apps.emqx.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY_VALUE: &str = "emqx-operator";

/// Suffix appended to the instance name to form the bootstrap secret name
pub const BOOTSTRAP_SECRET_SUFFIX: &str = "-bootstrap-user";

/// A managed EMQX cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInstance {
    /// Identity of the instance
    pub metadata: InstanceMetadata,

    /// Desired state, as declared by the user
    pub spec: InstanceSpec,

    /// Observed state, as recorded by the reconcile loop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<InstanceStatus>,
}

/// Name and namespace of an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Desired state of an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    /// Broker image, e.g. "emqx/emqx-ee:4.4.14"
    pub image: String,

    /// Deployment flavor of the broker
    #[serde(default)]
    pub edition: Edition,

    /// Prefix of the broker's own node names (the part before '@')
    #[serde(default = "default_node_prefix")]
    pub node_prefix: String,

    /// Blue-green update settings, only meaningful for editions that support it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue_green_update: Option<BlueGreenUpdate>,
}

fn default_node_prefix() -> String {
    "emqx".to_string()
}

/// Deployment flavor of the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    /// Open-source broker, rolling updates only
    #[default]
    Open,
    /// Enterprise broker, supports blue-green updates with evacuation
    Enterprise,
}

impl Edition {
    /// Whether the broker exposes the load-rebalance/evacuation API
    pub fn supports_evacuation(self) -> bool {
        matches!(self, Edition::Enterprise)
    }
}

/// Blue-green update configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueGreenUpdate {
    /// Seconds to wait after the new generation is ready before evacuating
    #[serde(default)]
    pub initial_delay_seconds: u32,

    pub evacuation_strategy: EvacuationStrategy,
}

/// Rate limits and grace period used when evacuating a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacuationStrategy {
    /// Connections evicted per second
    pub conn_evict_rate: u32,

    /// Sessions evicted per second
    pub sess_evict_rate: u32,

    /// Seconds to wait for clients to take over their sessions. Unset or zero
    /// leaves the broker default in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_takeover: Option<u32>,
}

/// Observed state of an instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    /// Node list as last observed through the admin API. `None` until the
    /// first successful node query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emqx_nodes: Option<Vec<BrokerNodeStatus>>,
}

impl ClusterInstance {
    /// Create an open-edition instance with no observed status
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            metadata: InstanceMetadata {
                name: name.into(),
                namespace: namespace.into(),
            },
            spec: InstanceSpec {
                image: image.into(),
                edition: Edition::Open,
                node_prefix: default_node_prefix(),
                blue_green_update: None,
            },
            status: None,
        }
    }

    /// Switch to the enterprise edition with the given evacuation strategy
    pub fn with_evacuation(mut self, strategy: EvacuationStrategy) -> Self {
        self.spec.edition = Edition::Enterprise;
        self.spec.blue_green_update = Some(BlueGreenUpdate {
            initial_delay_seconds: 0,
            evacuation_strategy: strategy,
        });
        self
    }

    /// Record an observed node list
    pub fn with_observed_nodes(mut self, nodes: Vec<BrokerNodeStatus>) -> Self {
        self.status
            .get_or_insert_with(InstanceStatus::default)
            .emqx_nodes = Some(nodes);
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Node list last observed by the reconcile loop, if any
    pub fn observed_nodes(&self) -> Option<&[BrokerNodeStatus]> {
        self.status.as_ref()?.emqx_nodes.as_deref()
    }

    /// The evacuation strategy, if this instance's flavor supports evacuation
    /// and one is configured
    pub fn evacuation_strategy(&self) -> Option<&EvacuationStrategy> {
        if !self.spec.edition.supports_evacuation() {
            return None;
        }
        self.spec
            .blue_green_update
            .as_ref()
            .map(|bg| &bg.evacuation_strategy)
    }

    /// Name of the secret holding the bootstrap admin credential
    pub fn bootstrap_secret_name(&self) -> String {
        format!("{}{}", self.metadata.name, BOOTSTRAP_SECRET_SUFFIX)
    }

    /// Name of the headless service giving pods stable DNS names
    pub fn headless_service_name(&self) -> String {
        format!("{}-headless", self.metadata.name)
    }

    /// Labels shared by every pod group and pod of this instance
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (INSTANCE_LABEL.to_string(), self.metadata.name.clone()),
            (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        ])
    }

    /// Label selector string for list queries
    pub fn label_selector(&self) -> String {
        self.selector_labels()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The broker node name hosted by `pod`
    pub fn node_name_for(&self, pod: &BrokerPod) -> String {
        format!(
            "{}@{}.{}.{}.svc.cluster.local",
            self.spec.node_prefix,
            pod.name,
            self.headless_service_name(),
            self.metadata.namespace
        )
    }
}
