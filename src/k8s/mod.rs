//! Kubernetes-backed pod topology and secret lookup
//!
//! Pod groups are the StatefulSets carrying the instance's labels. Kubernetes
//! has no direct "pods of a StatefulSet" query, so pods are listed by label
//! and filtered by owner reference UID.
//!
//! A group is tracked once one of its pods hosts a broker node listed in the
//! instance's observed status. History is every labelled group.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use crate::cluster::{
    BrokerPod, ClusterInstance, ContainerReadiness, GroupScope, PodGroup, PodTopology,
    TopologyError,
};
use crate::config::{CredentialError, SecretStore};

/// Reads pod groups, pods and secrets through the Kubernetes API
#[derive(Clone)]
pub struct KubeTopology {
    client: Client,
}

impl KubeTopology {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the in-cluster config or the local kubeconfig
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }
}

// ============================================================================
// Pure conversions
// ============================================================================

/// Pod groups of `sets`, oldest first
pub fn order_groups(mut sets: Vec<StatefulSet>) -> Vec<PodGroup> {
    sets.sort_by(|a, b| {
        let created = |s: &StatefulSet| s.metadata.creation_timestamp.as_ref().map(|t| t.0);
        created(a)
            .cmp(&created(b))
            .then_with(|| a.name_any().cmp(&b.name_any()))
    });
    sets.iter()
        .filter_map(|sts| Some(PodGroup::new(sts.name_any(), sts.uid()?)))
        .collect()
}

/// Whether `pod` is owned by the StatefulSet with `uid`
pub fn is_owned_by(pod: &Pod, uid: &str) -> bool {
    pod.owner_references()
        .iter()
        .any(|owner| owner.kind == "StatefulSet" && owner.uid == uid)
}

/// Groups owning at least one pod whose broker node `instance` has observed,
/// in their original order. Nothing is tracked before any node is observed.
pub fn tracked_groups(
    groups: Vec<PodGroup>,
    pods: &[Pod],
    instance: &ClusterInstance,
) -> Vec<PodGroup> {
    let observed: HashSet<&str> = instance
        .observed_nodes()
        .unwrap_or_default()
        .iter()
        .map(|n| n.node.as_str())
        .collect();

    groups
        .into_iter()
        .filter(|group| {
            pods.iter().any(|pod| {
                is_owned_by(pod, &group.uid)
                    && observed.contains(instance.node_name_for(&broker_pod(pod)).as_str())
            })
        })
        .collect()
}

/// The parts of a pod's status the bridge uses
pub fn broker_pod(pod: &Pod) -> BrokerPod {
    let status = pod.status.as_ref();
    BrokerPod {
        name: pod.name_any(),
        ip: status.and_then(|s| s.pod_ip.clone()),
        containers: status
            .and_then(|s| s.container_statuses.as_ref())
            .map(|statuses| {
                statuses
                    .iter()
                    .map(|c| ContainerReadiness {
                        name: c.name.clone(),
                        ready: c.ready,
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

// ============================================================================
// I/O implementations
// ============================================================================

/// Every pod carrying the instance's labels
async fn api_pods(client: &Client, instance: &ClusterInstance) -> Result<Vec<Pod>, kube::Error> {
    let api: Api<Pod> = Api::namespaced(client.clone(), instance.namespace());
    let params = ListParams::default().labels(&instance.label_selector());
    Ok(api.list(&params).await?.items)
}

#[async_trait]
impl PodTopology for KubeTopology {
    async fn pod_groups(
        &self,
        instance: &ClusterInstance,
        scope: GroupScope,
    ) -> Result<Vec<PodGroup>, TopologyError> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), instance.namespace());
        let params = ListParams::default().labels(&instance.label_selector());

        let sets = api.list(&params).await.map_err(|e| {
            TopologyError::ListGroups(
                format!("{}/{}", instance.namespace(), instance.name()),
                e.to_string(),
            )
        })?;

        let mut groups = order_groups(sets.items);
        if scope == GroupScope::Tracked {
            let pods = api_pods(&self.client, instance).await.map_err(|e| {
                TopologyError::ListGroups(
                    format!("{}/{}", instance.namespace(), instance.name()),
                    e.to_string(),
                )
            })?;
            groups = tracked_groups(groups, &pods, instance);
        }
        debug!(
            "{} has {} pod groups ({:?} scope)",
            instance.name(),
            groups.len(),
            scope
        );
        Ok(groups)
    }

    async fn pods(
        &self,
        instance: &ClusterInstance,
        group: &PodGroup,
    ) -> Result<Vec<BrokerPod>, TopologyError> {
        let pods = api_pods(&self.client, instance)
            .await
            .map_err(|e| TopologyError::ListPods(group.name.clone(), e.to_string()))?;

        let mut owned: Vec<BrokerPod> = pods
            .iter()
            .filter(|pod| is_owned_by(pod, &group.uid))
            .map(broker_pod)
            .collect();
        owned.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(owned)
    }
}

#[async_trait]
impl SecretStore for KubeTopology {
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, CredentialError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get(name).await.map_err(|e| CredentialError::NotFound {
            secret: name.to_string(),
            reason: e.to_string(),
        })?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }
}
