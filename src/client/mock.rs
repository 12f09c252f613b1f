//! In-memory collaborators for unit tests (no I/O)

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::admin::{
    AdminError, AdminRequest, AdminResponse, AdminTarget, AdminTransport, ControlPlaneClient,
};
use crate::cluster::{BrokerPod, ClusterInstance, GroupScope, PodGroup, PodTopology, TopologyError};
use crate::config::{BridgeConfig, Credential, CredentialError, SecretStore};

/// Pod topology backed by fixed lists, recording the scopes it was asked for
#[derive(Default)]
pub struct MockTopology {
    tracked: Vec<PodGroup>,
    history: Vec<PodGroup>,
    pods: HashMap<String, Vec<BrokerPod>>,
    scopes: Mutex<Vec<GroupScope>>,
}

impl MockTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracked(mut self, groups: Vec<PodGroup>) -> Self {
        self.tracked = groups;
        self
    }

    pub fn with_history(mut self, groups: Vec<PodGroup>) -> Self {
        self.history = groups;
        self
    }

    pub fn with_pods(mut self, group: &PodGroup, pods: Vec<BrokerPod>) -> Self {
        self.pods.insert(group.uid.clone(), pods);
        self
    }

    /// One tracked group holding `pods`
    pub fn single_group(pods: Vec<BrokerPod>) -> Self {
        let group = PodGroup::new("emqx-a", "uid-a");
        Self::new().with_tracked(vec![group.clone()]).with_pods(&group, pods)
    }

    pub fn scopes(&self) -> Vec<GroupScope> {
        self.scopes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PodTopology for MockTopology {
    async fn pod_groups(
        &self,
        _instance: &ClusterInstance,
        scope: GroupScope,
    ) -> Result<Vec<PodGroup>, TopologyError> {
        self.scopes.lock().unwrap().push(scope);
        Ok(match scope {
            GroupScope::Tracked => self.tracked.clone(),
            GroupScope::History => self.history.clone(),
        })
    }

    async fn pods(
        &self,
        _instance: &ClusterInstance,
        group: &PodGroup,
    ) -> Result<Vec<BrokerPod>, TopologyError> {
        Ok(self.pods.get(&group.uid).cloned().unwrap_or_default())
    }
}

/// Admin transport replaying queued responses and recording requests.
/// Answers `200 {}` once the queue is drained.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<AdminResponse, String>>>,
    requests: Mutex<Vec<(AdminTarget, Credential, AdminRequest)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(AdminResponse {
            status,
            body: body.as_bytes().to_vec(),
        }));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<(AdminTarget, Credential, AdminRequest)> {
        self.requests.lock().unwrap().clone()
    }

    /// Body of the n-th request decoded as JSON
    pub fn json_body(&self, n: usize) -> serde_json::Value {
        let requests = self.requests.lock().unwrap();
        let body = requests[n].2.body.as_deref().unwrap_or(b"null");
        serde_json::from_slice(body).unwrap()
    }
}

#[async_trait]
impl AdminTransport for MockTransport {
    async fn send(
        &self,
        target: &AdminTarget,
        credential: &Credential,
        request: &AdminRequest,
    ) -> Result<AdminResponse, AdminError> {
        self.requests
            .lock()
            .unwrap()
            .push((target.clone(), credential.clone(), request.clone()));

        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(AdminError::Transport(message)),
            None => Ok(AdminResponse {
                status: 200,
                body: b"{}".to_vec(),
            }),
        }
    }
}

/// Secret store backed by a map of (namespace, name) to data entries
#[derive(Default)]
pub struct MockSecretStore {
    secrets: HashMap<(String, String), BTreeMap<String, Vec<u8>>>,
}

impl MockSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(
        mut self,
        namespace: &str,
        name: &str,
        key: &str,
        value: impl AsRef<[u8]>,
    ) -> Self {
        self.secrets
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.as_ref().to_vec());
        self
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, CredentialError> {
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                secret: name.to_string(),
                reason: "secrets not found".to_string(),
            })
    }
}

/// Build a client over mock collaborators, returning handles to inspect them
pub fn test_client(
    topology: MockTopology,
    transport: MockTransport,
) -> (ControlPlaneClient, Arc<MockTransport>, Arc<MockTopology>) {
    let topology = Arc::new(topology);
    let transport = Arc::new(transport);
    let client = ControlPlaneClient::new(
        Credential::new("emqx_operator_controller", "secret"),
        topology.clone(),
        transport.clone(),
        &BridgeConfig::default(),
    );
    (client, transport, topology)
}

/// A pod whose broker container is ready
pub fn ready_pod(name: &str, ip: &str) -> BrokerPod {
    BrokerPod::new(name).with_ip(ip).with_container("emqx", true)
}
