use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cluster::{BrokerPod, ClusterInstance, GroupScope, PodTopology, TopologyError};
use crate::config::{
    resolve_bootstrap_credential, BridgeConfig, Credential, CredentialError, SecretStore,
};

/// Cluster node listing. Also the only query allowed to fall back to the
/// instance's full pod group history.
pub const NODES_PATH: &str = "api/v4/nodes";

// ============================================================================
// Data structures (pure, no I/O)
// ============================================================================

#[derive(Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("No pods found for {0}")]
    PodSetEmpty(String),

    #[error("No ready pod in pod group {0}")]
    PodNotReady(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Request failed with status {status}")]
    RequestFailed { status: u16 },

    #[error("Failed to decode response: {0}")]
    DecodeFailed(String),

    #[error("Failed to encode request: {0}")]
    EncodeFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl AdminError {
    /// Whether a later reconcile pass is expected to succeed without any
    /// configuration change
    pub fn is_transient(&self) -> bool {
        matches!(self, AdminError::PodNotReady(_) | AdminError::Transport(_))
    }
}

/// A single admin API request
#[derive(Debug, Clone, PartialEq)]
pub struct AdminRequest {
    pub method: Method,
    /// Path relative to the API root, e.g. "api/v4/nodes"
    pub path: String,
    pub body: Option<Vec<u8>>,
}

impl AdminRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Attach a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, AdminError> {
        let encoded =
            serde_json::to_vec(body).map_err(|e| AdminError::EncodeFailed(e.to_string()))?;
        self.body = Some(encoded);
        Ok(self)
    }
}

/// Raw admin API response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl AdminResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx status into [`AdminError::RequestFailed`]
    pub fn ensure_success(self) -> Result<Self, AdminError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(AdminError::RequestFailed {
                status: self.status,
            })
        }
    }

    /// Decode the value stored under the top-level `key` of a JSON body
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Result<T, AdminError> {
        let mut value: serde_json::Value = serde_json::from_slice(&self.body)
            .map_err(|e| AdminError::DecodeFailed(e.to_string()))?;

        let field = value
            .get_mut(key)
            .map(serde_json::Value::take)
            .ok_or_else(|| AdminError::DecodeFailed(format!("missing field `{}`", key)))?;

        serde_json::from_value(field).map_err(|e| AdminError::DecodeFailed(e.to_string()))
    }
}

/// Where a request is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminTarget {
    /// Name of the pod hosting the admin API
    pub pod: String,
    pub address: String,
    pub port: u16,
}

impl AdminTarget {
    pub fn url(&self, path: &str) -> String {
        let host = if self.address.contains(':') {
            format!("[{}]", self.address)
        } else {
            self.address.clone()
        };
        format!("http://{}:{}/{}", host, self.port, path.trim_start_matches('/'))
    }
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

#[async_trait]
pub trait AdminTransport: Send + Sync {
    /// Issue exactly one request. Non-2xx statuses are returned, not raised.
    async fn send(
        &self,
        target: &AdminTarget,
        credential: &Credential,
        request: &AdminRequest,
    ) -> Result<AdminResponse, AdminError>;
}

// ============================================================================
// SBIO: I/O implementation (real HTTP client)
// ============================================================================

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Every request is bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self, AdminError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdminError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AdminTransport for HttpTransport {
    async fn send(
        &self,
        target: &AdminTarget,
        credential: &Credential,
        request: &AdminRequest,
    ) -> Result<AdminResponse, AdminError> {
        let url = target.url(&request.path);

        let mut req = self
            .client
            .request(request.method.clone(), &url)
            .basic_auth(&credential.username, Some(&credential.password));

        if let Some(ref body) = request.body {
            req = req
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = req
            .send()
            .await
            .map_err(|e| AdminError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| AdminError::Transport(e.to_string()))?;

        Ok(AdminResponse {
            status,
            body: body.to_vec(),
        })
    }
}

// ============================================================================
// Control plane client
// ============================================================================

/// Resolved credential plus the collaborators needed to reach the admin API.
///
/// Target pods are recomputed on every call; the credential is fixed for the
/// client's lifetime.
#[derive(Clone)]
pub struct ControlPlaneClient {
    credential: Credential,
    topology: Arc<dyn PodTopology>,
    transport: Arc<dyn AdminTransport>,
    admin_port: u16,
    admin_container: String,
}

impl ControlPlaneClient {
    pub fn new(
        credential: Credential,
        topology: Arc<dyn PodTopology>,
        transport: Arc<dyn AdminTransport>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            credential,
            topology,
            transport,
            admin_port: config.admin_port,
            admin_container: config.admin_container.clone(),
        }
    }

    /// Resolve the bootstrap credential of `instance` and build a client
    pub async fn connect(
        instance: &ClusterInstance,
        topology: Arc<dyn PodTopology>,
        secrets: &dyn SecretStore,
        transport: Arc<dyn AdminTransport>,
        config: &BridgeConfig,
    ) -> Result<Self, AdminError> {
        let credential =
            resolve_bootstrap_credential(secrets, instance, &config.bootstrap_username).await?;
        Ok(Self::new(credential, topology, transport, config))
    }

    pub fn username(&self) -> &str {
        &self.credential.username
    }

    pub fn topology(&self) -> &dyn PodTopology {
        self.topology.as_ref()
    }

    /// Pick the pod that will serve a request for `path`.
    ///
    /// Uses the newest pod group and its first pod whose admin container is
    /// ready. Node listing falls back to the full group history while the
    /// instance has no observed node list yet. No other group is tried when
    /// the newest one has no ready pod.
    pub async fn select_target(
        &self,
        instance: &ClusterInstance,
        path: &str,
    ) -> Result<BrokerPod, AdminError> {
        let scope = if path.trim_start_matches('/') == NODES_PATH
            && instance.observed_nodes().is_none()
        {
            GroupScope::History
        } else {
            GroupScope::Tracked
        };

        let groups = self.topology.pod_groups(instance, scope).await?;
        let group = groups.last().ok_or_else(|| {
            AdminError::PodSetEmpty(format!("{}/{}", instance.namespace(), instance.name()))
        })?;

        let pods = self.topology.pods(instance, group).await?;
        if pods.is_empty() {
            return Err(AdminError::PodSetEmpty(group.name.clone()));
        }

        match pods
            .into_iter()
            .find(|pod| pod.is_container_ready(&self.admin_container))
        {
            Some(pod) => {
                debug!(
                    "Selected pod {} of group {} ({:?} scope)",
                    pod.name, group.name, scope
                );
                Ok(pod)
            }
            None => {
                warn!(
                    "No ready {} container in pod group {}",
                    self.admin_container, group.name
                );
                Err(AdminError::PodNotReady(group.name.clone()))
            }
        }
    }

    /// Send one admin request to a ready pod of `instance`
    pub async fn call(
        &self,
        instance: &ClusterInstance,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<AdminResponse, AdminError> {
        let request = AdminRequest {
            method,
            path: path.to_string(),
            body,
        };
        self.send(instance, &request).await
    }

    pub(crate) async fn send(
        &self,
        instance: &ClusterInstance,
        request: &AdminRequest,
    ) -> Result<AdminResponse, AdminError> {
        let pod = self.select_target(instance, &request.path).await?;
        let address = pod
            .ip
            .ok_or_else(|| AdminError::Transport(format!("pod {} has no IP address", pod.name)))?;

        let target = AdminTarget {
            pod: pod.name,
            address,
            port: self.admin_port,
        };

        debug!("{} {} via pod {}", request.method, request.path, target.pod);
        self.transport.send(&target, &self.credential, request).await
    }
}
