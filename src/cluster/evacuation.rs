//! Node evacuation during blue-green updates
//!
//! Evacuation moves connections and sessions off a node that is about to be
//! retired onto nodes of the new generation. The broker owns the process once
//! started; the bridge only starts it and polls its status:
//!
//! ```text
//! not-evacuating --start--> evacuating --(broker done/cancelled)--> not-evacuating
//! ```
//!
//! A node counts as drained once it no longer appears in [`status`].

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::instance::{ClusterInstance, EvacuationStrategy};
use super::topology::BrokerPod;
use crate::client::{AdminError, AdminRequest, ControlPlaneClient};

pub const EVACUATION_STATUS_PATH: &str = "api/v4/load_rebalance/global_status";

/// Path starting evacuation of `node`
pub fn evacuation_start_path(node: &str) -> String {
    format!("api/v4/load_rebalance/{}/evacuation/start", node)
}

/// Body of an evacuation start request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvacuationRequest {
    pub conn_evict_rate: u32,
    pub sess_evict_rate: u32,
    /// Broker nodes taking over the evacuated clients
    pub migrate_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_takeover: Option<u32>,
}

impl EvacuationRequest {
    /// Build the request for moving clients onto `destinations`.
    /// A zero takeover wait is dropped so the broker applies its default.
    pub fn new(strategy: &EvacuationStrategy, destinations: Vec<String>) -> Self {
        Self {
            conn_evict_rate: strategy.conn_evict_rate,
            sess_evict_rate: strategy.sess_evict_rate,
            migrate_to: destinations,
            wait_takeover: strategy.wait_takeover.filter(|secs| *secs > 0),
        }
    }
}

/// Progress counters of an evacuation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvacuationStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_sessions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_connected: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_sessions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_connected: Option<u64>,
}

/// An in-flight evacuation as reported by the broker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvacuationSession {
    /// Node being evacuated
    #[serde(default)]
    pub node: String,

    /// Broker-side phase, e.g. "evicting_conns", "waiting_takeover", "evicting_sessions"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default)]
    pub stats: EvacuationStats,

    /// Destination nodes for sessions
    #[serde(default)]
    pub session_recipients: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_goal: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_eviction_rate: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_goal: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_eviction_rate: Option<u64>,
}

impl EvacuationSession {
    pub fn is_for(&self, node: &str) -> bool {
        self.node == node
    }

    /// Connections still to be evicted, if reported
    pub fn remaining_connections(&self) -> Option<u64> {
        self.stats.current_connected
    }

    /// Sessions still to be evicted, if reported
    pub fn remaining_sessions(&self) -> Option<u64> {
        self.stats.current_sessions
    }
}

/// Whether `node` has no evacuation in flight
pub fn is_drained(sessions: &[EvacuationSession], node: &str) -> bool {
    !sessions.iter().any(|s| s.is_for(node))
}

/// Start evacuating `source_node` onto the broker nodes hosted by
/// `destination_pods`.
///
/// Fails with [`AdminError::UnsupportedOperation`] without any network call
/// when the instance's flavor has no evacuation strategy.
pub async fn start(
    client: &ControlPlaneClient,
    instance: &ClusterInstance,
    destination_pods: &[BrokerPod],
    source_node: &str,
) -> Result<(), AdminError> {
    let request = start_request(instance, destination_pods, source_node)?;

    info!(
        "Starting evacuation of {} onto {} nodes",
        source_node,
        destination_pods.len()
    );

    client.send(instance, &request).await?.ensure_success()?;
    Ok(())
}

/// Build the evacuation start request without sending it
pub fn start_request(
    instance: &ClusterInstance,
    destination_pods: &[BrokerPod],
    source_node: &str,
) -> Result<AdminRequest, AdminError> {
    let strategy = instance.evacuation_strategy().ok_or_else(|| {
        AdminError::UnsupportedOperation(format!(
            "evacuation requires the enterprise edition with a blue-green evacuation strategy ({})",
            instance.name()
        ))
    })?;

    let destinations = destination_pods
        .iter()
        .map(|pod| instance.node_name_for(pod))
        .collect();

    AdminRequest::new(Method::POST, evacuation_start_path(source_node))
        .json(&EvacuationRequest::new(strategy, destinations))
}

/// Evacuations currently in flight across the cluster
pub async fn status(
    client: &ControlPlaneClient,
    instance: &ClusterInstance,
) -> Result<Vec<EvacuationSession>, AdminError> {
    let response = client
        .call(instance, Method::GET, EVACUATION_STATUS_PATH, None)
        .await?
        .ensure_success()?;

    let sessions: Vec<EvacuationSession> = response.field("evacuations")?;
    debug!("{} evacuations in flight", sessions.len());
    Ok(sessions)
}
