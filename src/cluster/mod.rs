//! # EMQX cluster view
//!
//! Everything the bridge knows or asks about a managed EMQX cluster.
//!
//! ## Resources
//!
//! - **ClusterInstance**: the managed cluster, read-only here
//! - **PodGroup**: one generation of the broker's pods; two coexist mid-rollout
//! - **BrokerPod**: one broker process, eligible as a request target when ready
//! - **BrokerNodeStatus**: the broker's own view of a cluster member
//!
//! ## Operations
//!
//! All operations go through [`crate::client::ControlPlaneClient`]:
//!
//! ```text
//!   state       list_nodes, listener_ports
//!   evacuation  start, status
//!   plugins     set_plugin_state, list_plugins
//! ```
//!
//! Each one issues at most one admin request and never retries; the outer
//! reconcile loop re-runs it on its own cadence.

pub mod evacuation;
pub mod instance;
pub mod listeners;
pub mod node;
pub mod plugins;
pub mod state;
pub mod topology;

pub use evacuation::{is_drained, EvacuationRequest, EvacuationSession, EvacuationStats};
pub use instance::{
    BlueGreenUpdate, ClusterInstance, Edition, EvacuationStrategy, InstanceMetadata, InstanceSpec,
    InstanceStatus,
};
pub use listeners::{
    classify_protocol, reconcile_listeners, reconcile_ports, DatagramFamily, ListenerConfig,
    NodeListeners, PortSpec, TransportProtocol,
};
pub use node::BrokerNodeStatus;
pub use plugins::{Plugin, PluginAction, PluginInfo};
pub use state::{list_nodes, listener_ports};
pub use topology::{BrokerPod, ContainerReadiness, GroupScope, PodGroup, PodTopology, TopologyError};
