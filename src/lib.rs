//! # emqx-bridge
//!
//! Control-plane bridge between a cluster operator and the EMQX management
//! API. It finds a ready broker pod of the newest generation, authenticates
//! with the bootstrap credential, and answers cluster-wide questions that stay
//! consistent while two generations coexist during a blue-green rollout.
//!
//! The bridge never creates, updates or deletes orchestration objects. It
//! reads pod topology and issues one HTTP request per operation.

pub mod cli;
pub mod client;
pub mod cluster;
pub mod config;
pub mod k8s;

pub use client::{AdminError, ControlPlaneClient, HttpTransport};
pub use cluster::{ClusterInstance, PodTopology};
pub use config::{BridgeConfig, Credential, SecretStore};
