//! Cluster-wide reads: node list and reconciled listener ports

use reqwest::Method;
use tracing::debug;

use super::instance::ClusterInstance;
use super::listeners::{reconcile_ports, NodeListeners, PortSpec};
use super::node::BrokerNodeStatus;
use crate::client::{AdminError, ControlPlaneClient, NODES_PATH};

pub const LISTENERS_PATH: &str = "api/v4/listeners";

/// Node list as reported by one live member.
///
/// Any running member answers this for the whole cluster, so no cross-node
/// reconciliation is done.
pub async fn list_nodes(
    client: &ControlPlaneClient,
    instance: &ClusterInstance,
) -> Result<Vec<BrokerNodeStatus>, AdminError> {
    let response = client
        .call(instance, Method::GET, NODES_PATH, None)
        .await?
        .ensure_success()?;

    let nodes: Vec<BrokerNodeStatus> = response.field("data")?;
    debug!("{} reports {} broker nodes", instance.name(), nodes.len());
    Ok(nodes)
}

/// Raw per-node listener lists
pub async fn list_node_listeners(
    client: &ControlPlaneClient,
    instance: &ClusterInstance,
) -> Result<Vec<NodeListeners>, AdminError> {
    let response = client
        .call(instance, Method::GET, LISTENERS_PATH, None)
        .await?
        .ensure_success()?;

    response.field("data")
}

/// Ports served by every node the contacted member reports
pub async fn listener_ports(
    client: &ControlPlaneClient,
    instance: &ClusterInstance,
) -> Result<Vec<PortSpec>, AdminError> {
    let nodes = list_node_listeners(client, instance).await?;
    let ports = reconcile_ports(&nodes);
    debug!(
        "{} listener ports common to {} nodes",
        ports.len(),
        nodes.len()
    );
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{ready_pod, test_client, MockTopology, MockTransport};
    use crate::cluster::TransportProtocol;

    fn instance() -> ClusterInstance {
        ClusterInstance::new("emqx", "default", "emqx/emqx:4.4.14")
            .with_observed_nodes(vec![BrokerNodeStatus::named("emqx@a")])
    }

    fn topology() -> MockTopology {
        MockTopology::single_group(vec![ready_pod("emqx-a-0", "10.0.0.1")])
    }

    #[tokio::test]
    async fn test_list_nodes() {
        let body = r#"{"code": 0, "data": [
            {"node": "emqx@emqx-a-0.emqx-headless.default.svc.cluster.local", "node_status": "Running", "version": "4.4.14"},
            {"node": "emqx@emqx-a-1.emqx-headless.default.svc.cluster.local", "node_status": "Stopped"}
        ]}"#;
        let (client, transport, _) =
            test_client(topology(), MockTransport::new().respond(200, body));

        let nodes = list_nodes(&client, &instance()).await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].is_running());
        assert!(!nodes[1].is_running());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].2.method, Method::GET);
        assert_eq!(requests[0].2.path, NODES_PATH);
    }

    #[tokio::test]
    async fn test_list_nodes_error_status() {
        let (client, _, _) = test_client(topology(), MockTransport::new().respond(401, ""));

        let result = list_nodes(&client, &instance()).await;
        assert!(matches!(result, Err(AdminError::RequestFailed { status: 401 })));
    }

    #[tokio::test]
    async fn test_list_nodes_malformed_body() {
        let (client, _, _) =
            test_client(topology(), MockTransport::new().respond(200, r#"{"data": "nope"}"#));

        let result = list_nodes(&client, &instance()).await;
        assert!(matches!(result, Err(AdminError::DecodeFailed(_))));
    }

    #[tokio::test]
    async fn test_listener_ports_during_rollout() {
        let body = r#"{"code": 0, "data": [
            {"node": "emqx@old-0", "listeners": [
                {"protocol": "mqtt:tcp", "listen_on": "0.0.0.0:1883"},
                {"protocol": "mqtt:wss:8084", "listen_on": "0.0.0.0:8084"}
            ]},
            {"node": "emqx@new-0", "listeners": [
                {"protocol": "mqtt:wss:8084", "listen_on": "0.0.0.0:8084"},
                {"protocol": "mqtt-sn:udp", "listen_on": "0.0.0.0:1884"}
            ]}
        ]}"#;
        let (client, transport, _) =
            test_client(topology(), MockTransport::new().respond(200, body));

        let ports = listener_ports(&client, &instance()).await.unwrap();
        assert_eq!(
            ports,
            vec![PortSpec {
                name: "mqtt-wss-8084".to_string(),
                protocol: TransportProtocol::Tcp,
                port: 8084,
            }]
        );
        assert_eq!(transport.requests()[0].2.path, LISTENERS_PATH);
    }

    #[tokio::test]
    async fn test_listener_ports_malformed_data() {
        let body = r#"{"code": 0, "data": [{"node": "emqx@a", "listeners": "0.0.0.0:1883"}]}"#;
        let (client, _, _) = test_client(topology(), MockTransport::new().respond(200, body));

        let result = listener_ports(&client, &instance()).await;
        assert!(matches!(result, Err(AdminError::DecodeFailed(_))));
    }

    #[tokio::test]
    async fn test_listener_ports_transport_failure() {
        let (client, _, _) =
            test_client(topology(), MockTransport::new().fail("connection refused"));

        let result = listener_ports(&client, &instance()).await;
        assert!(matches!(result, Err(ref e) if e.is_transient()));
    }
}
