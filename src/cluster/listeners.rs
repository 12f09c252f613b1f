//! Listener reconciliation across broker nodes
//!
//! During a blue-green rollout the contacted node reports listeners for every
//! member it sees, old and new generation alike. Only listeners served by
//! every reporting node may be exposed, so per-node lists are folded through
//! a pairwise intersection keyed by bind address.
//!
//! All functions here are pure.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use k8s_openapi::api::core::v1::ServicePort;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PORT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\d+").unwrap());

/// One listener as reported by a broker node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Protocol tag, e.g. "mqtt:tcp", "mqtt:wss:8084", "mqtt-sn:udp"
    pub protocol: String,

    /// Bind address, e.g. "0.0.0.0:1883" or just "1883"
    pub listen_on: String,
}

impl ListenerConfig {
    pub fn new(protocol: impl Into<String>, listen_on: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            listen_on: listen_on.into(),
        }
    }
}

/// Listeners of one broker node, as found in the `api/v4/listeners` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeListeners {
    pub node: String,

    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
}

/// Transport-layer protocol of an exposed port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportProtocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl TransportProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportProtocol::Tcp => "TCP",
            TransportProtocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Datagram-based transport families a protocol tag may name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramFamily {
    /// Plain UDP, e.g. "coap:udp"
    Udp,
    /// DTLS over UDP, e.g. "mqtt:dtls"
    Dtls,
    /// MQTT-SN and other "sn" gateways
    SensorNetwork,
}

impl DatagramFamily {
    pub const ALL: [DatagramFamily; 3] = [
        DatagramFamily::Udp,
        DatagramFamily::Dtls,
        DatagramFamily::SensorNetwork,
    ];

    /// Substring identifying the family inside a protocol tag
    pub fn marker(self) -> &'static str {
        match self {
            DatagramFamily::Udp => "udp",
            DatagramFamily::Dtls => "dtls",
            DatagramFamily::SensorNetwork => "sn",
        }
    }

    /// The first family whose marker occurs in `tag`, ignoring case
    pub fn detect(tag: &str) -> Option<DatagramFamily> {
        let tag = tag.to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| tag.contains(f.marker()))
    }
}

/// Transport protocol implied by a listener's protocol tag
pub fn classify_protocol(tag: &str) -> TransportProtocol {
    match DatagramFamily::detect(tag) {
        Some(_) => TransportProtocol::Udp,
        None => TransportProtocol::Tcp,
    }
}

/// An externally exposable port derived from a listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Port name, e.g. "mqtt-wss-8084"
    pub name: String,
    pub protocol: TransportProtocol,
    /// Numeric port, 0 when the bind address carried no parsable port
    pub port: u16,
}

impl From<&PortSpec> for ServicePort {
    fn from(spec: &PortSpec) -> Self {
        ServicePort {
            name: Some(spec.name.clone()),
            protocol: Some(spec.protocol.as_str().to_string()),
            port: i32::from(spec.port),
            target_port: Some(IntOrString::Int(i32::from(spec.port))),
            ..Default::default()
        }
    }
}

/// Split "host:port", "[v6]:port" or ":port" into its parts
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        if port.contains(':') {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }
    Some((host, port))
}

/// Port text of a bind address. Falls back to the raw value when the address
/// has no colon or cannot be split.
pub fn bind_port_text(listen_on: &str) -> &str {
    if listen_on.contains(':') {
        split_host_port(listen_on)
            .map(|(_, port)| port)
            .unwrap_or(listen_on)
    } else {
        listen_on
    }
}

/// Port name from a protocol tag and port text.
///
/// Embedded `:<digits>` parts are dropped and the remaining colons become
/// hyphens: ("mqtt:wss:8084", "8084") gives "mqtt-wss-8084".
pub fn port_name(protocol: &str, port_text: &str) -> String {
    let stripped = PORT_SUFFIX.replace_all(protocol, "");
    format!("{}-{}", stripped.replace(':', "-"), port_text)
}

/// Derive the exposable port of a single listener
pub fn port_spec(listener: &ListenerConfig) -> PortSpec {
    let port_text = bind_port_text(&listener.listen_on);
    PortSpec {
        name: port_name(&listener.protocol, port_text),
        protocol: classify_protocol(&listener.protocol),
        port: port_text.parse().unwrap_or(0),
    }
}

/// Listeners of `right` whose bind address also appears in `left`, in
/// `right`'s order, each bind address at most once
pub fn intersect(left: &[ListenerConfig], right: &[ListenerConfig]) -> Vec<ListenerConfig> {
    let mut remaining: HashSet<&str> = left.iter().map(|l| l.listen_on.as_str()).collect();
    right
        .iter()
        .filter(|l| remaining.remove(l.listen_on.as_str()))
        .cloned()
        .collect()
}

/// Listeners common to every node, folding left over the reported order.
/// A single node's list is returned verbatim.
pub fn reconcile_listeners(nodes: &[NodeListeners]) -> Vec<ListenerConfig> {
    let mut lists = nodes.iter().map(|n| n.listeners.as_slice());
    let first = match lists.next() {
        Some(first) => first.to_vec(),
        None => return Vec::new(),
    };
    lists.fold(first, |acc, next| intersect(&acc, next))
}

/// Reconcile per-node listeners and derive their exposable ports
pub fn reconcile_ports(nodes: &[NodeListeners]) -> Vec<PortSpec> {
    reconcile_listeners(nodes).iter().map(port_spec).collect()
}
