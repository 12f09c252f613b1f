use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;

use crate::cluster::{
    BrokerNodeStatus, BrokerPod, ClusterInstance, EvacuationSession, GroupScope, PluginAction,
    PluginInfo, PodTopology, PortSpec, TopologyError,
};

#[derive(Parser, Debug)]
#[command(name = "emqx-bridge")]
#[command(about = "Query and drive an EMQX cluster through its management API")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.emqx-bridge/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to a .env file loaded before anything else
    #[arg(long, value_name = "FILE", global = true)]
    pub env_file: Option<PathBuf>,

    /// YAML file describing the cluster instance
    #[arg(short = 'f', long, value_name = "FILE", global = true)]
    pub instance_file: Option<PathBuf>,

    /// Instance name, used when no instance file is given
    #[arg(long, env = "EMQX_INSTANCE", global = true)]
    pub name: Option<String>,

    /// Instance namespace, used when no instance file is given
    #[arg(short, long, env = "EMQX_NAMESPACE", default_value = "default", global = true)]
    pub namespace: String,

    /// Override the admin request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List broker nodes
    Nodes,

    /// List listener ports served by every node
    Listeners,

    /// Show in-flight evacuations
    Evacuations,

    /// List plugins per node
    Plugins,

    /// Start evacuating a node onto the pods of the newest generation
    Evacuate(EvacuateArgs),

    /// Load, reload or unload a plugin on a node
    Plugin(PluginArgs),
}

#[derive(Parser, Debug)]
pub struct EvacuateArgs {
    /// Broker node to evacuate
    #[arg(long)]
    pub source: String,

    /// Destination pod names
    #[arg(long = "to", required = true, num_args = 1..)]
    pub to: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct PluginArgs {
    /// Broker node name
    pub node: String,

    /// Plugin name, e.g. emqx_prometheus
    pub plugin: String,

    /// One of load, reload, unload
    pub action: PluginAction,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Either --instance-file or --name is required")]
    MissingInstance,

    #[error("Failed to read instance file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse instance file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("Pods not found in the newest pod group: {0}")]
    PodsNotFound(String),
}

/// Instance from the instance file, or a bare one from --name/--namespace
pub fn resolve_instance(cli: &Cli) -> Result<ClusterInstance, CliError> {
    if let Some(ref path) = cli.instance_file {
        let content = std::fs::read_to_string(path)?;
        return Ok(serde_yaml::from_str(&content)?);
    }

    let name = cli.name.as_deref().ok_or(CliError::MissingInstance)?;
    Ok(ClusterInstance::new(name, cli.namespace.as_str(), ""))
}

/// Look up `names` among the pods of the newest tracked pod group
pub async fn resolve_pods(
    topology: &dyn PodTopology,
    instance: &ClusterInstance,
    names: &[String],
) -> Result<Vec<BrokerPod>, CliError> {
    let groups = topology.pod_groups(instance, GroupScope::Tracked).await?;
    let pods = match groups.last() {
        Some(group) => topology.pods(instance, group).await?,
        None => Vec::new(),
    };

    let missing: Vec<&str> = names
        .iter()
        .filter(|name| !pods.iter().any(|p| &p.name == *name))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(CliError::PodsNotFound(missing.join(", ")));
    }

    Ok(pods
        .into_iter()
        .filter(|p| names.contains(&p.name))
        .collect())
}

// ============================================================================
// SBIO: Pure display logic (no I/O - returns formatted strings)
// ============================================================================

/// Format a simple table with headers and rows
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No resources found.\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();
    let mut push_row = |cells: Vec<String>| {
        let line = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = width)
            })
            .collect::<Vec<_>>()
            .join("   ");
        output.push_str(line.trim_end());
        output.push('\n');
    };

    push_row(headers.iter().map(|h| h.to_uppercase()).collect());
    for row in rows {
        push_row(row);
    }

    output
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_nodes(nodes: &[BrokerNodeStatus]) -> String {
    let rows = nodes
        .iter()
        .map(|n| {
            vec![
                n.node.clone(),
                opt(&n.node_status),
                opt(&n.version),
                opt(&n.connections),
                opt(&n.uptime),
            ]
        })
        .collect();
    format_table(&["node", "status", "version", "connections", "uptime"], rows)
}

pub fn format_ports(ports: &[PortSpec]) -> String {
    let rows = ports
        .iter()
        .map(|p| vec![p.name.clone(), p.protocol.to_string(), p.port.to_string()])
        .collect();
    format_table(&["name", "protocol", "port"], rows)
}

pub fn format_evacuations(sessions: &[EvacuationSession]) -> String {
    let rows = sessions
        .iter()
        .map(|s| {
            vec![
                s.node.clone(),
                opt(&s.state),
                opt(&s.remaining_connections()),
                opt(&s.remaining_sessions()),
                s.session_recipients.join(","),
            ]
        })
        .collect();
    format_table(
        &["node", "state", "connections", "sessions", "recipients"],
        rows,
    )
}

pub fn format_plugins(infos: &[PluginInfo]) -> String {
    let rows = infos
        .iter()
        .flat_map(|info| {
            info.plugins.iter().map(move |p| {
                vec![
                    info.node.clone(),
                    p.name.clone(),
                    p.version.clone(),
                    if p.active { "active" } else { "inactive" }.to_string(),
                ]
            })
        })
        .collect();
    format_table(&["node", "plugin", "version", "state"], rows)
}
