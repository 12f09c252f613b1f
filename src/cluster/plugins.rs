//! Broker plugin management

use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::instance::ClusterInstance;
use crate::client::{AdminError, ControlPlaneClient};

pub const PLUGINS_PATH: &str = "api/v4/plugins";

/// State change requested for a plugin on one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginAction {
    Load,
    Reload,
    Unload,
}

impl PluginAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PluginAction::Load => "load",
            PluginAction::Reload => "reload",
            PluginAction::Unload => "unload",
        }
    }
}

impl fmt::Display for PluginAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "load" => Ok(PluginAction::Load),
            "reload" => Ok(PluginAction::Reload),
            "unload" => Ok(PluginAction::Unload),
            other => Err(format!("unknown plugin action '{}'", other)),
        }
    }
}

/// Path applying `action` to `plugin` on `node`
pub fn plugin_action_path(node: &str, plugin: &str, action: PluginAction) -> String {
    format!("api/v4/nodes/{}/plugins/{}/{}", node, plugin, action)
}

/// One plugin installed on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub description: String,

    /// Whether the plugin is currently loaded
    #[serde(default)]
    pub active: bool,

    /// Plugin category, e.g. "auth", "bridge", "protocol"
    #[serde(rename = "type", default)]
    pub plugin_type: String,
}

/// Plugins of one broker node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub node: String,

    #[serde(default)]
    pub plugins: Vec<Plugin>,
}

impl PluginInfo {
    /// Whether `name` is installed and loaded on this node
    pub fn is_active(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name == name && p.active)
    }
}

/// Load, reload or unload `plugin` on `node`
pub async fn set_plugin_state(
    client: &ControlPlaneClient,
    instance: &ClusterInstance,
    node: &str,
    plugin: &str,
    action: PluginAction,
) -> Result<(), AdminError> {
    let path = plugin_action_path(node, plugin, action);
    client
        .call(instance, Method::PUT, &path, None)
        .await?
        .ensure_success()?;

    info!("Plugin {} {}ed on {}", plugin, action, node);
    Ok(())
}

/// Plugins installed on every node
pub async fn list_plugins(
    client: &ControlPlaneClient,
    instance: &ClusterInstance,
) -> Result<Vec<PluginInfo>, AdminError> {
    client
        .call(instance, Method::GET, PLUGINS_PATH, None)
        .await?
        .ensure_success()?
        .field("data")
}
