use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Option key for the client endpoint override on private clouds.
pub const ENDPOINT_OVERRIDE: &str = "endpoint";

const SECURITY_GROUP_KEYS: [&str; 2] = ["securityGroupNames", "securityGroups"];
const KEY_PAIR_KEYS: [&str; 2] = ["keyPairName", "keyPair"];

/// Control-plane reported node status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Pending,
    Running,
    Suspended,
    Terminated,
    Error,
    Unrecognized,
}

impl NodeStatus {
    /// Parse a provider status string. Anything unknown is `Unrecognized`.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "SUSPENDED" => Self::Suspended,
            "TERMINATED" => Self::Terminated,
            "ERROR" => Self::Error,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Suspended => "SUSPENDED",
            Self::Terminated => "TERMINATED",
            Self::Error => "ERROR",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login identity a control plane returned for a node.
///
/// `password: None` means the cloud did not supply one, which is not the
/// same as `Some("")`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeCredentials {
    pub identity: Option<String>,
    pub password: Option<String>,
}

/// Snapshot of a machine as the control plane reports it.
#[derive(Debug, Clone)]
pub struct CloudNode {
    pub id: String,
    pub name: Option<String>,
    pub group: Option<String>,
    pub status: NodeStatus,
    pub private_addresses: Vec<String>,
    pub public_addresses: Vec<String>,
    pub location_id: Option<String>,
    pub credentials: Option<NodeCredentials>,
}

/// What the orchestrator asks the control plane to create.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub group: String,
    pub location_id: Option<String>,
    pub image_id: Option<String>,
    pub hardware_id: Option<String>,
    pub options: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTransferMode {
    #[default]
    Scp,
    Sftp,
    /// Windows file shares.
    Cifs,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteExecutionMode {
    #[default]
    Ssh,
    Winrm,
}

/// Declarative description of one class of machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProvisionTemplate {
    pub image_id: Option<String>,
    pub hardware_id: Option<String>,
    pub location_id: Option<String>,
    pub machine_memory_mb: Option<u32>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub file_transfer: FileTransferMode,
    pub remote_execution: RemoteExecutionMode,
    pub key_file: Option<String>,
    pub local_directory: Option<PathBuf>,
    pub upload_directory: Option<PathBuf>,
    /// Client properties (endpoint and other connection settings).
    pub overrides: BTreeMap<String, String>,
    /// Provider-specific creation options.
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ProvisionTemplate {
    pub fn endpoint(&self) -> Option<&str> {
        self.overrides
            .get(ENDPOINT_OVERRIDE)
            .map(String::as_str)
            .filter(|e| !e.trim().is_empty())
    }

    /// Whether the overrides hold anything besides the endpoint, in which
    /// case the template needs a client of its own.
    pub fn has_client_overrides(&self) -> bool {
        self.overrides.keys().any(|k| k != ENDPOINT_OVERRIDE)
    }

    /// Security group names from the first option key present.
    pub fn security_group_names(&self) -> Vec<String> {
        SECURITY_GROUP_KEYS
            .iter()
            .find_map(|key| self.options.get(*key))
            .map(string_list)
            .unwrap_or_default()
    }

    /// Key-pair name from the first option key present.
    pub fn key_pair_name(&self) -> Option<String> {
        KEY_PAIR_KEYS
            .iter()
            .find_map(|key| self.options.get(*key))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn string_list(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        serde_json::Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Output of a successful provisioning, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineRecord {
    pub machine_id: String,
    pub location_id: Option<String>,
    pub private_address: Option<String>,
    pub public_address: Option<String>,
    pub remote_username: Option<String>,
    pub remote_password: Option<String>,
    pub file_transfer: FileTransferMode,
    pub remote_execution: RemoteExecutionMode,
    pub agent_running: bool,
    pub software_installed: bool,
    pub installation_directory: Option<String>,
}

impl MachineRecord {
    /// `Machine ID: <id>, Public IP: <ip>, Private IP: <ip>`, skipping
    /// absent addresses.
    pub fn describe(&self) -> String {
        let mut out = format!("Machine ID: {}", self.machine_id);
        if let Some(ip) = &self.public_address {
            out.push_str(&format!(", Public IP: {ip}"));
        }
        if let Some(ip) = &self.private_address {
            out.push_str(&format!(", Private IP: {ip}"));
        }
        out
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudCredentials {
    pub identity: String,
    pub api_key: String,
}

fn default_max_servers() -> u32 {
    200
}

fn default_management_machines() -> usize {
    1
}

/// Cloud-wide configuration plus the named templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudConfig {
    /// Provider id, or an API id for private clouds.
    pub provider: String,
    pub user: CloudCredentials,
    #[serde(default)]
    pub management_group: String,
    #[serde(default)]
    pub machine_name_prefix: String,
    #[serde(default = "default_management_machines")]
    pub management_machines: usize,
    #[serde(default = "default_max_servers")]
    pub max_servers: u32,
    #[serde(default)]
    pub artifact_url: Option<String>,
    pub templates: BTreeMap<String, Arc<ProvisionTemplate>>,
}

impl CloudConfig {
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn template(&self, name: &str) -> crate::Result<Arc<ProvisionTemplate>> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| crate::Error::UnknownTemplate(name.to_string()))
    }
}
