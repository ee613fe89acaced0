pub mod credentials;
pub mod deadline;
pub mod fleet;
pub mod gateway;
pub mod inventory;
pub mod naming;
pub mod orchestrator;
pub mod provider;
pub mod readiness;
pub mod types;
pub mod validation;
pub mod windows;

#[cfg(test)]
mod testing;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use deadline::Deadline;
pub use fleet::ManagementFleetController;
pub use orchestrator::{OrchestratorSettings, ProvisioningOrchestrator};
pub use provider::{ApiFamily, ApiResolution, ProviderRegistry};
pub use types::{
    CloudConfig, CloudCredentials, CloudNode, MachineRecord, NodeSpec, NodeStatus,
    ProvisionTemplate,
};
pub use validation::ValidationEngine;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `node_id` names a node the timed-out operation left behind, if any.
    #[error("timed out: {message}")]
    Timeout {
        message: String,
        node_id: Option<String>,
    },

    #[error("{message}: {source}")]
    CreationFailed {
        message: String,
        #[source]
        source: Box<Error>,
    },

    #[error("number of servers has exceeded allowed server limit ({limit})")]
    NameSpaceExhausted { limit: u32 },

    #[error("{0}")]
    InvalidConfiguration(String),

    #[error("found existing servers matching group {group}: {servers}")]
    ExistingFleet { group: String, servers: String },

    #[error("could not find any management machines for this cloud (management machine prefix is: {prefix})")]
    NoManagementMachines { prefix: String },

    #[error("control plane error: {0}")]
    ControlPlane(String),

    #[error("gateway error: {0}")]
    Gateway(#[from] compute_gateway::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not supported by this control plane: {0}")]
    Unsupported(&'static str),

    #[error("could not find key file: {}", .0.display())]
    KeyFileNotFound(PathBuf),

    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap `cause` as a creation failure, keeping it as the error source.
    pub fn creation_failed(message: impl Into<String>, cause: Error) -> Self {
        Self::CreationFailed {
            message: message.into(),
            source: Box::new(cause),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            node_id: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Node still alive after a timeout, for the caller to clean up.
    pub fn timed_out_node(&self) -> Option<&str> {
        match self {
            Self::Timeout { node_id, .. } => node_id.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Backend-agnostic interface to one cloud's compute control plane.
///
/// The provisioning core only talks to a cloud through this trait. An
/// implementation is assumed safe for concurrent use once constructed.
/// Provider-family lookups (EC2, OpenStack, CloudStack) default to
/// `Error::Unsupported` so a backend only implements the family it speaks.
#[async_trait]
pub trait ControlPlane: Send + Sync + 'static {
    /// Create a node tagged with `spec.name` / `spec.group`.
    async fn create_node(&self, spec: &NodeSpec) -> Result<CloudNode>;

    /// Current snapshot of a node, or `None` if the cloud does not know it.
    async fn get_node(&self, id: &str) -> Result<Option<CloudNode>>;

    async fn get_node_by_address(&self, address: &str) -> Result<Option<CloudNode>>;

    async fn destroy_node(&self, id: &str) -> Result<()>;

    async fn destroy_nodes_by_address(&self, addresses: &BTreeSet<String>) -> Result<()>;

    async fn destroy_node_and_wait(&self, id: &str, timeout: Duration) -> Result<()>;

    async fn list_nodes(&self) -> Result<Vec<CloudNode>>;

    /// Image ids visible to this account.
    async fn list_images(&self) -> Result<Vec<String>>;

    /// Hardware profile ids visible to this account.
    async fn list_hardware_profiles(&self) -> Result<Vec<String>>;

    /// Location ids new nodes can be placed in.
    async fn list_assignable_locations(&self) -> Result<Vec<String>>;

    /// Ask the cloud to synthesize a concrete template for the combination.
    /// Returns the location id the template resolved to.
    async fn resolve_template(
        &self,
        image_id: Option<&str>,
        hardware_id: Option<&str>,
        location_id: Option<&str>,
    ) -> Result<String>;

    async fn list_nodes_matching(
        &self,
        predicate: &(dyn for<'n> Fn(&'n CloudNode) -> bool + Send + Sync),
    ) -> Result<Vec<CloudNode>> {
        let nodes = self.list_nodes().await?;
        Ok(nodes.into_iter().filter(|n| predicate(n)).collect())
    }

    /// Find a node already carrying `name`.
    async fn find_node_by_name(&self, name: &str) -> Result<Option<CloudNode>> {
        let nodes = self.list_nodes().await?;
        Ok(nodes.into_iter().find(|n| n.name.as_deref() == Some(name)))
    }

    /// Location the cloud would pick when a template names none.
    async fn default_location(&self) -> Result<Option<String>> {
        self.resolve_template(None, None, None).await.map(Some)
    }

    /// EC2-style Windows administrator password, decrypted with the key the
    /// node was launched with. `None` while the instance has not produced it.
    async fn windows_password(&self, _node_id: &str, _private_key: &[u8]) -> Result<Option<String>> {
        Err(Error::Unsupported("windows password retrieval"))
    }

    /// EC2-style describe-by-name. An empty result means no such group.
    async fn ec2_security_groups(&self, _region: &str, _name: &str) -> Result<Vec<String>> {
        Err(Error::Unsupported("ec2 security groups"))
    }

    async fn ec2_key_pairs(&self, _region: &str, _name: &str) -> Result<Vec<String>> {
        Err(Error::Unsupported("ec2 key pairs"))
    }

    /// OpenStack-style zone extension listing. `None` when the zone lacks
    /// the extension.
    async fn openstack_security_groups(&self, _zone: &str) -> Result<Option<Vec<String>>> {
        Err(Error::Unsupported("openstack security groups"))
    }

    async fn openstack_key_pairs(&self, _zone: &str) -> Result<Option<Vec<String>>> {
        Err(Error::Unsupported("openstack key pairs"))
    }

    /// CloudStack-style global lookup by name.
    async fn cloudstack_security_group(&self, _name: &str) -> Result<Option<String>> {
        Err(Error::Unsupported("cloudstack security groups"))
    }

    async fn cloudstack_key_pair(&self, _name: &str) -> Result<Option<String>> {
        Err(Error::Unsupported("cloudstack key pairs"))
    }

    /// Release the underlying client. Further calls are not expected.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Builds authenticated control-plane clients.
///
/// Used by validation to check credentials and to build template-scoped
/// clients when a template carries its own client overrides.
#[async_trait]
pub trait ControlPlaneFactory: Send + Sync + 'static {
    async fn connect(
        &self,
        provider: &str,
        credentials: &CloudCredentials,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn ControlPlane>>;
}
