use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use compute_gateway::{
    ConnectRequest, CreateNodeRequest, DeleteNodesRequest, GatewayClient, Node,
    ResolveTemplateRequest,
};

use crate::types::{CloudCredentials, CloudNode, NodeCredentials, NodeSpec, NodeStatus};
use crate::{ControlPlane, ControlPlaneFactory, Error, Result};

/// Control plane backed by one compute-gateway session.
///
/// Delegates to `compute_gateway::GatewayClient` for all HTTP calls.
pub struct GatewayControlPlane {
    client: GatewayClient,
}

impl GatewayControlPlane {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }

    fn to_node(node: Node) -> CloudNode {
        CloudNode {
            status: NodeStatus::parse(&node.status),
            location_id: node.location.map(|l| l.id),
            credentials: node.credentials.map(|c| NodeCredentials {
                identity: c.identity,
                password: c.password,
            }),
            id: node.id,
            name: node.name,
            group: node.group,
            private_addresses: node.private_addresses,
            public_addresses: node.public_addresses,
        }
    }

    fn first_node(nodes: Vec<Node>) -> Option<CloudNode> {
        nodes.into_iter().next().map(Self::to_node)
    }
}

#[async_trait]
impl ControlPlane for GatewayControlPlane {
    async fn create_node(&self, spec: &NodeSpec) -> Result<CloudNode> {
        let node = self
            .client
            .create_node(&CreateNodeRequest {
                name: spec.name.clone(),
                group: spec.group.clone(),
                location_id: spec.location_id.clone(),
                image_id: spec.image_id.clone(),
                hardware_id: spec.hardware_id.clone(),
                options: spec.options.clone(),
            })
            .await?;

        info!(node_id = %node.id, status = %node.status, provider = self.client.provider(), "gateway: node created");
        Ok(Self::to_node(node))
    }

    async fn get_node(&self, id: &str) -> Result<Option<CloudNode>> {
        Ok(self.client.get_node(id).await?.map(Self::to_node))
    }

    async fn get_node_by_address(&self, address: &str) -> Result<Option<CloudNode>> {
        let nodes = self.client.find_nodes(&[("address", address)]).await?;
        Ok(Self::first_node(nodes))
    }

    async fn destroy_node(&self, id: &str) -> Result<()> {
        self.client.delete_node(id).await?;
        info!(node_id = %id, "gateway: node destroyed");
        Ok(())
    }

    async fn destroy_nodes_by_address(&self, addresses: &BTreeSet<String>) -> Result<()> {
        self.client
            .delete_nodes_by_address(&DeleteNodesRequest {
                addresses: addresses.iter().cloned().collect(),
            })
            .await?;
        info!(count = addresses.len(), "gateway: nodes destroyed by address");
        Ok(())
    }

    async fn destroy_node_and_wait(&self, id: &str, timeout: Duration) -> Result<()> {
        self.client.delete_node_and_wait(id, timeout.as_secs()).await?;
        info!(node_id = %id, "gateway: node destroyed and gone");
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<CloudNode>> {
        let nodes = self.client.list_nodes().await?;
        Ok(nodes.into_iter().map(Self::to_node).collect())
    }

    async fn find_node_by_name(&self, name: &str) -> Result<Option<CloudNode>> {
        let nodes = self.client.find_nodes(&[("name", name)]).await?;
        Ok(Self::first_node(nodes))
    }

    async fn list_images(&self) -> Result<Vec<String>> {
        let images = self.client.list_images().await?;
        Ok(images.into_iter().map(|i| i.id).collect())
    }

    async fn list_hardware_profiles(&self) -> Result<Vec<String>> {
        let hardware = self.client.list_hardware().await?;
        Ok(hardware.into_iter().map(|h| h.id).collect())
    }

    async fn list_assignable_locations(&self) -> Result<Vec<String>> {
        let locations = self.client.list_locations().await?;
        Ok(locations.into_iter().map(|l| l.id).collect())
    }

    async fn resolve_template(
        &self,
        image_id: Option<&str>,
        hardware_id: Option<&str>,
        location_id: Option<&str>,
    ) -> Result<String> {
        let resolved = self
            .client
            .resolve_template(&ResolveTemplateRequest {
                image_id: image_id.map(str::to_string),
                hardware_id: hardware_id.map(str::to_string),
                location_id: location_id.map(str::to_string),
            })
            .await?;
        Ok(resolved.location.id)
    }

    async fn default_location(&self) -> Result<Option<String>> {
        Ok(self.client.default_location().await?.map(|l| l.id))
    }

    async fn windows_password(&self, node_id: &str, private_key: &[u8]) -> Result<Option<String>> {
        let answer = self.client.ec2_windows_password(node_id, private_key).await?;
        Ok(answer.password)
    }

    async fn ec2_security_groups(&self, region: &str, name: &str) -> Result<Vec<String>> {
        let groups = self.client.ec2_security_groups(region, name).await?;
        Ok(groups.into_iter().map(|g| g.name).collect())
    }

    async fn ec2_key_pairs(&self, region: &str, name: &str) -> Result<Vec<String>> {
        let keys = self.client.ec2_key_pairs(region, name).await?;
        Ok(keys.into_iter().map(|k| k.name).collect())
    }

    async fn openstack_security_groups(&self, zone: &str) -> Result<Option<Vec<String>>> {
        let groups = self.client.openstack_security_groups(zone).await?;
        Ok(groups.map(|gs| gs.into_iter().map(|g| g.name).collect()))
    }

    async fn openstack_key_pairs(&self, zone: &str) -> Result<Option<Vec<String>>> {
        let keys = self.client.openstack_key_pairs(zone).await?;
        Ok(keys.map(|ks| ks.into_iter().map(|k| k.name).collect()))
    }

    async fn cloudstack_security_group(&self, name: &str) -> Result<Option<String>> {
        Ok(self.client.cloudstack_security_group(name).await?.map(|g| g.name))
    }

    async fn cloudstack_key_pair(&self, name: &str) -> Result<Option<String>> {
        Ok(self.client.cloudstack_ssh_key_pair(name).await?.map(|k| k.name))
    }

    async fn close(&self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

/// Opens gateway sessions for a cloud account.
pub struct GatewayConnector {
    base_url: String,
}

impl GatewayConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Create from env vars: `COMPUTE_GATEWAY_URL` (required).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let base_url = std::env::var("COMPUTE_GATEWAY_URL")
            .map_err(|_| Error::MissingEnv("COMPUTE_GATEWAY_URL".into()))?;

        Ok(Self::new(base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ControlPlaneFactory for GatewayConnector {
    async fn connect(
        &self,
        provider: &str,
        credentials: &CloudCredentials,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn ControlPlane>> {
        let client = GatewayClient::connect(
            self.base_url.clone(),
            &ConnectRequest {
                provider: provider.to_string(),
                identity: credentials.identity.clone(),
                credential: credentials.api_key.clone(),
                overrides: overrides.clone(),
            },
        )
        .await?;

        info!(provider, "gateway: session opened");
        Ok(Arc::new(GatewayControlPlane::new(client)))
    }
}
