use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::credentials;
use crate::deadline::Deadline;
use crate::inventory;
use crate::naming::{NameCounter, ServerNameAllocator};
use crate::provider::ApiFamily;
use crate::readiness::{self, POLL_INTERVAL, ReadinessError};
use crate::types::{CloudConfig, CloudNode, FileTransferMode, MachineRecord, NodeSpec, ProvisionTemplate};
use crate::windows::{self, DEFAULT_WINDOWS_USERNAME};
use crate::{ControlPlane, Error, Result};

/// Which template an orchestrator provisions and in which role.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub template_name: String,
    /// Management machines use the management group as name prefix and read
    /// key files from the upload directory.
    pub management: bool,
    pub poll_interval: Duration,
}

impl OrchestratorSettings {
    pub fn new(template_name: impl Into<String>, management: bool) -> Self {
        Self {
            template_name: template_name.into(),
            management,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Drives one machine from "not created" to "ready with credentials", or
/// to a clean rollback.
///
/// Owns the control-plane handle and the name counter for its lifetime;
/// `close()` releases the handle.
pub struct ProvisioningOrchestrator {
    control_plane: Arc<dyn ControlPlane>,
    allocator: ServerNameAllocator,
    template: Arc<ProvisionTemplate>,
    family: ApiFamily,
    settings: OrchestratorSettings,
}

impl ProvisioningOrchestrator {
    pub fn new(
        config: &CloudConfig,
        settings: OrchestratorSettings,
        family: ApiFamily,
        control_plane: Arc<dyn ControlPlane>,
    ) -> Result<Self> {
        let template = config.template(&settings.template_name)?;
        let prefix = if settings.management {
            config.management_group.clone()
        } else {
            config.machine_name_prefix.clone()
        };

        let allocator = ServerNameAllocator::new(
            prefix,
            config.max_servers,
            Arc::new(NameCounter::new()),
            control_plane.clone(),
        );

        Ok(Self {
            control_plane,
            allocator,
            template,
            family,
            settings,
        })
    }

    /// Name prefix of machines this orchestrator creates.
    pub fn prefix(&self) -> &str {
        self.allocator.prefix()
    }

    pub fn template(&self) -> &ProvisionTemplate {
        &self.template
    }

    pub fn control_plane(&self) -> &Arc<dyn ControlPlane> {
        &self.control_plane
    }

    /// Create a machine and wait for it to become usable.
    ///
    /// On `Timeout` while waiting for RUNNING the node is left in place for
    /// the caller to decide; the error names it. Any other failure after the node exists destroys
    /// it before returning.
    pub async fn create_machine(
        &self,
        deadline: Deadline,
        location_override: Option<&str>,
    ) -> Result<MachineRecord> {
        if deadline.is_expired() {
            return Err(Error::timeout("starting a new machine timed out"));
        }

        let location_id = location_override
            .map(str::to_string)
            .or_else(|| self.template.location_id.clone());

        let name = match self.allocator.allocate().await {
            Ok(name) => name,
            Err(e @ Error::NameSpaceExhausted { .. }) => return Err(e),
            Err(e) => return Err(Error::creation_failed("failed to allocate server name", e)),
        };

        let spec = NodeSpec {
            name: name.clone(),
            group: name.clone(),
            location_id,
            image_id: self.template.image_id.clone(),
            hardware_id: self.template.hardware_id.clone(),
            options: self.template.options.clone(),
        };

        info!(name, "creating cloud server, this may take a few minutes");
        let node = self
            .control_plane
            .create_node(&spec)
            .await
            .map_err(|e| Error::creation_failed("failed to create cloud server", e))?;
        let node_id = node.id;
        info!(name, node_id, "cloud server allocated");

        let ready = match readiness::wait_until_ready(
            self.control_plane.as_ref(),
            &node_id,
            deadline,
            self.settings.poll_interval,
        )
        .await
        {
            Ok(node) => node,
            Err(e @ ReadinessError::Timeout { .. }) => {
                warn!(node_id, "node did not reach RUNNING before the deadline");
                return Err(e.into());
            }
            Err(e) => return Err(self.roll_back(&node_id, e.into()).await),
        };

        match self.initialize(&ready, deadline).await {
            Ok(record) => {
                info!(node_id, private_ip = ?record.private_address, "machine ready");
                Ok(record)
            }
            Err(e) => Err(self.roll_back(&node_id, e).await),
        }
    }

    /// Build the record and resolve credentials for a RUNNING node.
    async fn initialize(&self, node: &CloudNode, deadline: Deadline) -> Result<MachineRecord> {
        let mut record = self.record_from_node(node);

        let windows_on_ec2 = self.family == ApiFamily::Ec2
            && self.template.file_transfer == FileTransferMode::Cifs;

        if windows_on_ec2 && record.remote_password.is_none() {
            let key_path = windows::key_file_path(&self.template, self.settings.management)?;
            let password = windows::retrieve_password(
                self.control_plane.as_ref(),
                &node.id,
                &key_path,
                deadline,
                self.settings.poll_interval,
            )
            .await?;

            record.remote_password = Some(password);
            record.remote_username = Some(
                self.template
                    .username
                    .clone()
                    .unwrap_or_else(|| DEFAULT_WINDOWS_USERNAME.to_string()),
            );
        }

        Ok(record)
    }

    /// Destroy a node whose initialization failed and return the error to
    /// surface. The destroy is attempted once; its failure is only logged.
    async fn roll_back(&self, node_id: &str, cause: Error) -> Error {
        error!(
            node_id,
            error = %cause,
            "cloud machine was started but initialization failed, shutting it down"
        );
        let destroyed = match self.control_plane.destroy_node(node_id).await {
            Ok(()) => true,
            Err(e) => {
                error!(node_id, error = %e, "failed to destroy machine during rollback");
                false
            }
        };

        match cause {
            Error::Timeout { message, .. } => Error::Timeout {
                message,
                node_id: (!destroyed).then(|| node_id.to_string()),
            },
            other => Error::creation_failed("failed to start cloud machine", other),
        }
    }

    /// Snapshot a node as a record, with credentials resolved from the
    /// template and whatever the cloud returned.
    pub fn record_from_node(&self, node: &CloudNode) -> MachineRecord {
        let creds = credentials::resolve(node, &self.template);

        MachineRecord {
            machine_id: node.id.clone(),
            location_id: node.location_id.clone(),
            private_address: node.private_addresses.first().cloned(),
            public_address: node.public_addresses.first().cloned(),
            remote_username: creds.username,
            remote_password: creds.password,
            file_transfer: self.template.file_transfer,
            remote_execution: self.template.remote_execution,
            agent_running: false,
            software_installed: false,
            installation_directory: None,
        }
    }

    /// Machines currently carrying this orchestrator's name prefix.
    pub async fn existing_machines(&self) -> Result<Vec<MachineRecord>> {
        let nodes = inventory::list_by_group_prefix(self.control_plane.as_ref(), self.prefix()).await?;
        Ok(nodes.iter().map(|n| self.record_from_node(n)).collect())
    }

    /// Shut down the machine with `address` and wait up to `timeout`.
    /// Returns `false` when no machine has that address.
    pub async fn stop_machine(&self, address: &str, timeout: Duration) -> Result<bool> {
        info!(address, "looking up cloud server by address");
        let Some(node) = self.control_plane.get_node_by_address(address).await? else {
            error!(
                address,
                "received scale in request for an address not found in the cloud server list"
            );
            return Ok(false);
        };

        info!(node_id = %node.id, "shutting down server and waiting for shutdown to complete");
        self.control_plane
            .destroy_node_and_wait(&node.id, timeout)
            .await?;
        info!(node_id = %node.id, "server shutdown has finished");
        Ok(true)
    }

    /// Destroy a machine by id. Used for compensation; does not retry.
    pub async fn destroy_machine(&self, machine_id: &str) -> Result<()> {
        self.control_plane.destroy_node(machine_id).await
    }

    pub async fn close(&self) -> Result<()> {
        self.control_plane.close().await
    }
}
