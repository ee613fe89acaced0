use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{error, info, warn};

use crate::deadline::Deadline;
use crate::orchestrator::ProvisioningOrchestrator;
use crate::types::MachineRecord;
use crate::{Error, Result};

/// Starts, finds and stops the fixed-size set of management machines.
///
/// A fleet is all-or-nothing: if any machine fails to start, the ones that
/// did start, and the ones a timeout left behind, are destroyed again before
/// the error is returned.
pub struct ManagementFleetController {
    orchestrator: Arc<ProvisioningOrchestrator>,
    machine_count: usize,
}

impl ManagementFleetController {
    /// `orchestrator` should be built in management mode so machines carry
    /// the management group prefix.
    pub fn new(orchestrator: Arc<ProvisioningOrchestrator>, machine_count: usize) -> Self {
        Self {
            orchestrator,
            machine_count,
        }
    }

    pub fn orchestrator(&self) -> &Arc<ProvisioningOrchestrator> {
        &self.orchestrator
    }

    pub fn group(&self) -> &str {
        self.orchestrator.prefix()
    }

    fn ensure_group(&self) -> Result<()> {
        if self.group().trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "management group must be set in the cloud configuration".into(),
            ));
        }
        Ok(())
    }

    /// Management machines that are already up.
    pub async fn existing(&self) -> Result<Vec<MachineRecord>> {
        self.ensure_group()?;
        self.orchestrator.existing_machines().await
    }

    /// Start the fleet. Refuses when any machine of the group is already
    /// live. All machines share one deadline derived from `duration`.
    pub async fn start(&self, duration: Duration) -> Result<Vec<MachineRecord>> {
        let deadline = Deadline::after(duration);
        self.ensure_group()?;

        let existing = self.orchestrator.existing_machines().await?;
        if !existing.is_empty() {
            let servers = existing
                .iter()
                .map(|m| format!("[{}]", m.describe()))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::ExistingFleet {
                group: self.group().to_string(),
                servers,
            });
        }

        info!(
            event = "attempt_start_mgmt_vms",
            count = self.machine_count,
            group = self.group(),
            "starting management machines"
        );

        let attempts = (0..self.machine_count).map(|_| self.orchestrator.create_machine(deadline, None));
        let results = join_all(attempts).await;

        let mut records = Vec::with_capacity(results.len());
        let mut started = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(record) => {
                    started.push(record.machine_id.clone());
                    records.push(record);
                }
                Err(e) => {
                    // Timed-out nodes are still alive and join the compensation list.
                    if let Some(node_id) = e.timed_out_node() {
                        started.push(node_id.to_string());
                    }
                    failures.push(e);
                }
            }
        }

        if failures.is_empty() {
            info!(
                event = "mgmt_vms_started",
                count = records.len(),
                group = self.group(),
                "management machines started"
            );
            return Ok(records);
        }

        error!(
            errors = failures.len(),
            total = self.machine_count,
            to_destroy = started.len(),
            "failed to start management machines, rolling back"
        );
        let survivors = self.unwind(&started).await;

        match failures.swap_remove(0) {
            Error::Timeout { message, node_id } => Err(Error::Timeout {
                message,
                node_id: node_id.filter(|id| survivors.contains(id)),
            }),
            first => Err(Error::creation_failed(
                "One or more management machines failed. The first encountered error was",
                first,
            )),
        }
    }

    /// Destroy machines in reverse start order. Each destroy is tried once;
    /// the ids that could not be destroyed are returned for the operator.
    async fn unwind(&self, machine_ids: &[String]) -> Vec<String> {
        let mut survivors = Vec::new();
        for machine_id in machine_ids.iter().rev() {
            info!(machine_id, "destroying management machine");
            if let Err(e) = self.orchestrator.destroy_machine(machine_id).await {
                warn!(
                    machine_id,
                    error = %e,
                    "failed to destroy management machine during rollback"
                );
                survivors.push(machine_id.clone());
            }
        }
        survivors
    }

    /// Shut down every live machine of the group with one batched call.
    pub async fn stop(&self) -> Result<()> {
        let machines = self.existing().await?;
        if machines.is_empty() {
            return Err(Error::NoManagementMachines {
                prefix: self.group().to_string(),
            });
        }

        let addresses: BTreeSet<String> = machines
            .iter()
            .filter_map(|m| m.private_address.clone())
            .collect();

        info!(
            event = "stopping_mgmt_vms",
            count = addresses.len(),
            group = self.group(),
            "stopping management machines"
        );
        self.orchestrator
            .control_plane()
            .destroy_nodes_by_address(&addresses)
            .await
    }
}
