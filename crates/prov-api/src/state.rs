use std::sync::Arc;

use prov_infra::validation::ArtifactChecker;
use prov_infra::{
    CloudConfig, ControlPlane, ControlPlaneFactory, ManagementFleetController,
    OrchestratorSettings, ProviderRegistry, ProvisioningOrchestrator, ValidationEngine,
};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Arc<ProvisioningOrchestrator>,
    pub fleet: Arc<ManagementFleetController>,
    pub validator: Arc<ValidationEngine>,
}

impl AppState {
    /// Wire the core components around one control-plane session.
    ///
    /// Machines use the configured naming mode; the fleet always uses the
    /// management group.
    pub fn new(
        config: AppConfig,
        cloud: Arc<CloudConfig>,
        template_name: &str,
        registry: ProviderRegistry,
        control_plane: Arc<dyn ControlPlane>,
        factory: Arc<dyn ControlPlaneFactory>,
        artifact_checker: Arc<dyn ArtifactChecker>,
    ) -> prov_infra::Result<Self> {
        let family = registry.family_of(&cloud.provider);

        let orchestrator = Arc::new(ProvisioningOrchestrator::new(
            &cloud,
            OrchestratorSettings::new(template_name, config.management),
            family,
            control_plane.clone(),
        )?);

        // In management mode both share one orchestrator, and so one name counter.
        let management = if config.management {
            orchestrator.clone()
        } else {
            Arc::new(ProvisioningOrchestrator::new(
                &cloud,
                OrchestratorSettings::new(template_name, true),
                family,
                control_plane,
            )?)
        };
        let fleet = Arc::new(ManagementFleetController::new(
            management,
            cloud.management_machines,
        ));

        let validator = Arc::new(ValidationEngine::new(
            cloud,
            template_name,
            registry,
            factory,
            artifact_checker,
        ));

        Ok(Self {
            config,
            orchestrator,
            fleet,
            validator,
        })
    }
}
