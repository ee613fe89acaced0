//! Pre-flight checks of a cloud configuration against the live cloud.
//!
//! Stages run in order and the first failing stage ends the run:
//! provider resolution, authentication, identifier listings, per-template
//! resolution, artifact URL, then security groups and key pairs.

pub mod artifact;
pub mod strategy;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::provider::{ApiResolution, ProviderRegistry};
use crate::types::{CloudConfig, ENDPOINT_OVERRIDE, ProvisionTemplate};
use crate::{ControlPlane, ControlPlaneFactory, Error, Result};

pub use artifact::{ArtifactChecker, HttpArtifactChecker};
pub use strategy::{InventoryStrategy, RegionMap, strategy_for};

const AUTH_FAILED: &str = "Authentication to cloud failed";

/// Category of identifier a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    Image,
    Hardware,
    Location,
    SecurityGroup,
    KeyPair,
}

impl FindingKind {
    fn singular(&self) -> &'static str {
        match self {
            Self::Image => "image ID",
            Self::Hardware => "hardware ID",
            Self::Location => "location ID",
            Self::SecurityGroup => "security group name",
            Self::KeyPair => "key-pair name",
        }
    }

    fn plural(&self) -> &'static str {
        match self {
            Self::Image => "image IDs",
            Self::Hardware => "hardware IDs",
            Self::Location => "location IDs",
            Self::SecurityGroup => "security group names",
            Self::KeyPair => "key-pair names",
        }
    }
}

/// Missing identifiers of one category, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFinding {
    pub kind: FindingKind,
    pub missing: BTreeSet<String>,
}

impl ValidationFinding {
    pub fn new(kind: FindingKind, missing: BTreeSet<String>) -> Self {
        Self { kind, missing }
    }

    /// Ids of `declared` absent from `available`.
    pub fn compare(kind: FindingKind, declared: &BTreeSet<String>, available: &[String]) -> Self {
        let available: BTreeSet<&str> = available.iter().map(String::as_str).collect();
        let missing = declared
            .iter()
            .filter(|id| !available.contains(id.as_str()))
            .cloned()
            .collect();
        Self::new(kind, missing)
    }

    pub fn into_result(self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration(self.to_string()))
        }
    }
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids = self.missing.iter();
        match (ids.next(), self.missing.len()) {
            (Some(id), 1) => write!(f, "Invalid {}: {id}", self.kind.singular()),
            _ => {
                let all: Vec<&str> = self.missing.iter().map(String::as_str).collect();
                write!(f, "Invalid {}: [{}]", self.kind.plural(), all.join(", "))
            }
        }
    }
}

fn stage_error(context: &'static str) -> impl FnOnce(Error) -> Error {
    move |e| match e {
        Error::InvalidConfiguration(_) => e,
        other => Error::InvalidConfiguration(format!("{context}: {other}")),
    }
}

/// Validates one cloud configuration.
///
/// `template_name` is the template the deployment provisions with; its
/// endpoint override is used when the provider names a bare API.
pub struct ValidationEngine {
    config: Arc<CloudConfig>,
    template_name: String,
    registry: ProviderRegistry,
    factory: Arc<dyn ControlPlaneFactory>,
    artifact_checker: Arc<dyn ArtifactChecker>,
}

impl ValidationEngine {
    pub fn new(
        config: Arc<CloudConfig>,
        template_name: impl Into<String>,
        registry: ProviderRegistry,
        factory: Arc<dyn ControlPlaneFactory>,
        artifact_checker: Arc<dyn ArtifactChecker>,
    ) -> Self {
        Self {
            config,
            template_name: template_name.into(),
            registry,
            factory,
            artifact_checker,
        }
    }

    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    pub async fn validate(&self) -> Result<()> {
        let provider = self.config.provider.as_str();
        info!(event = "validating_provider_or_api_name", provider);

        let resolution = self.registry.resolve(provider).ok_or_else(|| {
            Error::InvalidConfiguration(format!("Provider not supported: {provider}"))
        })?;

        let mut overrides = BTreeMap::new();
        if resolution.endpoint_required {
            let template = self.config.template(&self.template_name)?;
            let endpoint = template
                .endpoint()
                .ok_or_else(|| Error::InvalidConfiguration("Endpoint is missing".into()))?;
            overrides.insert(ENDPOINT_OVERRIDE.to_string(), endpoint.to_string());
        }

        info!(event = "validating_cloud_credentials", provider);
        let client = self
            .factory
            .connect(provider, &self.config.user, &overrides)
            .await
            .map_err(|e| {
                debug!(error = %e, "control plane client could not be built");
                Error::InvalidConfiguration(AUTH_FAILED.into())
            })?;

        let result = self.run_stages(client.as_ref(), &resolution).await;

        if let Err(e) = client.close().await {
            warn!(error = %e, "failed to close validation client");
        }

        match &result {
            Ok(()) => info!(event = "cloud_configuration_valid", provider),
            Err(e) => info!(event = "cloud_configuration_invalid", provider, error = %e),
        }
        result
    }

    async fn run_stages(&self, client: &dyn ControlPlane, resolution: &ApiResolution) -> Result<()> {
        self.validate_identifiers(client).await?;
        self.validate_templates(client).await?;

        match &self.config.artifact_url {
            Some(url) => artifact::check_artifact_url(self.artifact_checker.as_ref(), url).await?,
            None => debug!("no artifact url configured, skipping reachability check"),
        }

        if self.registry.is_known_api(&resolution.api_id) {
            self.validate_groups_and_keys(client, resolution).await?;
        }
        Ok(())
    }

    /// Union of non-blank image, hardware and location ids across templates,
    /// each checked against the cloud's listing.
    async fn validate_identifiers(&self, client: &dyn ControlPlane) -> Result<()> {
        let mut images = BTreeSet::new();
        let mut hardware = BTreeSet::new();
        let mut locations = BTreeSet::new();

        for (name, template) in &self.config.templates {
            debug!(template = %name, "collecting template identifiers");
            insert_non_blank(&mut images, template.image_id.as_deref());
            insert_non_blank(&mut hardware, template.hardware_id.as_deref());
            insert_non_blank(&mut locations, template.location_id.as_deref());
        }

        info!(event = "validating_image_ids", count = images.len());
        let listed = client
            .list_images()
            .await
            .map_err(stage_error("failed to list images"))?;
        ValidationFinding::compare(FindingKind::Image, &images, &listed).into_result()?;

        info!(event = "validating_hardware_ids", count = hardware.len());
        let listed = client
            .list_hardware_profiles()
            .await
            .map_err(stage_error("failed to list hardware profiles"))?;
        ValidationFinding::compare(FindingKind::Hardware, &hardware, &listed).into_result()?;

        info!(event = "validating_location_ids", count = locations.len());
        let listed = client
            .list_assignable_locations()
            .await
            .map_err(stage_error("failed to list locations"))?;
        ValidationFinding::compare(FindingKind::Location, &locations, &listed).into_result()
    }

    /// Ask the cloud to resolve every template's combination, through a
    /// template-scoped client when the template carries client overrides.
    async fn validate_templates(&self, client: &dyn ControlPlane) -> Result<()> {
        for (name, template) in &self.config.templates {
            info!(event = "validating_template", template = %name);

            let outcome = if template.has_client_overrides() {
                info!(event = "validating_template_overrides", template = %name);
                match self
                    .factory
                    .connect(&self.config.provider, &self.config.user, &template.overrides)
                    .await
                {
                    Ok(scoped) => {
                        let outcome = resolve(scoped.as_ref(), name, template).await;
                        if let Err(e) = scoped.close().await {
                            warn!(template = %name, error = %e, "failed to close template client");
                        }
                        outcome
                    }
                    Err(e) => {
                        debug!(template = %name, error = %e, "template client could not be built");
                        Err(Error::InvalidConfiguration(AUTH_FAILED.into()))
                    }
                }
            } else {
                resolve(client, name, template).await
            };

            outcome.map_err(|e| {
                Error::InvalidConfiguration(format!(
                    "Invalid configuration for template \"{name}\", {e}"
                ))
            })?;
        }
        Ok(())
    }

    async fn validate_groups_and_keys(
        &self,
        client: &dyn ControlPlane,
        resolution: &ApiResolution,
    ) -> Result<()> {
        let strategy = strategy_for(resolution.family);
        if !strategy.supported() {
            debug!(api = %resolution.api_id, "security group and key-pair validation not supported");
            return Ok(());
        }

        let default_location = match client.default_location().await {
            Ok(location) => location.unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "default location not available for this provider");
                String::new()
            }
        };

        let (groups, keys) = self.names_by_region(&default_location);

        info!(event = "validating_security_groups", regions = groups.len());
        let missing = strategy
            .missing_security_groups(client, &groups)
            .await
            .map_err(stage_error("failed to look up security groups"))?;
        ValidationFinding::new(FindingKind::SecurityGroup, missing).into_result()?;

        info!(event = "validating_key_pairs", regions = keys.len());
        let missing = strategy
            .missing_key_pairs(client, &keys)
            .await
            .map_err(stage_error("failed to look up key pairs"))?;
        ValidationFinding::new(FindingKind::KeyPair, missing).into_result()
    }

    /// Security group and key-pair names grouped by template region, falling
    /// back to `default_location` for templates that name none.
    fn names_by_region(&self, default_location: &str) -> (RegionMap, RegionMap) {
        let mut groups = RegionMap::new();
        let mut keys = RegionMap::new();

        for template in self.config.templates.values() {
            let region = template
                .location_id
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or(default_location);

            let names = template.security_group_names();
            if !names.is_empty() {
                groups.entry(region.to_string()).or_default().extend(names);
            }
            if let Some(key) = template.key_pair_name() {
                keys.entry(region.to_string()).or_default().insert(key);
            }
        }

        (groups, keys)
    }
}

fn insert_non_blank(set: &mut BTreeSet<String>, id: Option<&str>) {
    if let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) {
        set.insert(id.to_string());
    }
}

async fn resolve(
    client: &dyn ControlPlane,
    name: &str,
    template: &ProvisionTemplate,
) -> Result<String> {
    debug!(
        template = name,
        image = ?template.image_id,
        hardware = ?template.hardware_id,
        location = ?template.location_id,
        "resolving template"
    );
    client
        .resolve_template(
            template.image_id.as_deref(),
            template.hardware_id.as_deref(),
            template.location_id.as_deref(),
        )
        .await
}
