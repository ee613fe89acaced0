//! Provider-family lookups for security groups and key pairs.
//!
//! Each family answers "which of these names are missing" given the names
//! grouped by region. The strategy is picked once from the resolved API.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::debug;

use crate::provider::ApiFamily;
use crate::{ControlPlane, Error, Result};

/// Names declared by templates, keyed by resolved region.
pub type RegionMap = BTreeMap<String, BTreeSet<String>>;

#[async_trait]
pub trait InventoryStrategy: Send + Sync {
    /// `false` when this family has no lookup and validation is skipped.
    fn supported(&self) -> bool {
        true
    }

    async fn missing_security_groups(
        &self,
        control_plane: &dyn ControlPlane,
        by_region: &RegionMap,
    ) -> Result<BTreeSet<String>>;

    async fn missing_key_pairs(
        &self,
        control_plane: &dyn ControlPlane,
        by_region: &RegionMap,
    ) -> Result<BTreeSet<String>>;
}

pub fn strategy_for(family: ApiFamily) -> &'static dyn InventoryStrategy {
    match family {
        ApiFamily::Ec2 => &Ec2Strategy,
        ApiFamily::OpenStack => &OpenStackStrategy,
        ApiFamily::CloudStack => &CloudStackStrategy,
        ApiFamily::VCloud | ApiFamily::Other => &UnsupportedStrategy,
    }
}

/// Describe-by-name per region. An empty answer means missing.
pub struct Ec2Strategy;

#[async_trait]
impl InventoryStrategy for Ec2Strategy {
    async fn missing_security_groups(
        &self,
        control_plane: &dyn ControlPlane,
        by_region: &RegionMap,
    ) -> Result<BTreeSet<String>> {
        let mut missing = BTreeSet::new();
        for (region, names) in by_region {
            for name in names {
                if control_plane.ec2_security_groups(region, name).await?.is_empty() {
                    missing.insert(name.clone());
                }
            }
        }
        Ok(missing)
    }

    async fn missing_key_pairs(
        &self,
        control_plane: &dyn ControlPlane,
        by_region: &RegionMap,
    ) -> Result<BTreeSet<String>> {
        let mut missing = BTreeSet::new();
        for (region, names) in by_region {
            for name in names {
                if control_plane.ec2_key_pairs(region, name).await?.is_empty() {
                    missing.insert(name.clone());
                }
            }
        }
        Ok(missing)
    }
}

/// Per-zone extension listing matched by name. A zone without the
/// extension is an error.
pub struct OpenStackStrategy;

fn extension_missing(what: &str, zone: &str) -> Error {
    Error::InvalidConfiguration(format!("{what} extension is not available in zone \"{zone}\""))
}

#[async_trait]
impl InventoryStrategy for OpenStackStrategy {
    async fn missing_security_groups(
        &self,
        control_plane: &dyn ControlPlane,
        by_region: &RegionMap,
    ) -> Result<BTreeSet<String>> {
        let mut missing = BTreeSet::new();
        for (zone, names) in by_region {
            let listed = control_plane
                .openstack_security_groups(zone)
                .await?
                .ok_or_else(|| extension_missing("security group", zone))?;
            missing.extend(names.iter().filter(|n| !listed.contains(*n)).cloned());
        }
        Ok(missing)
    }

    async fn missing_key_pairs(
        &self,
        control_plane: &dyn ControlPlane,
        by_region: &RegionMap,
    ) -> Result<BTreeSet<String>> {
        let mut missing = BTreeSet::new();
        for (zone, names) in by_region {
            let listed = control_plane
                .openstack_key_pairs(zone)
                .await?
                .ok_or_else(|| extension_missing("key-pair", zone))?;
            missing.extend(names.iter().filter(|n| !listed.contains(*n)).cloned());
        }
        Ok(missing)
    }
}

/// Global lookup by name; regions are collapsed into one set.
pub struct CloudStackStrategy;

fn collapse(by_region: &RegionMap) -> BTreeSet<&String> {
    by_region.values().flatten().collect()
}

#[async_trait]
impl InventoryStrategy for CloudStackStrategy {
    async fn missing_security_groups(
        &self,
        control_plane: &dyn ControlPlane,
        by_region: &RegionMap,
    ) -> Result<BTreeSet<String>> {
        let mut missing = BTreeSet::new();
        for name in collapse(by_region) {
            if control_plane.cloudstack_security_group(name).await?.is_none() {
                missing.insert(name.clone());
            }
        }
        Ok(missing)
    }

    async fn missing_key_pairs(
        &self,
        control_plane: &dyn ControlPlane,
        by_region: &RegionMap,
    ) -> Result<BTreeSet<String>> {
        let mut missing = BTreeSet::new();
        for name in collapse(by_region) {
            if control_plane.cloudstack_key_pair(name).await?.is_none() {
                missing.insert(name.clone());
            }
        }
        Ok(missing)
    }
}

/// vCloud and unrecognized APIs.
pub struct UnsupportedStrategy;

#[async_trait]
impl InventoryStrategy for UnsupportedStrategy {
    fn supported(&self) -> bool {
        false
    }

    async fn missing_security_groups(
        &self,
        _control_plane: &dyn ControlPlane,
        _by_region: &RegionMap,
    ) -> Result<BTreeSet<String>> {
        debug!("security group validation not supported for this api");
        Ok(BTreeSet::new())
    }

    async fn missing_key_pairs(
        &self,
        _control_plane: &dyn ControlPlane,
        _by_region: &RegionMap,
    ) -> Result<BTreeSet<String>> {
        debug!("key-pair validation not supported for this api");
        Ok(BTreeSet::new())
    }
}
