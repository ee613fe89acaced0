use std::collections::{HashMap, HashSet};
use std::fmt;

/// Provider families the core knows how to query for security groups and
/// key pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiFamily {
    Ec2,
    OpenStack,
    CloudStack,
    VCloud,
    Other,
}

impl ApiFamily {
    pub fn from_api_id(api_id: &str) -> Self {
        match api_id.to_ascii_lowercase().as_str() {
            "aws-ec2" | "ec2" => Self::Ec2,
            "openstack-nova" => Self::OpenStack,
            "cloudstack" => Self::CloudStack,
            "vcloud" => Self::VCloud,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ec2 => "ec2",
            Self::OpenStack => "openstack",
            Self::CloudStack => "cloudstack",
            Self::VCloud => "vcloud",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ApiFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a configured provider name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResolution {
    pub api_id: String,
    pub family: ApiFamily,
    /// Resolved as a bare API (private cloud), so an endpoint is mandatory.
    pub endpoint_required: bool,
}

/// Registry of known public providers and the APIs behind them.
///
/// A provider name resolves to its API. A name that is not a provider but is
/// a known API denotes a private deployment of that API.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, String>,
    apis: HashSet<String>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let providers = [
            ("aws-ec2", "aws-ec2"),
            ("hpcloud-compute", "openstack-nova"),
            ("rackspace-cloudservers-us", "openstack-nova"),
            ("rackspace-cloudservers-uk", "openstack-nova"),
            ("trystack-nova", "openstack-nova"),
            ("ninefold-compute", "cloudstack"),
            ("bluelock-vcloud-zone01", "vcloud"),
        ];
        let apis = ["aws-ec2", "ec2", "openstack-nova", "cloudstack", "vcloud"];

        Self {
            providers: providers
                .into_iter()
                .map(|(p, a)| (p.to_string(), a.to_string()))
                .collect(),
            apis: apis.into_iter().map(str::to_string).collect(),
        }
    }
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            apis: HashSet::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>, api_id: impl Into<String>) -> Self {
        let api_id = api_id.into();
        self.apis.insert(api_id.clone());
        self.providers.insert(provider.into(), api_id);
        self
    }

    pub fn with_api(mut self, api_id: impl Into<String>) -> Self {
        self.apis.insert(api_id.into());
        self
    }

    pub fn is_known_api(&self, api_id: &str) -> bool {
        self.apis.contains(api_id)
    }

    /// Resolve a provider name, falling back to the API registry.
    pub fn resolve(&self, name: &str) -> Option<ApiResolution> {
        if let Some(api_id) = self.providers.get(name) {
            return Some(ApiResolution {
                api_id: api_id.clone(),
                family: ApiFamily::from_api_id(api_id),
                endpoint_required: false,
            });
        }

        self.apis.get(name).map(|api_id| ApiResolution {
            api_id: api_id.clone(),
            family: ApiFamily::from_api_id(api_id),
            endpoint_required: true,
        })
    }

    /// Family for a provider name, `Other` when unknown.
    pub fn family_of(&self, name: &str) -> ApiFamily {
        self.resolve(name)
            .map(|r| r.family)
            .unwrap_or(ApiFamily::Other)
    }
}
