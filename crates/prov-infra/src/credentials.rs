use crate::types::{CloudNode, ProvisionTemplate};

/// Remote login identity for a node. `None` means unresolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Template overrides win, then whatever the control plane returned.
///
/// Never touches the network; out-of-band password retrieval is a separate
/// step in the orchestrator.
pub fn resolve(node: &CloudNode, template: &ProvisionTemplate) -> ResolvedCredentials {
    let returned = node.credentials.as_ref();

    let username = template
        .username
        .clone()
        .or_else(|| returned.and_then(|c| c.identity.clone()));

    let password = template
        .password
        .clone()
        .or_else(|| returned.and_then(|c| c.password.clone()));

    ResolvedCredentials { username, password }
}
