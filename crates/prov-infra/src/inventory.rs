use crate::types::{CloudNode, NodeStatus};
use crate::{ControlPlane, Error, Result};

/// A node belongs to the group when it is live (RUNNING or PENDING) and its
/// group tag starts with `prefix`, ignoring case.
pub fn is_group_member(node: &CloudNode, prefix: &str) -> bool {
    let Some(group) = node.group.as_deref().filter(|g| !g.is_empty()) else {
        return false;
    };

    matches!(node.status, NodeStatus::Running | NodeStatus::Pending)
        && group.to_lowercase().starts_with(&prefix.to_lowercase())
}

/// Live nodes whose group starts with `prefix`.
pub async fn list_by_group_prefix(
    control_plane: &dyn ControlPlane,
    prefix: &str,
) -> Result<Vec<CloudNode>> {
    control_plane
        .list_nodes_matching(&|node: &CloudNode| is_group_member(node, prefix))
        .await
        .map_err(|e| Error::ControlPlane(format!("failed to read existing servers: {e}")))
}
