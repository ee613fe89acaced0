//! Out-of-band administrator password retrieval for Windows on EC2.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::deadline::Deadline;
use crate::types::ProvisionTemplate;
use crate::{ControlPlane, Error, Result};

pub const DEFAULT_WINDOWS_USERNAME: &str = "Administrator";

/// Key file the node was launched with. Management machines read it from
/// the upload directory, others from the local directory.
pub fn key_file_path(template: &ProvisionTemplate, management: bool) -> Result<PathBuf> {
    let key_file = template
        .key_file
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::InvalidConfiguration("template declares no key file".into()))?;

    let dir = if management {
        template.upload_directory.as_deref()
    } else {
        template.local_directory.as_deref()
    };

    Ok(match dir {
        Some(dir) => dir.join(key_file),
        None => PathBuf::from(key_file),
    })
}

/// Poll the control plane for the decrypted password until it is produced
/// or `deadline` passes.
pub async fn retrieve_password(
    control_plane: &dyn ControlPlane,
    node_id: &str,
    key_path: &Path,
    deadline: Deadline,
    interval: Duration,
) -> Result<String> {
    let private_key = match tokio::fs::read(key_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::KeyFileNotFound(key_path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(event = "waiting_for_ec2_windows_password", node_id);

    let timed_out =
        || Error::timeout(format!("windows password for node {node_id} was not available in time"));

    while !deadline.is_expired() {
        let poll = control_plane.windows_password(node_id, &private_key);
        let answer = tokio::time::timeout_at(deadline.instant(), poll)
            .await
            .map_err(|_| timed_out())??;

        if let Some(password) = answer {
            info!(event = "ec2_windows_password_retrieved", node_id);
            return Ok(password);
        }
        debug!(node_id, "windows password not available yet");
        tokio::time::sleep(interval.min(deadline.remaining())).await;
    }

    Err(timed_out())
}
