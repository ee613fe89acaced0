//! Node readiness state machine.
//!
//! A created node is polled until it reports RUNNING. PENDING keeps the
//! machine waiting; every other status is terminal.

use std::time::Duration;

use tracing::debug;

use crate::deadline::Deadline;
use crate::types::{CloudNode, NodeStatus};
use crate::{ControlPlane, Error};

/// Fixed delay between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What to do after observing a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Ready,
    Wait,
    Fail(NodeStatus),
}

/// Transition function of the readiness machine.
///
/// An unrecognized status is terminal, same as ERROR.
pub fn transition(observed: NodeStatus) -> Transition {
    match observed {
        NodeStatus::Running => Transition::Ready,
        NodeStatus::Pending => Transition::Wait,
        NodeStatus::Terminated
        | NodeStatus::Error
        | NodeStatus::Suspended
        | NodeStatus::Unrecognized => Transition::Fail(observed),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    #[error("node {node_id} failed to reach RUNNING state in time")]
    Timeout { node_id: String },

    #[error("cloud reported node {node_id} in {status} state")]
    Terminal { node_id: String, status: NodeStatus },

    #[error("node {node_id} disappeared while waiting for it to start")]
    Vanished { node_id: String },

    #[error(transparent)]
    Lookup(#[from] Error),
}

impl From<ReadinessError> for Error {
    fn from(err: ReadinessError) -> Self {
        let message = err.to_string();
        match err {
            ReadinessError::Timeout { node_id } => Error::Timeout {
                message,
                node_id: Some(node_id),
            },
            ReadinessError::Lookup(inner) => inner,
            _ => Error::ControlPlane(message),
        }
    }
}

/// Poll `node_id` until it is RUNNING, fails, or `deadline` passes.
///
/// The returned node was observed RUNNING by this call. Status lookups and
/// the sleeps between them are cut short at the deadline.
pub async fn wait_until_ready(
    control_plane: &dyn ControlPlane,
    node_id: &str,
    deadline: Deadline,
    interval: Duration,
) -> Result<CloudNode, ReadinessError> {
    let mut state = NodeStatus::Pending;
    let mut polls = 0u32;

    let timed_out = || ReadinessError::Timeout {
        node_id: node_id.to_string(),
    };

    while !deadline.is_expired() {
        polls += 1;
        let node = tokio::time::timeout_at(deadline.instant(), control_plane.get_node(node_id))
            .await
            .map_err(|_| timed_out())??
            .ok_or_else(|| ReadinessError::Vanished {
                node_id: node_id.to_string(),
            })?;

        if node.status != state {
            debug!(node_id, from = %state, to = %node.status, "node status changed");
            state = node.status;
        }

        match transition(node.status) {
            Transition::Ready => return Ok(node),
            Transition::Wait => {
                debug!(node_id, polls, "node still PENDING, waiting");
                tokio::time::sleep(interval.min(deadline.remaining())).await;
            }
            Transition::Fail(status) => {
                return Err(ReadinessError::Terminal {
                    node_id: node_id.to_string(),
                    status,
                });
            }
        }
    }

    Err(timed_out())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlPlane;
    use crate::types::NodeSpec;

    async fn created(plane: &MockControlPlane) -> String {
        let spec = NodeSpec {
            name: "app-1".into(),
            group: "app-1".into(),
            location_id: None,
            image_id: None,
            hardware_id: None,
            options: Default::default(),
        };
        plane.create_node(&spec).await.unwrap().id
    }

    #[test]
    fn transition_table() {
        assert_eq!(transition(NodeStatus::Running), Transition::Ready);
        assert_eq!(transition(NodeStatus::Pending), Transition::Wait);
        for status in [
            NodeStatus::Terminated,
            NodeStatus::Error,
            NodeStatus::Suspended,
            NodeStatus::Unrecognized,
        ] {
            assert_eq!(transition(status), Transition::Fail(status));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pending_then_running_is_ready() {
        let plane = MockControlPlane::new().with_script(&[
            NodeStatus::Pending,
            NodeStatus::Pending,
            NodeStatus::Pending,
            NodeStatus::Running,
        ]);
        let id = created(&plane).await;

        let start = tokio::time::Instant::now();
        let node = wait_until_ready(&plane, &id, Deadline::after(Duration::from_secs(60)), POLL_INTERVAL)
            .await
            .unwrap();

        assert_eq!(node.status, NodeStatus::Running);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_status_fails_immediately() {
        let plane = MockControlPlane::new().with_script(&[NodeStatus::Pending, NodeStatus::Error]);
        let id = created(&plane).await;

        let err = wait_until_ready(&plane, &id, Deadline::after(Duration::from_secs(60)), POLL_INTERVAL)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReadinessError::Terminal { status: NodeStatus::Error, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_status_is_terminal() {
        let plane =
            MockControlPlane::new().with_script(&[NodeStatus::Pending, NodeStatus::Unrecognized]);
        let id = created(&plane).await;

        let err = wait_until_ready(&plane, &id, Deadline::after(Duration::from_secs(60)), POLL_INTERVAL)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("UNRECOGNIZED"));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_pending_times_out() {
        let plane = MockControlPlane::new().with_script(&[NodeStatus::Pending]);
        let id = created(&plane).await;

        let err = wait_until_ready(&plane, &id, Deadline::after(Duration::from_secs(10)), POLL_INTERVAL)
            .await
            .unwrap_err();

        assert!(matches!(err, ReadinessError::Timeout { .. }));
        let err = Error::from(err);
        assert!(err.is_timeout());
        assert_eq!(err.timed_out_node(), Some(id.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_exactly_at_deadline() {
        let plane = MockControlPlane::new().with_script(&[NodeStatus::Pending]);
        let id = created(&plane).await;

        let start = tokio::time::Instant::now();
        let err = wait_until_ready(&plane, &id, Deadline::after(Duration::from_millis(2100)), POLL_INTERVAL)
            .await
            .unwrap_err();

        assert!(matches!(err, ReadinessError::Timeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_status_lookup_is_bounded() {
        let plane = MockControlPlane::new().hanging_status_lookups();
        let id = created(&plane).await;

        let start = tokio::time::Instant::now();
        let err = wait_until_ready(&plane, &id, Deadline::after(Duration::from_secs(5)), POLL_INTERVAL)
            .await
            .unwrap_err();

        assert!(matches!(err, ReadinessError::Timeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_node_is_reported() {
        let plane = MockControlPlane::new();
        let err = wait_until_ready(&plane, "ghost", Deadline::after(Duration::from_secs(10)), POLL_INTERVAL)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadinessError::Vanished { .. }));
    }
}
