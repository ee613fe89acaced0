use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use crate::{ControlPlane, Error, Result};

/// Counter seeding server names. Owned by one orchestrator instance and
/// shared between its concurrent allocations.
#[derive(Debug, Default)]
pub struct NameCounter(AtomicU32);

impl NameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next value in `1..=limit`, wrapping so identities get recycled.
    pub fn next(&self, limit: u32) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) % limit.max(1) + 1
    }
}

/// Finds a server name no node currently carries.
///
/// This avoids collisions, it does not reserve names: two allocators can
/// both see a name as free before either creates a node with it.
pub struct ServerNameAllocator {
    prefix: String,
    limit: u32,
    counter: Arc<NameCounter>,
    control_plane: Arc<dyn ControlPlane>,
}

impl ServerNameAllocator {
    pub fn new(
        prefix: impl Into<String>,
        limit: u32,
        counter: Arc<NameCounter>,
        control_plane: Arc<dyn ControlPlane>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            limit,
            counter,
            control_plane,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub async fn allocate(&self) -> Result<String> {
        for _ in 0..self.limit {
            let name = format!("{}{}", self.prefix, self.counter.next(self.limit));
            match self.control_plane.find_node_by_name(&name).await? {
                None => return Ok(name),
                Some(node) => debug!(name, node_id = %node.id, "server name taken"),
            }
        }

        Err(Error::NameSpaceExhausted { limit: self.limit })
    }
}
