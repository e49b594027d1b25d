//! The ordered list of registered storage servers.

use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use crate::error::{DfsError, DfsResult};
use crate::proto::StorageRef;

/// Process-wide registry of storage servers, in registration order, with no
/// duplicates. File nodes hold copies of these refs; the registry is the
/// authoritative owner of the identities.
#[derive(Default)]
pub struct Registry {
    servers: Mutex<Vec<StorageRef>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a server; rejects one that is already present.
    pub async fn insert(&self, server: StorageRef) -> DfsResult<()> {
        let mut servers = self.servers.lock().await;
        if servers.contains(&server) {
            return Err(DfsError::AlreadyRegistered);
        }
        servers.push(server);
        Ok(())
    }

    pub async fn contains(&self, server: &StorageRef) -> bool {
        self.servers.lock().await.contains(server)
    }

    pub async fn all(&self) -> Vec<StorageRef> {
        self.servers.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.servers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.servers.lock().await.is_empty()
    }

    /// A server chosen uniformly at random, or `None` when empty.
    pub async fn pick_random(&self) -> Option<StorageRef> {
        self.servers.lock().await.choose(&mut rand::thread_rng()).copied()
    }

    /// A random server not in `used`, or `None` when all are in use.
    pub async fn pick_unused(&self, used: &[StorageRef]) -> Option<StorageRef> {
        let servers = self.servers.lock().await;
        let free: Vec<StorageRef> =
            servers.iter().filter(|server| !used.contains(server)).copied().collect();
        free.choose(&mut rand::thread_rng()).copied()
    }
}
