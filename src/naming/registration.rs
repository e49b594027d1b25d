//! Storage-server-facing operations of the naming server.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::DfsResult;
use crate::path::DfsPath;
use crate::proto::{Registration, StorageRef};
use crate::tree::HashTree;

/// Implements [`Registration`] over the directory tree. The grafting pass
/// runs under an exclusive lock on the root, serializing it against client
/// operations.
pub struct RegistrationFacade {
    tree: Arc<HashTree>,
}

impl RegistrationFacade {
    pub fn new(tree: Arc<HashTree>) -> Self {
        Self { tree }
    }
}

#[async_trait]
impl Registration for RegistrationFacade {
    async fn register(
        &self,
        storage: SocketAddr,
        command: SocketAddr,
        paths: Vec<DfsPath>,
    ) -> DfsResult<Vec<DfsPath>> {
        let server = StorageRef::new(storage, command);
        let root = DfsPath::root();
        self.tree.lock(&root, true).await?;
        let result = self.tree.register_files(server, paths).await;
        self.tree.unlock(&root, true).await?;

        if let Ok(duplicates) = &result {
            info!(%storage, %command, duplicates = duplicates.len(), "storage server registered");
        }
        result
    }
}
