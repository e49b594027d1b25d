//! Client-facing operations of the naming server.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DfsError, DfsResult};
use crate::path::DfsPath;
use crate::proto::Service;
use crate::tree::{CommandLink, HashTree};

/// Implements [`Service`] over the directory tree. Queries run under a
/// shared tree lock, structural changes under an exclusive lock on the
/// target's parent.
pub struct ServiceFacade {
    tree: Arc<HashTree>,
    link: Arc<dyn CommandLink>,
}

impl ServiceFacade {
    pub fn new(tree: Arc<HashTree>, link: Arc<dyn CommandLink>) -> Self {
        Self { tree, link }
    }

    async fn create_file_locked(&self, path: &DfsPath) -> DfsResult<bool> {
        let Some(server) = self.tree.registry().pick_random().await else {
            return Err(DfsError::not_found("no storage servers available"));
        };
        if !self.tree.create_file(path, server).await? {
            return Ok(false);
        }
        match self.link.command(&server).create(path).await {
            Ok(created) => {
                if !created {
                    debug!(%path, server = %server.command, "storage already held the file");
                }
                Ok(true)
            }
            Err(error) => {
                // The physical copy never appeared; take the node back out.
                self.tree.remove_entry(path).await?;
                Err(error)
            }
        }
    }
}

#[async_trait]
impl Service for ServiceFacade {
    async fn lock(&self, path: &DfsPath, exclusive: bool) -> DfsResult<()> {
        self.tree.lock(path, exclusive).await
    }

    async fn unlock(&self, path: &DfsPath, exclusive: bool) -> DfsResult<()> {
        self.tree.unlock(path, exclusive).await
    }

    async fn is_directory(&self, path: &DfsPath) -> DfsResult<bool> {
        self.tree.lock(path, false).await?;
        let result = self.tree.is_directory(path).await;
        self.tree.unlock(path, false).await?;
        result
    }

    async fn list(&self, directory: &DfsPath) -> DfsResult<Vec<String>> {
        self.tree.lock(directory, false).await?;
        let result = self.tree.list(directory).await;
        self.tree.unlock(directory, false).await?;
        result
    }

    async fn create_file(&self, path: &DfsPath) -> DfsResult<bool> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        self.tree.lock(&parent, true).await?;
        let result = self.create_file_locked(path).await;
        self.tree.unlock(&parent, true).await?;
        result
    }

    async fn create_directory(&self, directory: &DfsPath) -> DfsResult<bool> {
        let Some(parent) = directory.parent() else {
            return Ok(false);
        };
        self.tree.lock(&parent, true).await?;
        let result = self.tree.create_directory(directory).await;
        self.tree.unlock(&parent, true).await?;
        result
    }

    async fn delete(&self, path: &DfsPath) -> DfsResult<bool> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        self.tree.lock(&parent, true).await?;
        let result = self.tree.delete(path).await;
        self.tree.unlock(&parent, true).await?;
        result
    }

    async fn get_storage(&self, path: &DfsPath) -> DfsResult<SocketAddr> {
        Ok(self.tree.get_storage(path).await?.storage)
    }
}
