//! The in-memory directory tree of the naming server.
//!
//! A tree of nodes, each carrying either a child map (directory) or a list
//! of storage replicas (file). Every node owns a reader/writer lock; the
//! locking protocol walks from the root to the target's parent taking
//! shared locks in order, then takes the target in the requested mode.
//! The total order on paths plus in-order acquisition keeps concurrent
//! clients deadlock-free.

mod lock;
mod node;
mod registry;


use std::sync::Arc;

use tracing::warn;

use crate::error::{DfsError, DfsResult};
use crate::path::DfsPath;
use crate::proto::proxy::CommandProxy;
use crate::proto::{CommandOp, StorageRef};

pub use self::registry::Registry;

use self::lock::LockMode as Mode;
use self::node::{Node, NodeKind};

/// Shared acquisitions of a single-replica file before a new replica is
/// minted. Hot files fan out; a handful of reads is not hot yet.
pub const DEFAULT_REPLICATION_THRESHOLD: usize = 8;

/// Hands out command channels to storage servers.
///
/// Replica invalidation and minting issue commands from inside lock
/// acquisition; all of that outbound traffic goes through this seam.
pub trait CommandLink: Send + Sync {
    fn command(&self, server: &StorageRef) -> Arc<dyn CommandOp>;
}

/// Production link: one wire proxy per storage server.
pub struct WireLink;

impl CommandLink for WireLink {
    fn command(&self, server: &StorageRef) -> Arc<dyn CommandOp> {
        Arc::new(CommandProxy::new(server.command))
    }
}

/// The directory tree plus the storage-server registry.
pub struct HashTree {
    root: Arc<Node>,
    registry: Registry,
    link: Arc<dyn CommandLink>,
    replication_threshold: usize,
}

impl HashTree {
    pub fn new(link: Arc<dyn CommandLink>, replication_threshold: usize) -> Self {
        Self {
            root: Node::directory(),
            registry: Registry::new(),
            link,
            replication_threshold: replication_threshold.max(1),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Acquires shared locks on every ancestor of `path` in root-to-parent
    /// order, then the target lock in the requested mode.
    ///
    /// Locking a file exclusively invalidates all but one replica before
    /// returning; locking it shared counts towards the replication trigger.
    pub async fn lock(&self, path: &DfsPath, exclusive: bool) -> DfsResult<()> {
        let mode = if exclusive { Mode::Exclusive } else { Mode::Shared };
        let mut held: Vec<Arc<Node>> = Vec::new();
        let mut current = self.root.clone();
        for component in path.components() {
            current.lock.acquire(Mode::Shared).await;
            held.push(current.clone());
            match current.child(component).await {
                Some(child) => current = child,
                None => {
                    release_stack(&held).await;
                    return Err(DfsError::not_found(path));
                }
            }
        }
        current.lock.acquire(mode).await;

        match mode {
            Mode::Exclusive => self.invalidate_extra_replicas(path, &current).await,
            Mode::Shared => self.replicate_if_hot(path, &current).await,
        }
        Ok(())
    }

    /// Releases the locks acquired by a matching [`HashTree::lock`] call,
    /// in exact reverse order.
    pub async fn unlock(&self, path: &DfsPath, exclusive: bool) -> DfsResult<()> {
        let mode = if exclusive { Mode::Exclusive } else { Mode::Shared };
        let mut ancestors: Vec<Arc<Node>> = Vec::new();
        let mut current = self.root.clone();
        for component in path.components() {
            ancestors.push(current.clone());
            match current.child(component).await {
                Some(child) => current = child,
                None => return Err(DfsError::invalid(format!("{path} is not locked"))),
            }
        }
        current.lock.release(mode).await?;
        for node in ancestors.iter().rev() {
            node.lock.release(Mode::Shared).await?;
        }
        Ok(())
    }

    /// True if `path` names a directory, false if it names a file.
    pub async fn is_directory(&self, path: &DfsPath) -> DfsResult<bool> {
        Ok(self.resolve(path).await?.is_directory())
    }

    /// Child names of the directory at `path`, sorted.
    pub async fn list(&self, path: &DfsPath) -> DfsResult<Vec<String>> {
        let node = self.resolve(path).await?;
        let NodeKind::Directory(children) = &node.kind else {
            return Err(DfsError::not_found(format!("{path} is not a directory")));
        };
        let mut names: Vec<String> = children.lock().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Creates a file node with `replica` as its sole replica. The parent
    /// must already exist and be a directory.
    pub async fn create_file(&self, path: &DfsPath, replica: StorageRef) -> DfsResult<bool> {
        self.create_child(path, || Node::file(replica)).await
    }

    /// Creates a directory node. The parent must already exist.
    pub async fn create_directory(&self, path: &DfsPath) -> DfsResult<bool> {
        self.create_child(path, Node::directory).await
    }

    async fn create_child(
        &self,
        path: &DfsPath,
        make: impl FnOnce() -> Arc<Node>,
    ) -> DfsResult<bool> {
        let (Some(parent_path), Some(name)) = (path.parent(), path.last()) else {
            return Ok(false);
        };
        let parent = self.resolve(&parent_path).await?;
        let NodeKind::Directory(children) = &parent.kind else {
            return Err(DfsError::not_found(format!("{parent_path} is not a directory")));
        };
        let mut children = children.lock().await;
        if children.contains_key(name) {
            return Ok(false);
        }
        children.insert(name.to_owned(), make());
        Ok(true)
    }

    /// Removes the subtree at `path` and asks every hosting storage server
    /// to delete its copy. Deleting the root is always refused.
    pub async fn delete(&self, path: &DfsPath) -> DfsResult<bool> {
        let (Some(parent_path), Some(name)) = (path.parent(), path.last()) else {
            return Ok(false);
        };
        let parent = self.resolve(&parent_path).await?;
        let NodeKind::Directory(children) = &parent.kind else {
            return Err(DfsError::not_found(format!("{parent_path} is not a directory")));
        };
        let target = children
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DfsError::not_found(path))?;

        for server in collect_replicas(&target).await {
            let command = self.link.command(&server);
            if let Err(error) = command.delete(path).await {
                warn!(%path, server = %server.command, %error, "storage delete failed");
            }
        }
        children.lock().await.remove(name);
        Ok(true)
    }

    /// A replica of the file at `path`, rotating across calls.
    pub async fn get_storage(&self, path: &DfsPath) -> DfsResult<StorageRef> {
        let node = self.resolve(path).await?;
        let NodeKind::File(state) = &node.kind else {
            return Err(DfsError::not_found(format!("{path} is not a file")));
        };
        let mut state = state.lock().await;
        if state.replicas.is_empty() {
            return Err(DfsError::not_found(path));
        }
        let index = state.next % state.replicas.len();
        state.next = state.next.wrapping_add(1);
        Ok(state.replicas[index])
    }

    /// Registers `server` and grafts the paths it hosts into the tree,
    /// creating missing intermediate directories. Returns the paths the
    /// caller must delete locally: anything that collided with an existing
    /// node, and always the root.
    pub async fn register_files(
        &self,
        server: StorageRef,
        paths: Vec<DfsPath>,
    ) -> DfsResult<Vec<DfsPath>> {
        self.registry.insert(server).await?;
        let mut duplicates = Vec::new();
        for path in paths {
            if !self.graft_file(&path, server).await {
                duplicates.push(path);
            }
        }
        Ok(duplicates)
    }

    /// Removes a single child entry without touching storage servers. Used
    /// to roll back a tree insertion whose physical creation failed.
    pub(crate) async fn remove_entry(&self, path: &DfsPath) -> DfsResult<()> {
        let (Some(parent_path), Some(name)) = (path.parent(), path.last()) else {
            return Err(DfsError::invalid("cannot remove the root"));
        };
        let parent = self.resolve(&parent_path).await?;
        let NodeKind::Directory(children) = &parent.kind else {
            return Err(DfsError::not_found(&parent_path));
        };
        children.lock().await.remove(name);
        Ok(())
    }

    async fn resolve(&self, path: &DfsPath) -> DfsResult<Arc<Node>> {
        let mut current = self.root.clone();
        for component in path.components() {
            match current.child(component).await {
                Some(child) => current = child,
                None => return Err(DfsError::not_found(path)),
            }
        }
        Ok(current)
    }

    async fn graft_file(&self, path: &DfsPath, replica: StorageRef) -> bool {
        if path.is_root() {
            return false;
        }
        let components: Vec<&str> = path.components().collect();
        let mut current = self.root.clone();
        for component in &components[..components.len() - 1] {
            let next = {
                let NodeKind::Directory(children) = &current.kind else { return false };
                let mut children = children.lock().await;
                match children.get(*component) {
                    Some(child) => child.clone(),
                    None => {
                        let created = Node::directory();
                        children.insert((*component).to_owned(), created.clone());
                        created
                    }
                }
            };
            current = next;
        }
        let NodeKind::Directory(children) = &current.kind else { return false };
        let mut children = children.lock().await;
        let name = components[components.len() - 1];
        if children.contains_key(name) {
            return false;
        }
        children.insert(name.to_owned(), Node::file(replica));
        true
    }

    /// Exclusive acquisition side effect: reduce the replica list to one,
    /// issuing a best-effort delete for every dropped copy. A writer is
    /// about to modify the file; stale copies must go before the caller
    /// observes the lock.
    async fn invalidate_extra_replicas(&self, path: &DfsPath, node: &Node) {
        let NodeKind::File(state) = &node.kind else { return };
        let stale = {
            let mut state = state.lock().await;
            if state.replicas.len() <= 1 {
                return;
            }
            state.next = 0;
            state.reads = 0;
            state.replicas.split_off(1)
        };
        for server in stale {
            let command = self.link.command(&server);
            if let Err(error) = command.delete(path).await {
                warn!(%path, server = %server.command, %error, "replica invalidation failed");
            }
        }
    }

    /// Shared acquisition side effect: once a single-replica file has been
    /// read often enough, mint a copy on an unused server. Copy failures
    /// are swallowed; the reader is never failed by replication.
    async fn replicate_if_hot(&self, path: &DfsPath, node: &Node) {
        let NodeKind::File(state) = &node.kind else { return };
        let primary = {
            let mut state = state.lock().await;
            state.reads += 1;
            if state.replicas.len() != 1 || state.reads < self.replication_threshold {
                return;
            }
            state.reads = 0;
            state.replicas[0]
        };
        let Some(target) = self.registry.pick_unused(&[primary]).await else {
            return;
        };
        let command = self.link.command(&target);
        match command.copy(path, primary.storage).await {
            Ok(true) => {
                let mut state = state.lock().await;
                if !state.replicas.contains(&target) {
                    state.replicas.push(target);
                }
            }
            Ok(false) => warn!(%path, target = %target.command, "replica copy refused"),
            Err(error) => warn!(%path, target = %target.command, %error, "replica copy failed"),
        }
    }

    #[cfg(test)]
    pub(crate) async fn replicas_of(&self, path: &DfsPath) -> DfsResult<Vec<StorageRef>> {
        let node = self.resolve(path).await?;
        let NodeKind::File(state) = &node.kind else {
            return Err(DfsError::not_found(format!("{path} is not a file")));
        };
        let state = state.lock().await;
        Ok(state.replicas.clone())
    }
}

async fn release_stack(held: &[Arc<Node>]) {
    for node in held.iter().rev() {
        // The stack holds only locks this walk actually took, all shared.
        let _ = node.lock.release(Mode::Shared).await;
    }
}

async fn collect_replicas(root: &Arc<Node>) -> Vec<StorageRef> {
    let mut servers = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(current) = stack.pop() {
        match &current.kind {
            NodeKind::Directory(children) => {
                stack.extend(children.lock().await.values().cloned());
            }
            NodeKind::File(state) => {
                for server in &state.lock().await.replicas {
                    if !servers.contains(server) {
                        servers.push(*server);
                    }
                }
            }
        }
    }
    servers
}
