//! Nodes of the directory tree.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::proto::StorageRef;
use crate::tree::lock::NodeLock;

/// One node of the directory tree. The variant is fixed at creation; the
/// root is always a directory.
pub(super) struct Node {
    pub(super) lock: NodeLock,
    pub(super) kind: NodeKind,
}

pub(super) enum NodeKind {
    /// Child-component to child-node mapping.
    Directory(Mutex<HashMap<String, Arc<Node>>>),
    /// Replica bookkeeping for one file.
    File(Mutex<FileState>),
}

pub(super) struct FileState {
    /// Storage servers hosting the file. Never empty while the node is
    /// linked into the tree.
    pub replicas: Vec<StorageRef>,
    /// Rotation cursor for read load balancing.
    pub next: usize,
    /// Shared acquisitions since the last replication decision.
    pub reads: usize,
}

impl Node {
    pub(super) fn directory() -> Arc<Self> {
        Arc::new(Self { lock: NodeLock::new(), kind: NodeKind::Directory(Mutex::new(HashMap::new())) })
    }

    pub(super) fn file(replica: StorageRef) -> Arc<Self> {
        Arc::new(Self {
            lock: NodeLock::new(),
            kind: NodeKind::File(Mutex::new(FileState { replicas: vec![replica], next: 0, reads: 0 })),
        })
    }

    pub(super) fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    /// The named child of a directory node; `None` for files and absent names.
    pub(super) async fn child(&self, name: &str) -> Option<Arc<Node>> {
        match &self.kind {
            NodeKind::Directory(children) => children.lock().await.get(name).cloned(),
            NodeKind::File(_) => None,
        }
    }
}
