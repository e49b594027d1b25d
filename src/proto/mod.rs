//! Remote interface contracts spoken between clients, the naming server,
//! and storage servers.
//!
//! Every method of a remote interface returns [`DfsResult`], so every call
//! site is prepared for [`crate::error::DfsError::Remote`] on top of the
//! operation's own logical errors. Each interface has one typed proxy
//! ([`proxy`]) and one server-side dispatcher ([`dispatch`]); the two agree
//! on the method identities and parameter type descriptors in [`methods`].

pub mod dispatch;
pub mod proxy;

use std::net::SocketAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DfsResult;
use crate::path::DfsPath;

/// Identifies one storage server by its two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRef {
    /// Endpoint serving client file I/O ([`StorageOp`]).
    pub storage: SocketAddr,
    /// Endpoint serving naming-server commands ([`CommandOp`]).
    pub command: SocketAddr,
}

impl StorageRef {
    pub fn new(storage: SocketAddr, command: SocketAddr) -> Self {
        Self { storage, command }
    }
}

/// Client-facing interface of the naming server.
#[async_trait]
pub trait Service: Send + Sync {
    /// Acquires the tree lock on `path` in shared or exclusive mode.
    async fn lock(&self, path: &DfsPath, exclusive: bool) -> DfsResult<()>;

    /// Releases the locks acquired by a matching [`Service::lock`] call.
    async fn unlock(&self, path: &DfsPath, exclusive: bool) -> DfsResult<()>;

    /// True if `path` names a directory, false if it names a file.
    async fn is_directory(&self, path: &DfsPath) -> DfsResult<bool>;

    /// Names of the children of the directory at `path`.
    async fn list(&self, directory: &DfsPath) -> DfsResult<Vec<String>>;

    /// Creates an empty file, placing it on one registered storage server.
    async fn create_file(&self, path: &DfsPath) -> DfsResult<bool>;

    /// Creates a directory node. The parent must already exist.
    async fn create_directory(&self, directory: &DfsPath) -> DfsResult<bool>;

    /// Removes the subtree at `path`, including the physical copies.
    async fn delete(&self, path: &DfsPath) -> DfsResult<bool>;

    /// A storage endpoint hosting the file at `path`, rotating per call.
    async fn get_storage(&self, path: &DfsPath) -> DfsResult<SocketAddr>;
}

/// Storage-server-facing interface of the naming server.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Registers a storage server and the paths it already hosts. The
    /// returned paths are duplicates the caller must delete locally before
    /// serving clients.
    async fn register(
        &self,
        storage: SocketAddr,
        command: SocketAddr,
        paths: Vec<DfsPath>,
    ) -> DfsResult<Vec<DfsPath>>;
}

/// Client-facing interface of a storage server.
#[async_trait]
pub trait StorageOp: Send + Sync {
    /// Size in bytes of the file at `path`.
    async fn size(&self, path: &DfsPath) -> DfsResult<u64>;

    /// Reads `length` bytes at `offset`. The range must lie within the file.
    async fn read(&self, path: &DfsPath, offset: u64, length: u32) -> DfsResult<Vec<u8>>;

    /// Writes `data` at `offset`, extending the file as needed.
    async fn write(&self, path: &DfsPath, offset: u64, data: &[u8]) -> DfsResult<()>;
}

/// Naming-server-facing command interface of a storage server.
#[async_trait]
pub trait CommandOp: Send + Sync {
    /// Creates an empty file, with any missing parent directories.
    async fn create(&self, path: &DfsPath) -> DfsResult<bool>;

    /// Recursively deletes `path` and prunes empty parent directories.
    async fn delete(&self, path: &DfsPath) -> DfsResult<bool>;

    /// Fetches the file at `path` from the storage interface at `source`
    /// and writes it locally.
    async fn copy(&self, path: &DfsPath, source: SocketAddr) -> DfsResult<bool>;
}

/// Wire identities and parameter type descriptors of every remote method.
///
/// The descriptors ride along in each call frame so the two sides can
/// detect schema disagreements before deserializing the argument tuple.
pub mod methods {
    pub type Method = (&'static str, &'static [&'static str]);

    pub const SERVICE_LOCK: Method = ("Service.lock", &["Path", "bool"]);
    pub const SERVICE_UNLOCK: Method = ("Service.unlock", &["Path", "bool"]);
    pub const SERVICE_IS_DIRECTORY: Method = ("Service.isDirectory", &["Path"]);
    pub const SERVICE_LIST: Method = ("Service.list", &["Path"]);
    pub const SERVICE_CREATE_FILE: Method = ("Service.createFile", &["Path"]);
    pub const SERVICE_CREATE_DIRECTORY: Method = ("Service.createDirectory", &["Path"]);
    pub const SERVICE_DELETE: Method = ("Service.delete", &["Path"]);
    pub const SERVICE_GET_STORAGE: Method = ("Service.getStorage", &["Path"]);

    pub const REGISTRATION_REGISTER: Method =
        ("Registration.register", &["SocketAddr", "SocketAddr", "PathList"]);

    pub const STORAGE_SIZE: Method = ("Storage.size", &["Path"]);
    pub const STORAGE_READ: Method = ("Storage.read", &["Path", "u64", "u32"]);
    pub const STORAGE_WRITE: Method = ("Storage.write", &["Path", "u64", "bytes"]);

    pub const COMMAND_CREATE: Method = ("Command.create", &["Path"]);
    pub const COMMAND_DELETE: Method = ("Command.delete", &["Path"]);
    pub const COMMAND_COPY: Method = ("Command.copy", &["Path", "SocketAddr"]);
}
