//! Typed proxies, one per remote interface.
//!
//! A proxy carries its interface and target address; equality, hashing and
//! the printable form are structural on both and never touch the network.
//! Each method marshals its arguments through [`crate::rpc::client::call`].

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::DfsResult;
use crate::path::DfsPath;
use crate::proto::methods;
use crate::proto::{CommandOp, Registration, Service, StorageOp};
use crate::rpc::client;

/// Proxy to a [`Service`] interface at a remote address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceProxy {
    addr: SocketAddr,
}

impl ServiceProxy {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for ServiceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service@{}", self.addr)
    }
}

#[async_trait]
impl Service for ServiceProxy {
    async fn lock(&self, path: &DfsPath, exclusive: bool) -> DfsResult<()> {
        let (method, descriptors) = methods::SERVICE_LOCK;
        client::call(self.addr, method, descriptors, &(path, exclusive)).await
    }

    async fn unlock(&self, path: &DfsPath, exclusive: bool) -> DfsResult<()> {
        let (method, descriptors) = methods::SERVICE_UNLOCK;
        client::call(self.addr, method, descriptors, &(path, exclusive)).await
    }

    async fn is_directory(&self, path: &DfsPath) -> DfsResult<bool> {
        let (method, descriptors) = methods::SERVICE_IS_DIRECTORY;
        client::call(self.addr, method, descriptors, &(path,)).await
    }

    async fn list(&self, directory: &DfsPath) -> DfsResult<Vec<String>> {
        let (method, descriptors) = methods::SERVICE_LIST;
        client::call(self.addr, method, descriptors, &(directory,)).await
    }

    async fn create_file(&self, path: &DfsPath) -> DfsResult<bool> {
        let (method, descriptors) = methods::SERVICE_CREATE_FILE;
        client::call(self.addr, method, descriptors, &(path,)).await
    }

    async fn create_directory(&self, directory: &DfsPath) -> DfsResult<bool> {
        let (method, descriptors) = methods::SERVICE_CREATE_DIRECTORY;
        client::call(self.addr, method, descriptors, &(directory,)).await
    }

    async fn delete(&self, path: &DfsPath) -> DfsResult<bool> {
        let (method, descriptors) = methods::SERVICE_DELETE;
        client::call(self.addr, method, descriptors, &(path,)).await
    }

    async fn get_storage(&self, path: &DfsPath) -> DfsResult<SocketAddr> {
        let (method, descriptors) = methods::SERVICE_GET_STORAGE;
        client::call(self.addr, method, descriptors, &(path,)).await
    }
}

/// Proxy to a [`Registration`] interface at a remote address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationProxy {
    addr: SocketAddr,
}

impl RegistrationProxy {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for RegistrationProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registration@{}", self.addr)
    }
}

#[async_trait]
impl Registration for RegistrationProxy {
    async fn register(
        &self,
        storage: SocketAddr,
        command: SocketAddr,
        paths: Vec<DfsPath>,
    ) -> DfsResult<Vec<DfsPath>> {
        let (method, descriptors) = methods::REGISTRATION_REGISTER;
        client::call(self.addr, method, descriptors, &(storage, command, paths)).await
    }
}

/// Proxy to a [`StorageOp`] interface at a remote address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageProxy {
    addr: SocketAddr,
}

impl StorageProxy {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for StorageProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Storage@{}", self.addr)
    }
}

#[async_trait]
impl StorageOp for StorageProxy {
    async fn size(&self, path: &DfsPath) -> DfsResult<u64> {
        let (method, descriptors) = methods::STORAGE_SIZE;
        client::call(self.addr, method, descriptors, &(path,)).await
    }

    async fn read(&self, path: &DfsPath, offset: u64, length: u32) -> DfsResult<Vec<u8>> {
        let (method, descriptors) = methods::STORAGE_READ;
        client::call(self.addr, method, descriptors, &(path, offset, length)).await
    }

    async fn write(&self, path: &DfsPath, offset: u64, data: &[u8]) -> DfsResult<()> {
        let (method, descriptors) = methods::STORAGE_WRITE;
        client::call(self.addr, method, descriptors, &(path, offset, data)).await
    }
}

/// Proxy to a [`CommandOp`] interface at a remote address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandProxy {
    addr: SocketAddr,
}

impl CommandProxy {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for CommandProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command@{}", self.addr)
    }
}

#[async_trait]
impl CommandOp for CommandProxy {
    async fn create(&self, path: &DfsPath) -> DfsResult<bool> {
        let (method, descriptors) = methods::COMMAND_CREATE;
        client::call(self.addr, method, descriptors, &(path,)).await
    }

    async fn delete(&self, path: &DfsPath) -> DfsResult<bool> {
        let (method, descriptors) = methods::COMMAND_DELETE;
        client::call(self.addr, method, descriptors, &(path,)).await
    }

    async fn copy(&self, path: &DfsPath, source: SocketAddr) -> DfsResult<bool> {
        let (method, descriptors) = methods::COMMAND_COPY;
        client::call(self.addr, method, descriptors, &(path, source)).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;

    fn hash_of(value: &impl Hash) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn proxies_compare_and_hash_structurally() {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let a = ServiceProxy::new(addr);
        let b = ServiceProxy::new(addr);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let other = ServiceProxy::new("127.0.0.1:9998".parse().unwrap());
        assert_ne!(a, other);
    }

    #[test]
    fn printable_form_names_interface_and_address() {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(ServiceProxy::new(addr).to_string(), "Service@127.0.0.1:9999");
        assert_eq!(RegistrationProxy::new(addr).to_string(), "Registration@127.0.0.1:9999");
        assert_eq!(StorageProxy::new(addr).to_string(), "Storage@127.0.0.1:9999");
        assert_eq!(CommandProxy::new(addr).to_string(), "Command@127.0.0.1:9999");
    }
}
