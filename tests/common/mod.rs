#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use driftfs::config::NamingConfig;
use driftfs::error::DfsResult;
use driftfs::naming::NamingServer;
use driftfs::path::DfsPath;
use driftfs::proto::dispatch::{CommandDispatcher, StorageDispatcher};
use driftfs::proto::proxy::{RegistrationProxy, ServiceProxy};
use driftfs::proto::{CommandOp, Registration, StorageOp, StorageRef};
use driftfs::rpc::listener::Listener;

pub fn localhost() -> IpAddr {
    "127.0.0.1".parse().unwrap()
}

pub fn path(s: &str) -> DfsPath {
    s.parse().unwrap()
}

/// An in-process naming server on ephemeral ports, plus proxies to both of
/// its interfaces.
pub struct NamingFixture {
    pub server: NamingServer,
    pub service: ServiceProxy,
    pub registration: RegistrationProxy,
}

impl NamingFixture {
    pub async fn spawn(replication_threshold: usize) -> Self {
        let server = NamingServer::new(NamingConfig {
            host: localhost(),
            service_port: 0,
            registration_port: 0,
            replication_threshold,
        });
        server.start().await.expect("start naming server");
        let service = ServiceProxy::new(server.service_addr().await.expect("service address"));
        let registration =
            RegistrationProxy::new(server.registration_addr().await.expect("registration address"));
        Self { server, service, registration }
    }

    pub async fn register(&self, storage: &MockStorageServer, paths: &[&str]) -> Vec<DfsPath> {
        self.registration
            .register(
                storage.endpoints.storage,
                storage.endpoints.command,
                paths.iter().map(|p| path(p)).collect(),
            )
            .await
            .expect("register storage server")
    }
}

/// Records the administrative traffic a storage server receives.
#[derive(Default)]
pub struct MockStorage {
    pub created: Mutex<Vec<DfsPath>>,
    pub deleted: Mutex<Vec<DfsPath>>,
    pub copied: Mutex<Vec<(DfsPath, SocketAddr)>>,
}

#[async_trait]
impl StorageOp for MockStorage {
    async fn size(&self, _path: &DfsPath) -> DfsResult<u64> {
        Ok(0)
    }

    async fn read(&self, _path: &DfsPath, _offset: u64, _length: u32) -> DfsResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn write(&self, _path: &DfsPath, _offset: u64, _data: &[u8]) -> DfsResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CommandOp for MockStorage {
    async fn create(&self, path: &DfsPath) -> DfsResult<bool> {
        self.created.lock().unwrap().push(path.clone());
        Ok(true)
    }

    async fn delete(&self, path: &DfsPath) -> DfsResult<bool> {
        self.deleted.lock().unwrap().push(path.clone());
        Ok(true)
    }

    async fn copy(&self, path: &DfsPath, source: SocketAddr) -> DfsResult<bool> {
        self.copied.lock().unwrap().push((path.clone(), source));
        Ok(true)
    }
}

/// A [`MockStorage`] served on real ephemeral listeners, so the naming
/// server talks to it over the wire exactly as it would in production.
pub struct MockStorageServer {
    pub mock: Arc<MockStorage>,
    pub endpoints: StorageRef,
    storage_listener: Listener,
    command_listener: Listener,
}

impl MockStorageServer {
    pub async fn spawn() -> Self {
        let mock = Arc::new(MockStorage::default());
        let storage_listener = Listener::new(Arc::new(StorageDispatcher::new(mock.clone())));
        let command_listener = Listener::new(Arc::new(CommandDispatcher::new(mock.clone())));
        let ephemeral = SocketAddr::new(localhost(), 0);
        let storage = storage_listener.start(ephemeral).await.expect("start storage listener");
        let command = command_listener.start(ephemeral).await.expect("start command listener");
        Self { mock, endpoints: StorageRef::new(storage, command), storage_listener, command_listener }
    }

    pub async fn stop(&self) {
        self.storage_listener.stop().await;
        self.command_listener.stop().await;
    }

    pub fn deleted(&self) -> Vec<DfsPath> {
        self.mock.deleted.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<DfsPath> {
        self.mock.created.lock().unwrap().clone()
    }

    pub fn copied(&self) -> Vec<(DfsPath, SocketAddr)> {
        self.mock.copied.lock().unwrap().clone()
    }
}
