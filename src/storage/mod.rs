//! Disk-backed storage server.
//!
//! Serves a region of the local filesystem through the two storage-side
//! remote interfaces: [`StorageOp`] for client file I/O and [`CommandOp`]
//! for naming-server administration. On startup the server walks its root,
//! registers every regular file with the naming server, and deletes the
//! duplicates the naming server reports back before serving clients.

use std::cmp::min;
use std::io::SeekFrom;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::StorageConfig;
use crate::error::{DfsError, DfsResult};
use crate::path::DfsPath;
use crate::proto::dispatch::{CommandDispatcher, StorageDispatcher};
use crate::proto::proxy::{RegistrationProxy, StorageProxy};
use crate::proto::{CommandOp, Registration, StorageOp, StorageRef};
use crate::rpc::listener::Listener;

/// Chunk size used when pulling a file from another storage server.
pub const COPY_CHUNK: u32 = 1 << 20;

/// File operations over a declared root directory. Path `/a/b` maps to the
/// local file `root/a/b`.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local(&self, path: &DfsPath) -> PathBuf {
        let mut full = self.root.clone();
        for component in path.components() {
            full.push(component);
        }
        full
    }

    async fn regular_file(&self, path: &DfsPath) -> DfsResult<(PathBuf, u64)> {
        let full = self.local(path);
        let meta = fs::metadata(&full).await.map_err(|_| DfsError::not_found(path))?;
        if !meta.is_file() {
            return Err(DfsError::not_found(format!("{path} is not a file")));
        }
        Ok((full, meta.len()))
    }

    /// Removes empty directories above a deleted entry, stopping at the
    /// first non-empty one and never touching the root itself.
    async fn prune_empty_parents(&self, path: &DfsPath) {
        let mut current = path.parent();
        while let Some(parent) = current {
            if parent.is_root() {
                break;
            }
            if fs::remove_dir(self.local(&parent)).await.is_err() {
                break;
            }
            current = parent.parent();
        }
    }
}

#[async_trait]
impl StorageOp for DiskStore {
    async fn size(&self, path: &DfsPath) -> DfsResult<u64> {
        let (_, size) = self.regular_file(path).await?;
        Ok(size)
    }

    async fn read(&self, path: &DfsPath, offset: u64, length: u32) -> DfsResult<Vec<u8>> {
        let (full, size) = self.regular_file(path).await?;
        let end = offset
            .checked_add(u64::from(length))
            .ok_or_else(|| DfsError::invalid("read range overflows"))?;
        if end > size {
            return Err(DfsError::invalid(format!(
                "read of {length} bytes at {offset} exceeds {size}-byte file {path}"
            )));
        }
        let mut file = fs::File::open(&full).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut data = vec![0u8; length as usize];
        file.read_exact(&mut data).await?;
        Ok(data)
    }

    async fn write(&self, path: &DfsPath, offset: u64, data: &[u8]) -> DfsResult<()> {
        let (full, _) = self.regular_file(path).await?;
        let mut file = OpenOptions::new().write(true).open(&full).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl CommandOp for DiskStore {
    async fn create(&self, path: &DfsPath) -> DfsResult<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let full = self.local(path);
        if fs::try_exists(&full).await? {
            return Ok(false);
        }
        if let Some(parent) = full.parent() {
            if fs::create_dir_all(parent).await.is_err() {
                return Ok(false);
            }
        }
        Ok(fs::File::create(&full).await.is_ok())
    }

    async fn delete(&self, path: &DfsPath) -> DfsResult<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let full = self.local(path);
        let Ok(meta) = fs::metadata(&full).await else {
            return Ok(false);
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&full).await
        } else {
            fs::remove_file(&full).await
        };
        if removed.is_err() {
            return Ok(false);
        }
        self.prune_empty_parents(path).await;
        Ok(true)
    }

    async fn copy(&self, path: &DfsPath, source: SocketAddr) -> DfsResult<bool> {
        let origin = StorageProxy::new(source);
        let total = origin.size(path).await?;

        let full = self.local(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&full).await?;
        let mut offset = 0u64;
        while offset < total {
            let chunk = min(u64::from(COPY_CHUNK), total - offset) as u32;
            let data = origin.read(path, offset, chunk).await?;
            if data.is_empty() {
                return Err(DfsError::remote(format!("short read while copying {path}")));
            }
            file.write_all(&data).await?;
            offset += data.len() as u64;
        }
        file.flush().await?;
        Ok(true)
    }
}

/// A storage server process: the disk store behind two listeners, plus the
/// startup walk and registration handshake.
pub struct StorageServer {
    config: StorageConfig,
    store: Arc<DiskStore>,
    storage: Listener,
    command: Listener,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl StorageServer {
    pub fn new(config: StorageConfig) -> Self {
        let store = Arc::new(DiskStore::new(config.root.clone()));
        let storage = Listener::new(Arc::new(StorageDispatcher::new(store.clone())));
        let command = Listener::new(Arc::new(CommandDispatcher::new(store.clone())));
        Self {
            config,
            store,
            storage,
            command,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Brings up both listeners, announces the hosted files to the naming
    /// server, and deletes the returned duplicates locally. Single-shot.
    pub async fn start(&self) -> DfsResult<StorageRef> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DfsError::state("storage server already started"));
        }
        let storage_addr = self
            .storage
            .start(SocketAddr::new(self.config.host, self.config.storage_port))
            .await?;
        let command_bind = SocketAddr::new(self.config.host, self.config.command_port);
        let command_addr = match self.command.start(command_bind).await {
            Ok(addr) => addr,
            Err(error) => {
                self.storage.stop().await;
                return Err(error);
            }
        };

        let hosted = match self.enumerate().await {
            Ok(hosted) => hosted,
            Err(error) => {
                self.stop().await;
                return Err(error);
            }
        };
        let naming = RegistrationProxy::new(self.config.naming);
        let duplicates = match naming.register(storage_addr, command_addr, hosted).await {
            Ok(duplicates) => duplicates,
            Err(error) => {
                self.stop().await;
                return Err(error);
            }
        };
        for path in &duplicates {
            if let Err(error) = self.store.delete(path).await {
                warn!(%path, %error, "pruning a duplicate failed");
            }
        }

        info!(%storage_addr, %command_addr, pruned = duplicates.len(), "storage server started");
        Ok(StorageRef::new(storage_addr, command_addr))
    }

    /// Tears down both listeners. Stopping a stopped server is a no-op.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.storage.stop().await;
        self.command.stop().await;
    }

    async fn enumerate(&self) -> DfsResult<Vec<DfsPath>> {
        let root = self.store.root().to_path_buf();
        tokio::task::spawn_blocking(move || scan_root(&root))
            .await
            .map_err(|err| DfsError::remote(format!("scan task failed: {err}")))?
    }
}

/// Walks `root` and forms the relative path of every readable regular
/// file. Files that cannot be opened for reading, or whose names cannot be
/// expressed as path components, are skipped rather than failing startup.
fn scan_root(root: &Path) -> DfsResult<Vec<DfsPath>> {
    let mut hosted = Vec::new();
    for entry in WalkDir::new(root) {
        let entry =
            entry.map_err(|err| DfsError::invalid(format!("walk {}: {err}", root.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if std::fs::File::open(entry.path()).is_err() {
            warn!(path = %entry.path().display(), "skipping unreadable file");
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        match relative_to_dfs(relative) {
            Some(path) => hosted.push(path),
            None => warn!(path = %entry.path().display(), "skipping unrepresentable name"),
        }
    }
    Ok(hosted)
}

fn relative_to_dfs(relative: &Path) -> Option<DfsPath> {
    let mut path = DfsPath::root();
    for component in relative.components() {
        let name = component.as_os_str().to_str()?;
        path = path.child(name).ok()?;
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    struct Fixture {
        tempdir: TempDir,
        store: DiskStore,
    }

    impl Fixture {
        fn new() -> Self {
            let tempdir = TempDir::new().expect("create temp dir");
            let store = DiskStore::new(tempdir.path().to_path_buf());
            Self { tempdir, store }
        }

        fn write_file(&self, relative: &str, data: &[u8]) {
            let full = self.tempdir.path().join(relative);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).expect("create fixture dirs");
            }
            std::fs::write(full, data).expect("write fixture file");
        }
    }

    fn path(s: &str) -> DfsPath {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn size_and_read_respect_file_bounds() {
        let fixture = Fixture::new();
        fixture.write_file("a/data.bin", b"0123456789");

        let p = path("/a/data.bin");
        assert_eq!(fixture.store.size(&p).await.unwrap(), 10);
        assert_eq!(fixture.store.read(&p, 2, 4).await.unwrap(), b"2345");
        assert_eq!(fixture.store.read(&p, 10, 0).await.unwrap(), b"");

        assert!(matches!(
            fixture.store.read(&p, 8, 4).await,
            Err(DfsError::ArgumentInvalid(_))
        ));
        assert!(matches!(
            fixture.store.read(&p, u64::MAX, 1).await,
            Err(DfsError::ArgumentInvalid(_))
        ));
        assert!(matches!(
            fixture.store.size(&path("/a")).await,
            Err(DfsError::NotFound(_))
        ));
        assert!(matches!(
            fixture.store.read(&path("/ghost"), 0, 1).await,
            Err(DfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn write_extends_the_file_as_needed() {
        let fixture = Fixture::new();
        fixture.write_file("f", b"abc");

        let p = path("/f");
        fixture.store.write(&p, 1, b"XY").await.unwrap();
        assert_eq!(std::fs::read(fixture.tempdir.path().join("f")).unwrap(), b"aXY");

        fixture.store.write(&p, 5, b"ZZ").await.unwrap();
        assert_eq!(fixture.store.size(&p).await.unwrap(), 7);

        assert!(matches!(
            fixture.store.write(&path("/ghost"), 0, b"x").await,
            Err(DfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_refuses_existing_files_and_the_root() {
        let fixture = Fixture::new();
        fixture.write_file("present", b"");

        assert!(!fixture.store.create(&DfsPath::root()).await.unwrap());
        assert!(!fixture.store.create(&path("/present")).await.unwrap());
        assert!(fixture.store.create(&path("/fresh/nested/file")).await.unwrap());
        assert!(fixture.tempdir.path().join("fresh/nested/file").is_file());
    }

    #[tokio::test]
    async fn delete_prunes_empty_parents_but_not_the_root() {
        let fixture = Fixture::new();
        fixture.write_file("a/b/c/file", b"x");
        fixture.write_file("a/keep", b"y");

        assert!(fixture.store.delete(&path("/a/b/c/file")).await.unwrap());
        assert!(!fixture.tempdir.path().join("a/b").exists());
        assert!(fixture.tempdir.path().join("a/keep").is_file());

        assert!(fixture.store.delete(&path("/a/keep")).await.unwrap());
        assert!(!fixture.tempdir.path().join("a").exists());
        assert!(fixture.tempdir.path().exists());

        assert!(!fixture.store.delete(&path("/ghost")).await.unwrap());
        assert!(!fixture.store.delete(&DfsPath::root()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_directories_recursively() {
        let fixture = Fixture::new();
        fixture.write_file("d/one", b"1");
        fixture.write_file("d/sub/two", b"2");

        assert!(fixture.store.delete(&path("/d")).await.unwrap());
        assert!(!fixture.tempdir.path().join("d").exists());
    }

    #[test]
    fn scan_forms_relative_paths_for_regular_files() {
        let fixture = Fixture::new();
        fixture.write_file("a/b.txt", b"b");
        fixture.write_file("c/d.txt", b"d");
        std::fs::create_dir_all(fixture.tempdir.path().join("empty")).unwrap();

        let mut hosted = scan_root(fixture.tempdir.path()).unwrap();
        hosted.sort();
        assert_eq!(hosted, vec![path("/a/b.txt"), path("/c/d.txt")]);
    }
}
