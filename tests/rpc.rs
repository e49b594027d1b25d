//! Transport-level behavior: listener lifecycle, proxy semantics, error
//! round-trips.

mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use driftfs::error::{DfsError, DfsResult};
use driftfs::path::DfsPath;
use driftfs::proto::dispatch::CommandDispatcher;
use driftfs::proto::proxy::CommandProxy;
use driftfs::proto::CommandOp;
use driftfs::rpc::client;
use driftfs::rpc::listener::{Listener, ListenerEvents};

use common::{localhost, path};

struct EchoCommand;

#[async_trait]
impl CommandOp for EchoCommand {
    async fn create(&self, _path: &DfsPath) -> DfsResult<bool> {
        Ok(true)
    }

    async fn delete(&self, path: &DfsPath) -> DfsResult<bool> {
        Err(DfsError::not_found(path))
    }

    async fn copy(&self, _path: &DfsPath, _source: SocketAddr) -> DfsResult<bool> {
        Ok(false)
    }
}

fn echo_listener() -> Listener {
    Listener::new(Arc::new(CommandDispatcher::new(Arc::new(EchoCommand))))
}

fn ephemeral() -> SocketAddr {
    SocketAddr::new(localhost(), 0)
}

#[tokio::test]
async fn calls_round_trip_values_and_errors() {
    let listener = echo_listener();
    let addr = listener.start(ephemeral()).await.unwrap();
    let proxy = CommandProxy::new(addr);

    assert!(proxy.create(&path("/f")).await.unwrap());
    assert!(!proxy.copy(&path("/f"), ephemeral()).await.unwrap());
    assert_eq!(proxy.delete(&path("/f")).await, Err(DfsError::not_found(path("/f"))));

    listener.stop().await;
}

#[tokio::test]
async fn concurrent_calls_each_get_their_own_task() {
    let listener = echo_listener();
    let addr = listener.start(ephemeral()).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..32 {
        tasks.push(tokio::spawn(async move {
            let proxy = CommandProxy::new(addr);
            proxy.create(&path(&format!("/f{i}"))).await.unwrap()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }

    listener.stop().await;
}

#[tokio::test]
async fn unknown_methods_become_remote_errors() {
    let listener = echo_listener();
    let addr = listener.start(ephemeral()).await.unwrap();

    let result: DfsResult<bool> = client::call(addr, "Command.chmod", &["Path"], &(path("/f"),)).await;
    assert!(matches!(result, Err(DfsError::Remote(_))));

    let result: DfsResult<bool> =
        client::call(addr, "Command.create", &["Path", "u64"], &(path("/f"),)).await;
    assert!(matches!(result, Err(DfsError::Remote(_))));

    listener.stop().await;
}

#[tokio::test]
async fn start_is_single_shot_and_reports_the_bound_address() {
    let listener = echo_listener();
    assert!(matches!(listener.local_addr().await, Err(DfsError::State(_))));

    let addr = listener.start(ephemeral()).await.unwrap();
    assert_ne!(addr.port(), 0);
    assert_eq!(listener.local_addr().await.unwrap(), addr);

    assert!(matches!(listener.start(ephemeral()).await, Err(DfsError::State(_))));
    listener.stop().await;
    assert!(matches!(listener.start(ephemeral()).await, Err(DfsError::State(_))));
}

struct RecordingEvents {
    stopped: Mutex<Vec<Option<DfsError>>>,
}

impl ListenerEvents for RecordingEvents {
    fn stopped(&self, cause: Option<DfsError>) {
        self.stopped.lock().unwrap().push(cause);
    }
}

#[tokio::test]
async fn stop_unblocks_the_accept_task_and_fires_the_hook() {
    let events = Arc::new(RecordingEvents { stopped: Mutex::new(Vec::new()) });
    let listener = Listener::with_events(
        Arc::new(CommandDispatcher::new(Arc::new(EchoCommand))),
        events.clone(),
    );
    let addr = listener.start(ephemeral()).await.unwrap();

    listener.stop().await;
    assert_eq!(*events.stopped.lock().unwrap(), vec![None]);

    let proxy = CommandProxy::new(addr);
    assert!(matches!(proxy.create(&path("/f")).await, Err(DfsError::Remote(_))));
}

#[tokio::test]
async fn connecting_to_nothing_is_a_remote_error() {
    let listener = echo_listener();
    let addr = listener.start(ephemeral()).await.unwrap();
    listener.stop().await;

    let proxy = CommandProxy::new(addr);
    assert!(matches!(proxy.create(&path("/f")).await, Err(DfsError::Remote(_))));
}
