//! TCP listener exposing a dispatcher on a network endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DfsError, DfsResult};
use crate::rpc::codec;
use crate::rpc::{read_record, write_record, Dispatch};

/// Observer hooks for listener lifecycle and failures.
///
/// Default implementations forward everything to tracing, so a plain
/// [`LogEvents`] is enough when no caller needs to intercept.
pub trait ListenerEvents: Send + Sync {
    /// The accept task has exited. `cause` is `None` after a requested stop,
    /// or the failure that tore the listening socket down.
    fn stopped(&self, cause: Option<DfsError>) {
        match cause {
            None => info!("listener stopped"),
            Some(error) => warn!(%error, "listener stopped"),
        }
    }

    /// Accepting a connection failed.
    fn listen_error(&self, error: &DfsError) {
        warn!(%error, "accept failed");
    }

    /// Serving a single call failed after the connection was accepted.
    fn service_error(&self, error: &DfsError) {
        debug!(%error, "service task failed");
    }
}

/// [`ListenerEvents`] implementation that only logs.
pub struct LogEvents;

impl ListenerEvents for LogEvents {}

enum Stage {
    Idle,
    Running,
    Stopped,
}

struct Lifecycle {
    stage: Stage,
    addr: Option<SocketAddr>,
    shutdown: Option<watch::Sender<bool>>,
    accept_task: Option<JoinHandle<()>>,
}

/// Exposes a remote interface implementation on a TCP endpoint.
///
/// `start` binds the address (system-chosen port if the bind address carries
/// port 0), then accepts connections in a dedicated task, spawning one task
/// per accepted connection. The listener is single-shot: once stopped it
/// cannot be started again.
pub struct Listener {
    dispatcher: Arc<dyn Dispatch>,
    events: Arc<dyn ListenerEvents>,
    lifecycle: Mutex<Lifecycle>,
}

impl Listener {
    /// Creates a listener backed by `dispatcher`, logging lifecycle events.
    pub fn new(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self::with_events(dispatcher, Arc::new(LogEvents))
    }

    /// Creates a listener with caller-supplied lifecycle hooks.
    pub fn with_events(dispatcher: Arc<dyn Dispatch>, events: Arc<dyn ListenerEvents>) -> Self {
        Self {
            dispatcher,
            events,
            lifecycle: Mutex::new(Lifecycle {
                stage: Stage::Idle,
                addr: None,
                shutdown: None,
                accept_task: None,
            }),
        }
    }

    /// Binds `bind` and starts accepting. Does not return until the
    /// listening socket is ready; the bound address is returned so callers
    /// can ask for system-chosen ports immediately.
    pub async fn start(&self, bind: SocketAddr) -> DfsResult<SocketAddr> {
        let mut lifecycle = self.lifecycle.lock().await;
        match lifecycle.stage {
            Stage::Idle => {}
            Stage::Running => return Err(DfsError::state("listener already started")),
            Stage::Stopped => return Err(DfsError::state("listener is not restartable")),
        }

        let socket = TcpListener::bind(bind)
            .await
            .map_err(|err| DfsError::remote(format!("bind {bind}: {err}")))?;
        let addr = socket.local_addr()?;
        info!(interface = self.dispatcher.interface(), %addr, "listener started");

        let (shutdown, shutdown_recv) = watch::channel(false);
        let task = tokio::spawn(accept_loop(
            socket,
            self.dispatcher.clone(),
            self.events.clone(),
            shutdown_recv,
        ));

        lifecycle.stage = Stage::Running;
        lifecycle.addr = Some(addr);
        lifecycle.shutdown = Some(shutdown);
        lifecycle.accept_task = Some(task);
        Ok(addr)
    }

    /// The bound address while running.
    pub async fn local_addr(&self) -> DfsResult<SocketAddr> {
        self.lifecycle
            .lock()
            .await
            .addr
            .ok_or_else(|| DfsError::state("listener is not running"))
    }

    /// Unblocks the accept task and waits for it to exit. In-flight service
    /// tasks are left to finish on their own. Stopping an already stopped
    /// listener is a no-op.
    pub async fn stop(&self) {
        let task = {
            let mut lifecycle = self.lifecycle.lock().await;
            if !matches!(lifecycle.stage, Stage::Running) {
                return;
            }
            lifecycle.stage = Stage::Stopped;
            lifecycle.addr = None;
            if let Some(shutdown) = lifecycle.shutdown.take() {
                let _ = shutdown.send(true);
            }
            lifecycle.accept_task.take()
        };
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

async fn accept_loop(
    socket: TcpListener,
    dispatcher: Arc<dyn Dispatch>,
    events: Arc<dyn ListenerEvents>,
    mut shutdown: watch::Receiver<bool>,
) {
    let cause = loop {
        tokio::select! {
            _ = shutdown.changed() => break None,
            accepted = socket.accept() => match accepted {
                Ok((connection, peer)) => {
                    debug!(%peer, "accepted connection");
                    let _ = connection.set_nodelay(true);
                    let dispatcher = dispatcher.clone();
                    let events = events.clone();
                    tokio::spawn(async move {
                        if let Err(error) = serve_connection(connection, dispatcher).await {
                            events.service_error(&error);
                        }
                    });
                }
                Err(err) => {
                    let error = DfsError::remote(format!("accept: {err}"));
                    events.listen_error(&error);
                    break Some(error);
                }
            }
        }
    };
    events.stopped(cause);
}

async fn serve_connection(
    mut connection: TcpStream,
    dispatcher: Arc<dyn Dispatch>,
) -> DfsResult<()> {
    let body = read_record(&mut connection).await?;
    let call = codec::read_call(&mut body.as_slice())?;
    let reply = dispatcher.dispatch(call).await;

    let mut out = Vec::new();
    codec::write_reply(&mut out, &reply)?;
    write_record(&mut connection, &out).await?;
    let _ = connection.shutdown().await;
    Ok(())
}
