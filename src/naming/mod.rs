//! The naming server: the directory tree behind two remote façades.
//!
//! [`crate::proto::Service`] serves clients, [`crate::proto::Registration`]
//! serves storage servers. Both are exposed as listeners on well-known
//! ports baked into client configuration.

mod registration;
mod service;

pub use self::registration::RegistrationFacade;
pub use self::service::ServiceFacade;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::NamingConfig;
use crate::error::{DfsError, DfsResult};
use crate::proto::dispatch::{RegistrationDispatcher, ServiceDispatcher};
use crate::rpc::listener::Listener;
use crate::tree::{CommandLink, HashTree, WireLink};

/// Well-known port of the client-facing service interface.
pub const SERVICE_PORT: u16 = 6000;

/// Well-known port of the storage-server-facing registration interface.
pub const REGISTRATION_PORT: u16 = 6001;

/// Observer hook for server shutdown.
pub trait ServerEvents: Send + Sync {
    /// The server has stopped. `cause` is `None` after a requested stop.
    fn stopped(&self, cause: Option<DfsError>) {
        match cause {
            None => info!("server stopped"),
            Some(error) => warn!(%error, "server stopped"),
        }
    }
}

/// [`ServerEvents`] implementation that only logs.
pub struct LogServerEvents;

impl ServerEvents for LogServerEvents {}

/// The singleton process owning the directory tree.
///
/// `start` is single-shot: it brings up both listeners and the server is
/// not restartable after `stop`.
pub struct NamingServer {
    config: NamingConfig,
    service: Listener,
    registration: Listener,
    events: Arc<dyn ServerEvents>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl NamingServer {
    /// Creates a server wired to real storage servers, logging lifecycle
    /// events.
    pub fn new(config: NamingConfig) -> Self {
        Self::with_link(config, Arc::new(WireLink), Arc::new(LogServerEvents))
    }

    /// Creates a server with caller-supplied command transport and hooks.
    pub fn with_link(
        config: NamingConfig,
        link: Arc<dyn CommandLink>,
        events: Arc<dyn ServerEvents>,
    ) -> Self {
        let tree = Arc::new(HashTree::new(link.clone(), config.replication_threshold));
        let service =
            Listener::new(Arc::new(ServiceDispatcher::new(Arc::new(ServiceFacade::new(
                tree.clone(),
                link,
            )))));
        let registration = Listener::new(Arc::new(RegistrationDispatcher::new(Arc::new(
            RegistrationFacade::new(tree),
        ))));
        Self {
            config,
            service,
            registration,
            events,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Binds both listeners. A second call fails with a state error.
    pub async fn start(&self) -> DfsResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DfsError::state("naming server already started"));
        }
        let service_addr = self
            .service
            .start(SocketAddr::new(self.config.host, self.config.service_port))
            .await?;
        let registration_bind = SocketAddr::new(self.config.host, self.config.registration_port);
        let registration_addr = match self.registration.start(registration_bind).await {
            Ok(addr) => addr,
            Err(error) => {
                self.service.stop().await;
                return Err(error);
            }
        };
        info!(%service_addr, %registration_addr, "naming server started");
        Ok(())
    }

    /// Address of the client-facing listener while running.
    pub async fn service_addr(&self) -> DfsResult<SocketAddr> {
        self.service.local_addr().await
    }

    /// Address of the registration listener while running.
    pub async fn registration_addr(&self) -> DfsResult<SocketAddr> {
        self.registration.local_addr().await
    }

    /// Tears down both listeners, then fires the stopped hook. Stopping a
    /// stopped server is a no-op.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.service.stop().await;
        self.registration.stop().await;
        self.events.stopped(None);
    }
}
