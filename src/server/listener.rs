//! Relay server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::registry::{RegistryConfig, SessionRegistry};
use crate::router::{NoopObserver, RelayObserver, Router};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::session::ConnectionId;

/// WebSocket chat relay server
pub struct RelayServer<O: RelayObserver = NoopObserver> {
    config: ServerConfig,
    router: Arc<Router<O>>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
}

impl RelayServer<NoopObserver> {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_observer(config, NoopObserver)
    }
}

impl<O: RelayObserver> RelayServer<O> {
    /// Create a new server reporting router events to `observer`
    pub fn with_observer(config: ServerConfig, observer: O) -> Self {
        Self::with_registry_config(config, observer, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        observer: O,
        registry_config: RegistryConfig,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let registry = Arc::new(SessionRegistry::with_config(registry_config));

        Self {
            config,
            router: Arc::new(Router::with_observer(registry, observer)),
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown: CancellationToken::new(),
        }
    }

    /// Get a reference to the router
    pub fn router(&self) -> &Arc<Router<O>> {
        &self.router
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.router.registry()
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Relay server listening");

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Relay server listening");

        self.serve(listener, shutdown).await
    }

    /// Serve an already bound listener until `shutdown` resolves
    ///
    /// Open connections are closed when the shutdown signal fires.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        self.shutdown.cancel();

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let id = ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(connection_id = %id, peer = %peer_addr, "New connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let connection = Connection::new(
            id,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.router),
            self.shutdown.child_token(),
        );

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(connection_id = %id, error = %e, "Connection error");
            }

            tracing::debug!(connection_id = %id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
