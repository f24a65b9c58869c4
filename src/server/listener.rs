//! Relay server listener
//!
//! Handles the TCP accept loop and spawns one task per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::incident::IncidentNotifier;
use crate::registry::RegistryConfig;
use crate::router::{EventRouter, RelayConfig, RelayState};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;

/// WebSocket relay server
pub struct RelayServer<N: IncidentNotifier> {
    config: ServerConfig,
    router: Arc<EventRouter<N>>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<N: IncidentNotifier> RelayServer<N> {
    /// Create a new server with default registry and routing configuration
    pub fn new(config: ServerConfig, notifier: N) -> Self {
        Self::with_configs(config, RegistryConfig::default(), RelayConfig::default(), notifier)
    }

    /// Create a new server with custom registry and routing configuration
    pub fn with_configs(
        config: ServerConfig,
        registry_config: RegistryConfig,
        relay_config: RelayConfig,
        notifier: N,
    ) -> Self {
        let state = RelayState::with_config(registry_config);
        let router = EventRouter::with_config(state, notifier, relay_config);
        Self::with_router(config, Arc::new(router))
    }

    /// Create a server around an existing router
    pub fn with_router(config: ServerConfig, router: Arc<EventRouter<N>>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            router,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the event router
    pub fn router(&self) -> &Arc<EventRouter<N>> {
        &self.router
    }

    /// Get the shared relay state
    pub fn state(&self) -> &RelayState {
        self.router.state()
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Bind the listening socket
    ///
    /// Use [`TcpListener::local_addr`] on the result to learn the port when
    /// binding to port 0.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            policy = %self.state().sessions.config().registration_policy,
            "Relay server listening"
        );
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve_until(listener, shutdown).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.accept_loop(&listener).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Connections already running are left to finish on their own.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
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
        // Check connection limit; the permit moves into the connection task
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

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let config = self.config.clone();
        let router = Arc::clone(&self.router);

        tokio::spawn(async move {
            let stats = Arc::clone(&router.state().stats);
            stats.connection_opened();

            let mut connection = Connection::new(session_id, peer_addr, config, router);
            if let Err(e) = connection.run(socket).await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            // Release the slot before the gauge reports it free
            drop(permit);
            stats.connection_closed();
            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }
}
