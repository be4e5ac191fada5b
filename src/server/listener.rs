//! TCP listener for the chat server
//!
//! Accepts connections, starts a [`Session`] task for each one and owns the
//! shared [`Registry`].

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ServerConfig;
use crate::error::{ChatError, Result};
use crate::server::registry::Registry;
use crate::server::session::Session;

/// Line-oriented TCP chat server
pub struct ChatServer {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
}

impl ChatServer {
    /// Bind the listening socket.
    ///
    /// Fails with [`ChatError::Bind`] if the address cannot be acquired.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ChatError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!("Server started on {}.", local_addr);

        Ok(Self {
            config,
            listener,
            local_addr,
            registry: Arc::new(Registry::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Get a handle that can stop the server from another task
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            registry: Arc::clone(&self.registry),
            shutdown: self.shutdown.clone(),
            bind_address: self.local_addr,
        }
    }

    /// Accept connections until [`ServerHandle::shutdown`] is called
    pub async fn run(self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("New connection from {}", addr);
                        let registry = Arc::clone(&self.registry);
                        let shutdown = self.shutdown.clone();
                        let read_buffer_size = self.config.read_buffer_size;
                        tokio::spawn(async move {
                            Self::handle_connection(stream, addr, registry, shutdown, read_buffer_size)
                                .await;
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
            }
        }

        info!("Server has been shutdown.");
        Ok(())
    }

    /// Handle a single client connection
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        registry: Arc<Registry>,
        shutdown: CancellationToken,
        read_buffer_size: usize,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = Session::new(addr, registry, outbound_tx);
        session.greet();

        if let Err(e) = session
            .run(stream, outbound_rx, shutdown, read_buffer_size)
            .await
        {
            warn!("Connection handling failed: {}", e);
        }
    }
}

/// Cloneable control handle for a running [`ChatServer`]
#[derive(Debug, Clone)]
pub struct ServerHandle {
    registry: Arc<Registry>,
    shutdown: CancellationToken,
    bind_address: SocketAddr,
}

impl ServerHandle {
    /// Stop the server.
    ///
    /// Registered sessions are force-disconnected without leave notices,
    /// then the accept loop and any unregistered connections are closed.
    /// Returns once every disconnect has been issued. Safe to call twice.
    pub async fn shutdown(&self) -> usize {
        let disconnected = self.registry.shutdown().await;
        self.shutdown.cancel();
        if disconnected > 0 {
            info!("Force disconnected {} users", disconnected);
        }
        disconnected
    }

    /// Whether shutdown has been requested
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Get the registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Get server statistics
    pub async fn stats(&self) -> ServerStats {
        ServerStats {
            registered_users: self.registry.len().await,
            bind_address: self.bind_address,
        }
    }
}

/// Server statistics
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub registered_users: usize,
    pub bind_address: SocketAddr,
}
