//! Line-oriented multi-user chat over TCP
//!
//! Clients connect, pick a unique display name and then every line they send
//! is relayed to everyone else in the room. The protocol is plain
//! newline-terminated UTF-8 text, so `nc` or `telnet` work as clients.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::{ChatClient, ChatClientConfig, ClientEvent};
pub use error::{ChatError, RegisterError, Result};
pub use server::{ChatServer, Registry, ServerHandle, ServerStats};

use std::net::SocketAddr;

/// Port used when none is given
pub const DEFAULT_PORT: u16 = 4000;

/// Chat server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server listen address
    pub bind_addr: SocketAddr,
    /// Bytes requested per socket read
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            read_buffer_size: 4096,
        }
    }
}
