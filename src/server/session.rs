//! Per-connection session for the chat server
//!
//! A session owns one connection's line framer and registration state.
//! Lines read from the peer drive the state machine
//! `Unregistered -> Registered(name) -> Left`; the session reports what
//! happened to the [`Registry`] as [`SessionEvent`]s.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::protocol::line::{LineFramer, encode_line};
use crate::protocol::messages::{NAME_PROMPT, NAME_REJECTED, NAME_RETRY};
use crate::server::registry::Registry;

/// Unique identifier of one accepted connection
pub type SessionId = Uuid;

/// Commands queued for a session's connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// Write one line (terminator added on write)
    Send(String),
    /// Close the connection without a leave notice
    Close,
}

/// Cheap handle the registry keeps for a registered session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    addr: SocketAddr,
    outbound: mpsc::UnboundedSender<ConnectionCommand>,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<ConnectionCommand>,
    ) -> Self {
        Self { id, addr, outbound }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue a line. Returns false if the connection is already gone.
    pub fn send(&self, text: &str) -> bool {
        self.outbound
            .send(ConnectionCommand::Send(text.to_string()))
            .is_ok()
    }

    /// Queue a forced disconnect
    pub fn close(&self) -> bool {
        self.outbound.send(ConnectionCommand::Close).is_ok()
    }
}

/// Events emitted by a session to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session claimed `name`
    Join { session: SessionId, name: String },

    /// Registered session sent a chat line
    Message {
        session: SessionId,
        name: String,
        text: String,
    },

    /// Registered session's connection closed
    Leave { session: SessionId, name: String },
}

/// Registration state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Every line is a requested name
    Unregistered,
    /// Every line is a chat message
    Registered(String),
    /// Connection is gone; input is ignored
    Left,
}

/// How the connection loop ended
enum Closed {
    /// Peer closed its side
    Peer,
    /// Server asked for the connection to go away
    Forced,
    /// Transport failure
    Failed(ChatError),
}

/// Per-connection state machine
pub struct Session {
    handle: SessionHandle,
    state: SessionState,
    registry: Arc<Registry>,
}

impl Session {
    /// Create an unregistered session writing through `outbound`
    pub fn new(
        addr: SocketAddr,
        registry: Arc<Registry>,
        outbound: mpsc::UnboundedSender<ConnectionCommand>,
    ) -> Self {
        Self {
            handle: SessionHandle::new(Uuid::new_v4(), addr, outbound),
            state: SessionState::Unregistered,
            registry,
        }
    }

    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.addr()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Registered name, if any
    pub fn name(&self) -> Option<&str> {
        match &self.state {
            SessionState::Registered(name) => Some(name),
            _ => None,
        }
    }

    /// Ask the peer for a name
    pub fn greet(&self) {
        self.handle.send(NAME_PROMPT);
    }

    /// Interpret one framed line according to the current state
    pub async fn handle_line(&mut self, line: String) {
        match &self.state {
            SessionState::Unregistered => self.request_name(line).await,

            SessionState::Registered(name) => {
                let event = SessionEvent::Message {
                    session: self.id(),
                    name: name.clone(),
                    text: line,
                };
                self.registry.handle_event(event).await;
            }

            SessionState::Left => {
                debug!("Dropping line from {} after leave", self.addr());
            }
        }
    }

    async fn request_name(&mut self, name: String) {
        match self.registry.join(&name, self.handle.clone()).await {
            Ok(()) => {
                self.state = SessionState::Registered(name);
            }
            Err(reason) => {
                debug!(
                    "Rejected name {:?} from {}: {}",
                    name,
                    self.addr(),
                    reason.into_chat_error(&name)
                );
                self.handle.send(NAME_REJECTED);
                self.handle.send(NAME_RETRY);
            }
        }
    }

    /// Peer closed the connection. Emits a leave only if registered.
    pub async fn handle_close(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Left);
        if let SessionState::Registered(name) = state {
            let event = SessionEvent::Leave {
                session: self.id(),
                name,
            };
            self.registry.handle_event(event).await;
        }
    }

    /// Server-initiated close: no leave notice, but the name is released
    /// if the registry still maps it to this session.
    pub async fn force_close(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Left);
        if let SessionState::Registered(name) = state {
            self.registry.release(&name, self.id()).await;
        }
    }

    /// Drive the session over `stream` until it closes.
    ///
    /// `commands` is the receiving end of the channel this session was
    /// created with. Cancelling `shutdown` closes the connection silently.
    pub async fn run<S>(
        mut self,
        stream: S,
        mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
        shutdown: CancellationToken,
        read_buffer_size: usize,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; read_buffer_size.max(1)];

        let closed = loop {
            tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => break Closed::Peer,
                    Ok(n) => {
                        for line in framer.feed(&buf[..n]) {
                            self.handle_line(line).await;
                        }
                    }
                    Err(e) => {
                        break Closed::Failed(ChatError::connection(format!(
                            "read from {} failed: {}",
                            self.addr(),
                            e
                        )));
                    }
                },

                command = commands.recv() => match command {
                    Some(ConnectionCommand::Send(text)) => {
                        if let Err(e) = writer.write_all(&encode_line(&text)).await {
                            break Closed::Failed(ChatError::connection(format!(
                                "write to {} failed: {}",
                                self.addr(),
                                e
                            )));
                        }
                    }
                    Some(ConnectionCommand::Close) | None => break Closed::Forced,
                },

                _ = shutdown.cancelled() => break Closed::Forced,
            }
        };

        if framer.buffered_len() > 0 {
            debug!(
                "Discarding {} unterminated bytes from {}",
                framer.buffered_len(),
                self.addr()
            );
        }

        match closed {
            Closed::Peer => {
                self.handle_close().await;
                info!("Connection from {} closed", self.addr());
                Ok(())
            }
            Closed::Forced => {
                self.force_close().await;
                // Best effort: the peer may already be gone
                let _ = writer.shutdown().await;
                debug!("Connection from {} force-closed", self.addr());
                Ok(())
            }
            Closed::Failed(e) => {
                self.handle_close().await;
                Err(e)
            }
        }
    }
}
