//! Line chat client implementation
//!
//! This module provides a client for connecting to the chat server,
//! sending lines and receiving everything the server relays.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{ChatError, Result};
use crate::protocol::line::{LineFramer, encode_line};

/// Read buffer size for the receive loop
const READ_BUFFER_SIZE: usize = 4096;

/// Shown for `/h` and `/help`
pub const HELP_TEXT: &str = "\
Commands:
  /h, /help    Show this help message
  /q, /quit    Leave the chat room
Any other line is sent to the room.";

/// Chat client configuration
#[derive(Clone, Debug)]
pub struct ChatClientConfig {
    /// Server address to connect to
    pub server_addr: SocketAddr,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], crate::DEFAULT_PORT)),
            connect_timeout_secs: 10,
        }
    }
}

/// Events that the client can receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// One line from the server, terminator stripped
    Line(String),
    /// Transport error; no further events follow
    Error(String),
    /// Server closed the connection
    Disconnected,
}

/// What a line typed at the terminal asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Quit,
    Help,
    Say(String),
}

/// Interpret one line of terminal input
pub fn parse_input(line: &str) -> Input {
    match line {
        "/q" | "/quit" => Input::Quit,
        "/h" | "/help" => Input::Help,
        _ => Input::Say(line.to_string()),
    }
}

/// Input prompt shown while the user can type
pub const INPUT_PROMPT: &str = "> ";

/// Carriage return plus ANSI "erase entire line"
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Terminal output that keeps the input prompt below incoming lines
pub struct Terminal<W> {
    out: W,
}

impl<W: AsyncWrite + Unpin> Terminal<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Print `text` above a fresh prompt
    pub async fn print(&mut self, text: &str) -> Result<()> {
        self.clear_line().await?;
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.prompt().await
    }

    /// Show the input prompt
    pub async fn prompt(&mut self) -> Result<()> {
        self.out.write_all(INPUT_PROMPT.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    /// Erase the prompt and leave the cursor at column 0
    pub async fn clear_line(&mut self) -> Result<()> {
        self.out.write_all(CLEAR_LINE.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// TCP chat client
pub struct ChatClient {
    writer: OwnedWriteHalf,
    receiver: JoinHandle<()>,
    server_addr: SocketAddr,
}

impl ChatClient {
    /// Connect to the chat server.
    ///
    /// Returns the client and the stream of events read from the server.
    pub async fn connect(
        config: ChatClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientEvent>)> {
        info!("Connecting to chat server at {}", config.server_addr);

        let stream = tokio::time::timeout(
            Duration::from_secs(config.connect_timeout_secs),
            TcpStream::connect(config.server_addr),
        )
        .await
        .map_err(|_| ChatError::timeout("Connection timeout"))?
        .map_err(|e| ChatError::connection(format!("Failed to connect: {}", e)))?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY: {}", e);
        }

        let (reader, writer) = stream.into_split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let receiver = tokio::spawn(Self::receive_lines(reader, event_tx));

        Ok((
            Self {
                writer,
                receiver,
                server_addr: config.server_addr,
            },
            event_rx,
        ))
    }

    /// Get the server address
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Send one line to the server
    pub async fn say(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_all(&encode_line(text))
            .await
            .map_err(|e| ChatError::connection(format!("Failed to send: {}", e)))
    }

    /// Close the connection. No further events are delivered.
    pub async fn close(mut self) -> Result<()> {
        let result = self.writer.shutdown().await;
        self.receiver.abort();
        debug!("Disconnected from {}", self.server_addr);
        result.map_err(ChatError::from)
    }

    async fn receive_lines(mut reader: OwnedReadHalf, events: mpsc::UnboundedSender<ClientEvent>) {
        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    let _ = events.send(ClientEvent::Disconnected);
                    return;
                }
                Ok(n) => {
                    for line in framer.feed(&buf[..n]) {
                        if events.send(ClientEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = events.send(ClientEvent::Error(e.to_string()));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;
    use crate::ServerConfig;
    use crate::server::{ChatServer, ServerHandle};

    const WAIT: Duration = Duration::from_secs(5);

    async fn start() -> (SocketAddr, ServerHandle) {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = ChatServer::bind(config).await.unwrap();
        let addr = server.local_addr();
        let handle = server.handle();
        tokio::spawn(server.run());
        (addr, handle)
    }

    fn config(addr: SocketAddr) -> ChatClientConfig {
        ChatClientConfig {
            server_addr: addr,
            ..Default::default()
        }
    }

    async fn next(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Option<ClientEvent> {
        timeout(WAIT, events.recv()).await.expect("timed out waiting for an event")
    }

    fn line(text: &str) -> Option<ClientEvent> {
        Some(ClientEvent::Line(text.to_string()))
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("/q"), Input::Quit);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/h"), Input::Help);
        assert_eq!(parse_input("/help"), Input::Help);
        assert_eq!(parse_input("/quit now"), Input::Say("/quit now".into()));
        assert_eq!(parse_input("hello"), Input::Say("hello".into()));
    }

    #[tokio::test]
    async fn test_terminal_keeps_prompt_below_lines() {
        let mut terminal = Terminal::new(Vec::new());
        terminal.prompt().await.unwrap();
        terminal.print("Bob: hi").await.unwrap();
        terminal.clear_line().await.unwrap();

        let out = String::from_utf8(terminal.into_inner()).unwrap();
        assert_eq!(out, "> \r\x1b[2KBob: hi\n> \r\x1b[2K");
    }

    #[test]
    fn test_default_config() {
        let config = ChatClientConfig::default();
        assert_eq!(config.server_addr.port(), 4000);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[tokio::test]
    async fn test_register_and_chat() {
        let (addr, _handle) = start().await;

        let (mut ann, mut ann_events) = ChatClient::connect(config(addr)).await.unwrap();
        assert_eq!(next(&mut ann_events).await, line("Enter your name:"));
        ann.say("Ann").await.unwrap();
        assert_eq!(next(&mut ann_events).await, line("Ann has joined the chat room."));

        let (mut bob, mut bob_events) = ChatClient::connect(config(addr)).await.unwrap();
        assert_eq!(next(&mut bob_events).await, line("Enter your name:"));
        bob.say("Ann").await.unwrap();
        assert_eq!(
            next(&mut bob_events).await,
            line("Selected name is invalid or already taken.")
        );
        assert_eq!(next(&mut bob_events).await, line("Please select a different one:"));
        bob.say("Bob").await.unwrap();
        assert_eq!(next(&mut bob_events).await, line("Bob has joined the chat room."));
        assert_eq!(next(&mut ann_events).await, line("Bob has joined the chat room."));

        bob.say("hi").await.unwrap();
        assert_eq!(next(&mut ann_events).await, line("Bob: hi"));

        bob.close().await.unwrap();
        assert_eq!(next(&mut ann_events).await, line("Bob has left the chat room."));
    }

    #[tokio::test]
    async fn test_disconnected_on_server_shutdown() {
        let (addr, handle) = start().await;
        let (mut ann, mut events) = ChatClient::connect(config(addr)).await.unwrap();
        assert_eq!(next(&mut events).await, line("Enter your name:"));
        ann.say("Ann").await.unwrap();
        assert_eq!(next(&mut events).await, line("Ann has joined the chat room."));

        handle.shutdown().await;
        assert_eq!(next(&mut events).await, Some(ClientEvent::Disconnected));
        assert_eq!(next(&mut events).await, None);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Grab a free port, then release it so nothing listens there
        let spare = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = spare.local_addr().unwrap();
        drop(spare);

        match ChatClient::connect(config(addr)).await {
            Err(ChatError::Connection(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("nothing should be listening on {}", addr),
        }
    }
}
