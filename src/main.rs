//! Line Chat
//!
//! Usage:
//!   linechat server                     # Run the server on 127.0.0.1:4000
//!   linechat server --port 5000         # Run on a specific port
//!   linechat client                     # Join the chat from this terminal
//!   RUST_LOG=debug linechat server      # Verbose logging

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use linechat::client::{HELP_TEXT, Input, Terminal, parse_input};
use linechat::{ChatClient, ChatClientConfig, ChatError, ChatServer, ClientEvent, ServerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "linechat", version, about = "Line-oriented multi-user TCP chat")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the chat server
    Server {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        /// Port to listen on
        #[arg(long, default_value_t = linechat::DEFAULT_PORT)]
        port: u16,
    },
    /// Join a chat server from this terminal
    Client {
        /// Server address
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        /// Server port
        #[arg(long, default_value_t = linechat::DEFAULT_PORT)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The client shares the terminal with the chat, keep it quiet by default
    let default_filter = match cli.command {
        Command::Server { .. } => "info",
        Command::Client { .. } => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let result = match cli.command {
        Command::Server { host, port } => run_server(SocketAddr::new(host, port)).await,
        Command::Client { host, port } => run_client(SocketAddr::new(host, port)).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_server(bind_addr: SocketAddr) -> linechat::Result<()> {
    let config = ServerConfig {
        bind_addr,
        ..Default::default()
    };

    let server = ChatServer::bind(config).await?;
    serve_until(server, tokio::signal::ctrl_c()).await
}

/// Run `server` until `interrupt` resolves, then shut it down.
///
/// If the interrupt source fails the server keeps running.
async fn serve_until<F>(server: ChatServer, interrupt: F) -> linechat::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    let handle = server.handle();
    let mut serving = tokio::spawn(server.run());

    tokio::select! {
        result = &mut serving => {
            return result.map_err(|e| ChatError::internal(format!("server task failed: {}", e)))?;
        }
        signal = interrupt => match signal {
            Ok(()) => {
                handle.shutdown().await;
            }
            Err(e) => {
                warn!("Failed to listen for ctrl-c, serving without it: {}", e);
            }
        }
    }

    serving
        .await
        .map_err(|e| ChatError::internal(format!("server task failed: {}", e)))?
}

async fn run_client(server_addr: SocketAddr) -> linechat::Result<()> {
    let mut terminal = Terminal::new(tokio::io::stdout());
    terminal.print("Welcome to linechat!").await?;

    let config = ChatClientConfig {
        server_addr,
        ..Default::default()
    };
    let (mut client, mut events) = match ChatClient::connect(config).await {
        Ok(connected) => connected,
        Err(e) => {
            terminal.clear_line().await?;
            return Err(e);
        }
    };
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClientEvent::Line(line)) => terminal.print(&line).await?,
                Some(ClientEvent::Error(e)) => {
                    terminal.print(&format!("Encountered error: {}", e)).await?;
                }
                Some(ClientEvent::Disconnected) => {
                    terminal.clear_line().await?;
                    println!("Disconnected.");
                    return Ok(());
                }
                None => {
                    terminal.clear_line().await?;
                    return Ok(());
                }
            },

            line = input.next_line() => match line? {
                Some(line) => match parse_input(&line) {
                    Input::Quit => return client.close().await,
                    Input::Help => terminal.print(HELP_TEXT).await?,
                    Input::Say(text) => {
                        client.say(&text).await?;
                        terminal.prompt().await?;
                    }
                },
                None => return client.close().await,
            },

            _ = tokio::signal::ctrl_c() => {
                terminal.clear_line().await?;
                return client.close().await;
            }
        }
    }
}
