//! Line chat server implementation
//!
//! ## Components
//!
//! - **Listener** ([`ChatServer`]): accepts TCP connections, one task each
//! - **Session**: per-connection state machine, `Unregistered -> Registered -> Left`
//! - **Registry**: name uniqueness, broadcast and bulk shutdown

pub mod listener;
pub mod registry;
pub mod session;

pub use listener::{ChatServer, ServerHandle, ServerStats};
pub use registry::Registry;
pub use session::{ConnectionCommand, Session, SessionEvent, SessionHandle, SessionId, SessionState};
