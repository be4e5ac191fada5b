//! Registry of named participants for the chat server
//!
//! This module arbitrates display name uniqueness, fans messages out to
//! every registered session and tears everything down on shutdown.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::RegisterError;
use crate::protocol::messages::{self, validate_name};
use crate::server::session::{SessionEvent, SessionHandle, SessionId};

#[derive(Debug, Default)]
struct RegistryState {
    /// Registered sessions indexed by display name
    sessions: HashMap<String, SessionHandle>,
    /// Set once by `shutdown`, never cleared
    shut_down: bool,
}

impl RegistryState {
    fn claim(&mut self, name: &str, session: SessionHandle) -> Result<(), RegisterError> {
        if self.shut_down {
            return Err(RegisterError::ShuttingDown);
        }
        if self.sessions.contains_key(name) {
            return Err(RegisterError::NameTaken);
        }
        self.sessions.insert(name.to_string(), session);
        Ok(())
    }

    fn holds(&self, name: &str, session: SessionId) -> bool {
        self.sessions
            .get(name)
            .is_some_and(|handle| handle.id() == session)
    }

    fn release(&mut self, name: &str, session: SessionId) -> bool {
        if !self.holds(name, session) {
            return false;
        }
        self.sessions.remove(name);
        true
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Join { session, name } => {
                if !self.holds(&name, session) {
                    debug!("Join for {} ignored, name not held by the session", name);
                    return;
                }
                let notice = messages::user_joined(&name);
                info!("{}", notice);
                deliver_to(&self.sessions, None, &notice);
            }

            SessionEvent::Message { name, text, .. } => {
                let line = messages::chat_line(&name, &text);
                info!("{}", line);
                deliver_to(&self.sessions, Some(&name), &line);
            }

            SessionEvent::Leave { session, name } => {
                if !self.release(&name, session) {
                    // Shutdown already took the entry; teardown is silent
                    debug!("Leave for {} ignored, name no longer held", name);
                    return;
                }
                let notice = messages::user_left(&name);
                info!("{}", notice);
                deliver_to(&self.sessions, None, &notice);
            }
        }
    }
}

/// Queue `text` on every session but `excluded`. Must not block: callers
/// hold the registry guard.
fn deliver_to(
    sessions: &HashMap<String, SessionHandle>,
    excluded: Option<&str>,
    text: &str,
) -> usize {
    let mut delivered = 0;

    for (name, handle) in sessions.iter() {
        if excluded == Some(name.as_str()) {
            continue;
        }
        if handle.send(text) {
            delivered += 1;
        } else {
            debug!("Skipping delivery to {}: connection already gone", name);
        }
    }

    delivered
}

/// Server-wide authority over who is in the chat room.
///
/// A name is a key if and only if a live session currently holds it.
/// All mutations happen under one write guard, so a check followed by an
/// insert cannot interleave with another registration.
#[derive(Debug, Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `name` and claim it for `session`.
    ///
    /// On failure nothing is mutated.
    pub async fn try_register(
        &self,
        name: &str,
        session: SessionHandle,
    ) -> Result<(), RegisterError> {
        validate_name(name)?;

        let mut state = self.state.write().await;
        state.claim(name, session)
    }

    /// Claim `name` for `session` and apply its `Join` event.
    ///
    /// The join notice is queued under the same write guard as the insert.
    /// No other broadcast can reach the newcomer ahead of it, and no leave
    /// notice for a previous holder of the name can follow it.
    pub async fn join(&self, name: &str, session: SessionHandle) -> Result<(), RegisterError> {
        validate_name(name)?;

        let id = session.id();
        let mut state = self.state.write().await;
        state.claim(name, session)?;
        state.apply(SessionEvent::Join {
            session: id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Remove `name`. No-op if it is not registered.
    pub async fn unregister(&self, name: &str) -> Option<SessionHandle> {
        self.state.write().await.sessions.remove(name)
    }

    /// Remove `name` only while `session` still owns it
    pub(crate) async fn release(&self, name: &str, session: SessionId) -> bool {
        self.state.write().await.release(name, session)
    }

    /// Send `text` to every registered session. Returns the delivery count.
    pub async fn broadcast_all(&self, text: &str) -> usize {
        self.deliver(None, text).await
    }

    /// Send `text` to every registered session except `excluded`
    pub async fn broadcast_except(&self, excluded: &str, text: &str) -> usize {
        self.deliver(Some(excluded), text).await
    }

    async fn deliver(&self, excluded: Option<&str>, text: &str) -> usize {
        let state = self.state.read().await;
        deliver_to(&state.sessions, excluded, text)
    }

    /// Apply an event emitted by a session.
    ///
    /// Map changes and the notices they cause happen under one write guard,
    /// so every observer sees notices in the order the map changed.
    pub async fn handle_event(&self, event: SessionEvent) {
        self.state.write().await.apply(event);
    }

    /// Force-disconnect every registered session and refuse new names.
    ///
    /// No leave notices are sent. Returns how many sessions were
    /// disconnected; calling it again returns 0.
    pub async fn shutdown(&self) -> usize {
        let drained: Vec<(String, SessionHandle)> = {
            let mut state = self.state.write().await;
            state.shut_down = true;
            state.sessions.drain().collect()
        };

        for (name, handle) in &drained {
            debug!("Force disconnecting {} ({})", name, handle.addr());
            handle.close();
        }

        drained.len()
    }

    /// Whether `shutdown` has run
    pub async fn is_shut_down(&self) -> bool {
        self.state.read().await.shut_down
    }

    /// Check if a name is currently held
    pub async fn contains(&self, name: &str) -> bool {
        self.state.read().await.sessions.contains_key(name)
    }

    /// Snapshot of all registered names
    pub async fn names(&self) -> Vec<String> {
        self.state.read().await.sessions.keys().cloned().collect()
    }

    /// Get registered session count
    pub async fn len(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.sessions.is_empty()
    }
}
