//! Session registry
//!
//! Tracks the open connections and which of them are authenticated. Owned by
//! the event loop and only touched from its single thread of control.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use tracing::debug;

/// Identifier of one accepted connection, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Open but anonymous
    NotAuthenticated,
    /// Bound to an account
    Authenticated { username: String },
}

/// Open connections and their authenticated identities
///
/// Every key of `identities` is also a key of `connections`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: u64,
    connections: HashMap<ConnectionId, SocketAddr>,
    identities: HashMap<ConnectionId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection with no session
    pub fn open(&mut self, peer: SocketAddr) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.connections.insert(id, peer);
        debug!("Opened connection {} from {}", id, peer);
        id
    }

    /// Forget a connection, returning the identity it was bound to
    pub fn close(&mut self, id: ConnectionId) -> Option<String> {
        self.connections.remove(&id);
        self.identities.remove(&id)
    }

    /// Bind a connection to an account, replacing any previous identity
    ///
    /// Returns `false` if the connection is not open.
    pub fn bind(&mut self, id: ConnectionId, username: &str) -> bool {
        if !self.connections.contains_key(&id) {
            return false;
        }
        self.identities.insert(id, username.to_string());
        true
    }

    /// Drop the identity of a connection, keeping it open
    pub fn clear(&mut self, id: ConnectionId) -> Option<String> {
        self.identities.remove(&id)
    }

    pub fn identity(&self, id: ConnectionId) -> Option<&str> {
        self.identities.get(&id).map(String::as_str)
    }

    pub fn state(&self, id: ConnectionId) -> SessionState {
        match self.identity(id) {
            Some(username) => SessionState::Authenticated {
                username: username.to_string(),
            },
            None => SessionState::NotAuthenticated,
        }
    }

    pub fn peer(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.connections.get(&id).copied()
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn open_count(&self) -> usize {
        self.connections.len()
    }

    pub fn authenticated_count(&self) -> usize {
        self.identities.len()
    }

    /// Close everything
    pub fn clear_all(&mut self) {
        self.identities.clear();
        self.connections.clear();
    }
}
