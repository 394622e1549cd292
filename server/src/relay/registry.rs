use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::ws::ConnectionSender;

/// Unique identifier assigned to a connection for its lifetime.
pub type ConnectionId = Uuid;

/// One live client attachment. Owned exclusively by the registry: created
/// on connect, mutated by join/leave during its life, destroyed on
/// disconnect together with all of its memberships.
pub struct ConnectionEntry {
    /// Externally supplied session token, or the connection id when the
    /// client did not supply one. This is the single key used to correlate
    /// the connection with funnel-stage membership.
    pub session: String,
    /// Rooms this connection currently belongs to. Mirror of the room
    /// directory's subscriber sets; the two views are kept in sync by the
    /// relay's compound operations.
    pub rooms: HashSet<String>,
    /// Sender half of the connection's outbound channel. Cloning this is
    /// how any part of the system pushes messages to the client.
    pub sender: ConnectionSender,
}

/// Table of live connections keyed by connection id.
#[derive(Default)]
pub struct ConnectionTable {
    entries: HashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionTable {
    /// Allocate a fresh entry with an empty joined-room set. When no
    /// session token was supplied, the allocated id doubles as the token.
    pub fn register(&mut self, session: Option<String>, sender: ConnectionSender) -> ConnectionId {
        let id = Uuid::new_v4();
        let session = session
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| id.to_string());
        self.entries.insert(
            id,
            ConnectionEntry {
                session,
                rooms: HashSet::new(),
                sender,
            },
        );
        id
    }

    /// Discard an entry, returning it so the caller can retire its
    /// memberships. `None` on a duplicate or unknown retirement — callers
    /// treat that as an expected disconnect race, not an error.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionEntry> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ConnectionEntry> {
        self.entries.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
