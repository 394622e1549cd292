use std::collections::{HashMap, HashSet};

use super::registry::ConnectionId;

/// Reserved room every operator dashboard joins to receive funnel updates.
/// All other rooms are named after a purchase identifier.
pub const ADMIN_FUNNEL_ROOM: &str = "admin-funnel";

/// Room directory: room name → subscriber set.
///
/// Rooms have no independent lifecycle. An entry is created lazily on first
/// join and pruned when its last subscriber leaves, so an empty or missing
/// room is never an error condition — publishing to one is a silent no-op.
#[derive(Default)]
pub struct RoomTable {
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl RoomTable {
    /// Add a subscriber. Returns `false` when the connection was already in
    /// the room (the second join is a no-op).
    pub fn insert(&mut self, room: &str, id: ConnectionId) -> bool {
        self.rooms.entry(room.to_string()).or_default().insert(id)
    }

    /// Remove a subscriber, pruning the room when it becomes empty.
    pub fn remove(&mut self, room: &str, id: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    /// Current subscribers of a room, if any.
    pub fn subscribers(&self, room: &str) -> Option<&HashSet<ConnectionId>> {
        self.rooms.get(room)
    }

    pub fn contains(&self, room: &str, id: ConnectionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(&id))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
