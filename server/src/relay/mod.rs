//! Shared mutable state of the relay: connection registry, room directory
//! and funnel membership, all owned by a single [`Relay`] instance.
//!
//! Every compound operation (retirement fan-out, stage moves) runs under
//! one mutex so the registry and directory views of the membership
//! relation can never diverge. Delivery is decoupled from mutation: the
//! lock is only held while collecting target senders, the actual channel
//! pushes happen after the guard is dropped.

pub mod funnel;
pub mod registry;
pub mod rooms;

use std::sync::Mutex;

use crate::error::RelayError;
use crate::ws::{encode_event, ConnectionSender, ServerEvent};

pub use funnel::{FunnelSnapshot, FunnelStage};
pub use registry::ConnectionId;
pub use rooms::ADMIN_FUNNEL_ROOM;

use funnel::FunnelTable;
use registry::ConnectionTable;
use rooms::RoomTable;

#[derive(Default)]
struct RelayInner {
    connections: ConnectionTable,
    rooms: RoomTable,
    funnel: FunnelTable,
}

/// The single owner of all shared relay state. Constructed once in `main`
/// and handed to handlers through `AppState` — no ambient globals.
#[derive(Default)]
pub struct Relay {
    inner: Mutex<RelayInner>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new transport connection. Returns the allocated id and
    /// the resolved session token (supplied, or the id itself).
    pub fn register(
        &self,
        session: Option<String>,
        sender: ConnectionSender,
    ) -> (ConnectionId, String) {
        let mut inner = self.lock();
        let id = inner.connections.register(session, sender);
        let session = inner
            .connections
            .get(id)
            .map(|entry| entry.session.clone())
            .unwrap_or_default();

        tracing::debug!(
            connection_id = %id,
            session = %session,
            connections = inner.connections.len(),
            "connection registered"
        );
        (id, session)
    }

    /// Retire a connection: purge it from every room and its session token
    /// from every funnel stage, then discard the entry. Idempotent — a
    /// second retirement of the same id is a no-op. Each removal is
    /// independent; none short-circuits the others.
    pub fn retire(&self, id: ConnectionId) {
        let update = {
            let mut inner = self.lock();
            let Some(entry) = inner.connections.remove(id) else {
                return;
            };

            for room in &entry.rooms {
                inner.rooms.remove(room, id);
            }
            let funnel_changed = inner.funnel.remove(&entry.session);

            tracing::debug!(
                connection_id = %id,
                session = %entry.session,
                rooms = entry.rooms.len(),
                "connection retired"
            );

            funnel_changed.then(|| self.collect_funnel_update(&inner))
        };

        if let Some((targets, event)) = update {
            deliver(targets, &event);
        }
    }

    /// Join a connection to a room, keeping the registry and directory
    /// views in sync. Idempotent; returns whether the membership is new.
    pub fn join_room(&self, id: ConnectionId, room: &str) -> Result<bool, RelayError> {
        let mut inner = self.lock();
        let entry = inner
            .connections
            .get_mut(id)
            .ok_or(RelayError::UnknownConnection)?;

        let newly_joined = entry.rooms.insert(room.to_string());
        inner.rooms.insert(room, id);

        if newly_joined {
            tracing::debug!(connection_id = %id, room = %room, "joined room");
        }
        Ok(newly_joined)
    }

    /// Push an event to every current subscriber of a room. A room with no
    /// subscribers is a silent no-op — a payment can legitimately arrive
    /// before or after the interested client is connected. Returns the
    /// number of connections the event was handed to.
    pub fn publish(&self, room: &str, event: &ServerEvent) -> usize {
        let targets = {
            let inner = self.lock();
            collect_room_senders(&inner, room)
        };
        let delivered = targets.len();
        deliver(targets, event);
        delivered
    }

    /// Push an event to one connection.
    pub fn send_to(&self, id: ConnectionId, event: &ServerEvent) -> Result<(), RelayError> {
        let sender = {
            let inner = self.lock();
            inner
                .connections
                .get(id)
                .map(|entry| entry.sender.clone())
                .ok_or(RelayError::UnknownConnection)?
        };
        let _ = sender.send(encode_event(event));
        Ok(())
    }

    /// Move a session token to a funnel stage, enforcing the
    /// at-most-one-stage invariant, then push the recomputed snapshot to
    /// the administrator room.
    pub fn track_stage(&self, token: &str, stage_name: &str) -> Result<FunnelSnapshot, RelayError> {
        let stage = FunnelStage::from_str(stage_name)
            .ok_or_else(|| RelayError::UnknownStage(stage_name.to_string()))?;

        let (targets, event, snapshot) = {
            let mut inner = self.lock();
            inner.funnel.track(token, stage);
            let (targets, event) = self.collect_funnel_update(&inner);
            (targets, event, inner.funnel.snapshot())
        };

        tracing::debug!(token = %token, stage = stage.as_str(), "funnel stage tracked");
        deliver(targets, &event);
        Ok(snapshot)
    }

    /// Move a purchase identifier from pix-pending to completed after a
    /// payment event. No-op (and no broadcast) when it was not pending.
    pub fn complete_payment(&self, compra_id: &str) -> bool {
        let update = {
            let mut inner = self.lock();
            inner
                .funnel
                .complete_pending(compra_id)
                .then(|| self.collect_funnel_update(&inner))
        };

        match update {
            Some((targets, event)) => {
                tracing::debug!(compra_id = %compra_id, "pix-pending purchase completed");
                deliver(targets, &event);
                true
            }
            None => false,
        }
    }

    /// Join the administrator room and return the current snapshot so the
    /// caller can push it to the new subscriber alone — a freshly attached
    /// dashboard must not wait for the next state change to render.
    pub fn subscribe_admin(&self, id: ConnectionId) -> Result<FunnelSnapshot, RelayError> {
        self.join_room(id, ADMIN_FUNNEL_ROOM)?;
        Ok(self.snapshot())
    }

    /// Pure read of the current per-stage counts.
    pub fn snapshot(&self) -> FunnelSnapshot {
        self.lock().funnel.snapshot()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RelayInner> {
        // A poisoned mutex means a panic mid-mutation; the state is
        // in-memory only, so continuing with it is still the least bad
        // option for a best-effort relay.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn collect_funnel_update(&self, inner: &RelayInner) -> (Vec<ConnectionSender>, ServerEvent) {
        let event = ServerEvent::FunnelUpdate(inner.funnel.snapshot());
        (collect_room_senders(inner, ADMIN_FUNNEL_ROOM), event)
    }
}

fn collect_room_senders(inner: &RelayInner, room: &str) -> Vec<ConnectionSender> {
    let Some(members) = inner.rooms.subscribers(room) else {
        return Vec::new();
    };
    members
        .iter()
        .filter_map(|id| inner.connections.get(*id))
        .map(|entry| entry.sender.clone())
        .collect()
}

/// Fire-and-forget push to already-collected transports. Send failures
/// mean the writer task is gone; retirement will catch up with the entry.
fn deliver(targets: Vec<ConnectionSender>, event: &ServerEvent) {
    if targets.is_empty() {
        return;
    }
    let message = encode_event(event);
    for sender in targets {
        let _ = sender.send(message.clone());
    }
}
