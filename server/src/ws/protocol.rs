//! Wire protocol: tagged JSON event frames in both directions.
//!
//! Each frame is `{"event": <name>, "data": <payload>}`. Inbound frames are
//! validated into [`ClientEvent`] at the boundary; unrecognized or
//! malformed frames are logged and dropped, never answered with a protocol
//! error — a bad payload must not take down an otherwise healthy client.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payment::{router, PixNotification};
use crate::relay::{ConnectionId, FunnelSnapshot};
use crate::state::AppState;
use crate::ws::{send_event, ConnectionSender};

/// Events a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Join a room, typically named after a purchase identifier.
    JoinRoom(String),
    /// Join the administrator room and receive an immediate funnel snapshot.
    JoinAdminFunnel,
    /// An asynchronous PIX payment event. The payload either carries the
    /// payment fields directly or nests them under `paymentData`.
    PixPayment(Value),
    /// Report which checkout stage a user is currently at.
    TrackFunnelStep(TrackFunnelStep),
    /// Application-level liveness probe; answered with `pong`.
    Ping,
    /// Publish an arbitrary payload to a room under a caller-chosen event name.
    NotifyRoom(NotifyRoomRequest),
}

#[derive(Debug, Deserialize)]
pub struct TrackFunnelStep {
    /// Falls back to the connection's session token when absent.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub step: String,
}

#[derive(Debug, Deserialize)]
pub struct NotifyRoomRequest {
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: String,
        connection_id: String,
        timestamp: String,
    },
    PixNotification(PixNotification),
    FunnelUpdate(FunnelSnapshot),
    NotificationSent {
        room: String,
        event: String,
        timestamp: String,
    },
    Pong,
    /// Caller-chosen event name; serialized by hand in `encode_event`.
    #[serde(skip)]
    Custom { event: String, data: Value },
}

/// Handle one inbound text frame: decode, dispatch, respond.
pub fn handle_text_message(
    text: &str,
    tx: &ConnectionSender,
    state: &AppState,
    connection_id: ConnectionId,
    session: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(
                connection_id = %connection_id,
                error = %e,
                "ignoring unrecognized event frame"
            );
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom(room) => {
            handle_join_room(tx, state, connection_id, &room);
        }
        ClientEvent::JoinAdminFunnel => {
            handle_join_admin_funnel(tx, state, connection_id);
        }
        ClientEvent::PixPayment(raw) => {
            router::handle_pix_payment(state, raw);
        }
        ClientEvent::TrackFunnelStep(track) => {
            handle_track_funnel_step(state, session, track);
        }
        ClientEvent::Ping => {
            send_event(tx, &ServerEvent::Pong);
        }
        ClientEvent::NotifyRoom(req) => {
            handle_notify_room(tx, state, connection_id, req);
        }
    }
}

fn handle_join_room(
    tx: &ConnectionSender,
    state: &AppState,
    connection_id: ConnectionId,
    room: &str,
) {
    match state.relay.join_room(connection_id, room) {
        Ok(_) => {
            send_event(
                tx,
                &ServerEvent::RoomJoined {
                    room_id: room.to_string(),
                    connection_id: connection_id.to_string(),
                    timestamp: Utc::now().to_rfc3339(),
                },
            );
        }
        Err(e) => {
            // Retirement race: the connection is already gone.
            tracing::debug!(connection_id = %connection_id, error = %e, "joinRoom dropped");
        }
    }
}

fn handle_join_admin_funnel(tx: &ConnectionSender, state: &AppState, connection_id: ConnectionId) {
    match state.relay.subscribe_admin(connection_id) {
        Ok(snapshot) => {
            // Push the current snapshot to the new subscriber alone, so a
            // freshly attached dashboard renders without waiting for the
            // next state change.
            send_snapshot(tx, snapshot);
        }
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, error = %e, "joinAdminFunnel dropped");
        }
    }
}

fn handle_track_funnel_step(state: &AppState, session: &str, track: TrackFunnelStep) {
    let token = track
        .user_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| session.to_string());

    if let Err(e) = state.relay.track_stage(&token, &track.step) {
        // Socket callers only get a logged warning; the transition is
        // rejected and state left unchanged.
        tracing::warn!(token = %token, error = %e, "trackFunnelStep rejected");
    }
}

fn handle_notify_room(
    tx: &ConnectionSender,
    state: &AppState,
    connection_id: ConnectionId,
    req: NotifyRoomRequest,
) {
    match router::notify_room(state, &req.room, &req.event, req.data) {
        Ok(receipt) => {
            send_event(
                tx,
                &ServerEvent::NotificationSent {
                    room: receipt.room,
                    event: receipt.event,
                    timestamp: receipt.timestamp,
                },
            );
        }
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "notifyRoom rejected");
        }
    }
}

fn send_snapshot(tx: &ConnectionSender, snapshot: FunnelSnapshot) {
    send_event(tx, &ServerEvent::FunnelUpdate(snapshot));
}
