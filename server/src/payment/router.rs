//! Notification routing: inbound payment events and generic room
//! notifications, plus the HTTP surface for synthetic event injection.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;
use crate::payment::{generate_txid, PixNotification, RawPixPayment, STATUS_PAID};
use crate::state::AppState;
use crate::ws::ServerEvent;

/// Acknowledgement returned to the caller of a generic room notification.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationReceipt {
    pub room: String,
    pub event: String,
    pub timestamp: String,
}

/// Route an inbound PIX payment event to the room named after its purchase
/// identifier. Events without a resolvable identifier are dropped with a
/// logged warning — delivering them broadly would break the per-purchase
/// privacy boundary the rooms exist to enforce.
pub fn handle_pix_payment(state: &AppState, raw: Value) -> Option<PixNotification> {
    let Some(notification) = PixNotification::normalize(RawPixPayment::from_value(raw)) else {
        tracing::warn!("pixPayment recebido sem compra_id, notificação não enviada");
        return None;
    };
    Some(route_notification(state, notification))
}

/// HTTP-triggered emulation path: behaves exactly like a real payment
/// event with the status forced to paid and a generated transaction
/// reference when none was supplied. Returns the constructed notification
/// as acknowledgement.
pub fn handle_emulated_payment(
    state: &AppState,
    compra_id: String,
    valor: Option<f64>,
    txid: Option<String>,
) -> Result<PixNotification, RelayError> {
    if compra_id.is_empty() {
        return Err(RelayError::MissingField("compra_id"));
    }

    let notification = PixNotification {
        compra_id,
        status: STATUS_PAID.to_string(),
        txid: txid.filter(|t| !t.is_empty()).unwrap_or_else(generate_txid),
        valor,
        timestamp: Utc::now().to_rfc3339(),
    };
    Ok(route_notification(state, notification))
}

/// Publish an arbitrary payload under a caller-chosen event name. This
/// path is reachable directly from the external API, so it validates
/// before publishing.
pub fn notify_room(
    state: &AppState,
    room: &str,
    event: &str,
    data: Value,
) -> Result<NotificationReceipt, RelayError> {
    if room.is_empty() {
        return Err(RelayError::MissingField("room"));
    }
    if event.is_empty() {
        return Err(RelayError::MissingField("event"));
    }

    let delivered = state.relay.publish(
        room,
        &ServerEvent::Custom {
            event: event.to_string(),
            data,
        },
    );
    tracing::info!(room = %room, event = %event, delivered, "room notification published");

    Ok(NotificationReceipt {
        room: room.to_string(),
        event: event.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Publish a normalized notification, advance the funnel when the purchase
/// was pix-pending, and hand the record to the webhook forwarder. The
/// forwarder dispatches outside the state critical section, so its latency
/// never affects the publish-to-subscribers path.
fn route_notification(state: &AppState, notification: PixNotification) -> PixNotification {
    let delivered = state.relay.publish(
        &notification.compra_id,
        &ServerEvent::PixNotification(notification.clone()),
    );
    tracing::info!(
        compra_id = %notification.compra_id,
        status = %notification.status,
        delivered,
        "pix notification published"
    );

    state.relay.complete_payment(&notification.compra_id);
    state.webhook.forward(&notification);
    notification
}

// --- HTTP handlers ---

#[derive(Debug, Deserialize)]
pub struct EmulatePixRequest {
    #[serde(default)]
    pub compra_id: String,
    pub valor: Option<f64>,
    pub txid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmulatePixResponse {
    pub success: bool,
    pub message: String,
    pub data: PixNotification,
}

#[derive(Debug, Deserialize)]
pub struct NotifyRoomBody {
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct NotifyRoomResponse {
    pub success: bool,
    #[serde(flatten)]
    pub receipt: NotificationReceipt,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

fn bad_request(err: RelayError) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            success: false,
            error: err.to_string(),
        }),
    )
}

/// POST /api/emulate-pix — Inject a synthetic payment event, routed exactly
/// like one arriving over the socket.
pub async fn emulate_pix(
    State(state): State<AppState>,
    Json(req): Json<EmulatePixRequest>,
) -> Result<Json<EmulatePixResponse>, (StatusCode, Json<ApiError>)> {
    let notification = handle_emulated_payment(&state, req.compra_id, req.valor, req.txid)
        .map_err(bad_request)?;

    Ok(Json(EmulatePixResponse {
        success: true,
        message: format!(
            "Notificação PIX emulada enviada para a sala {}",
            notification.compra_id
        ),
        data: notification,
    }))
}

/// POST /api/notify-room — Publish a payload to a room from the outside
/// (administrator tooling, webhook sources without purchase semantics).
pub async fn notify_room_endpoint(
    State(state): State<AppState>,
    Json(body): Json<NotifyRoomBody>,
) -> Result<Json<NotifyRoomResponse>, (StatusCode, Json<ApiError>)> {
    let receipt = notify_room(&state, &body.room, &body.event, body.data).map_err(bad_request)?;

    Ok(Json(NotifyRoomResponse {
        success: true,
        receipt,
    }))
}
