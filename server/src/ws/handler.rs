use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::Response,
};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for the WebSocket upgrade. The session token is
/// optional; connections without one are keyed by their connection id.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub session: Option<String>,
}

/// GET /ws?session=<token>
/// WebSocket upgrade endpoint. On success, spawns an actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| actor::run_connection(socket, state, params.session))
}
