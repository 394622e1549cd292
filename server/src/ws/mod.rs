pub mod actor;
pub mod handler;
pub mod protocol;

use axum::extract::ws::Message;
use serde_json::json;
use tokio::sync::mpsc;

pub use protocol::ServerEvent;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Encode an outbound event as a JSON text frame: `{"event": ..., "data": ...}`.
pub fn encode_event(event: &ServerEvent) -> Message {
    let frame = match event {
        // Generic notifications carry a caller-chosen event name, so they
        // bypass the tagged-enum serialization of the fixed protocol.
        ServerEvent::Custom { event, data } => json!({ "event": event, "data": data }),
        fixed => serde_json::to_value(fixed).unwrap_or_else(|_| json!({})),
    };
    Message::Text(frame.to_string().into())
}

/// Push an event to a single connection's outbound channel. A send failure
/// means the writer task is gone; retirement will clean the entry up.
pub fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    let _ = tx.send(encode_event(event));
}
