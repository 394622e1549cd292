use std::sync::Arc;

use crate::payment::webhook::WebhookForwarder;
use crate::relay::Relay;

/// Shared application state passed to all handlers via the axum State
/// extractor. The relay is the single owner of all shared mutable state;
/// everything else holds a reference to it rather than capturing globals.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry, room directory and funnel aggregate.
    pub relay: Arc<Relay>,
    /// Outbound webhook forwarder (fire-and-forget).
    pub webhook: Arc<WebhookForwarder>,
}

impl AppState {
    pub fn new(relay: Relay, webhook: WebhookForwarder) -> Self {
        Self {
            relay: Arc::new(relay),
            webhook: Arc::new(webhook),
        }
    }
}
