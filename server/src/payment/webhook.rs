//! Fire-and-forget forwarding of routed notifications to an external
//! webhook URL. Failures are logged and never retried or surfaced to the
//! originating client.

use crate::payment::PixNotification;

/// Outbound forwarder. Cloneable handle around a shared HTTP client; a
/// missing URL disables forwarding entirely.
#[derive(Clone)]
pub struct WebhookForwarder {
    client: reqwest::Client,
    forward_url: Option<String>,
}

impl WebhookForwarder {
    pub fn new(forward_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            forward_url: forward_url.filter(|url| !url.is_empty()),
        }
    }

    /// Forwarder that drops everything; used when no URL is configured and
    /// in tests.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// POST the notification as JSON from a detached task. The caller is
    /// on the publish path and must not block on outbound I/O.
    pub fn forward(&self, notification: &PixNotification) {
        let Some(url) = self.forward_url.clone() else {
            return;
        };
        let client = self.client.clone();
        let payload = notification.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(
                        compra_id = %payload.compra_id,
                        status = %resp.status(),
                        "webhook forwarded"
                    );
                }
                Ok(resp) => {
                    tracing::warn!(
                        compra_id = %payload.compra_id,
                        status = %resp.status(),
                        "webhook endpoint rejected notification"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        compra_id = %payload.compra_id,
                        error = %e,
                        "webhook forward failed"
                    );
                }
            }
        });
    }
}
