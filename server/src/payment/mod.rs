//! Payment notification types and normalization.

pub mod router;
pub mod webhook;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status assigned to payment events that arrive without one.
pub const STATUS_PAID: &str = "PAGO";

/// Raw inbound payment event as sent by the payment webhook source or a
/// storefront client. Loosely typed on purpose: the fields either sit at
/// the top level or are nested under `paymentData`, depending on which
/// integration produced the event.
#[derive(Debug, Default, Deserialize)]
pub struct RawPixPayment {
    pub compra_id: Option<String>,
    pub status: Option<String>,
    pub txid: Option<String>,
    pub valor: Option<f64>,
    #[serde(rename = "paymentData")]
    pub payment_data: Option<Box<RawPixPayment>>,
}

impl RawPixPayment {
    /// Lenient decode of an arbitrary JSON payload. Fields that don't fit
    /// the schema are dropped rather than failing the whole event.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Resolve the flat-or-nested shape: when the top level carries no
    /// purchase identifier but a `paymentData` object does, the nested
    /// record wins.
    fn resolve(self) -> Self {
        if self.compra_id.is_none() {
            if let Some(nested) = self.payment_data {
                return nested.resolve();
            }
        }
        self
    }
}

/// Normalized, fully-populated payment record. Exists only for the
/// duration of one routing operation; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PixNotification {
    pub compra_id: String,
    pub status: String,
    pub txid: String,
    pub valor: Option<f64>,
    /// Server-assigned, RFC 3339.
    pub timestamp: String,
}

impl PixNotification {
    /// Build a notification from a raw event. `None` when no purchase
    /// identifier is resolvable — such events must not be delivered at
    /// all, or the per-purchase privacy boundary of the rooms breaks.
    pub fn normalize(raw: RawPixPayment) -> Option<Self> {
        let raw = raw.resolve();
        let compra_id = raw.compra_id.filter(|id| !id.is_empty())?;

        Some(Self {
            compra_id,
            status: raw
                .status
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| STATUS_PAID.to_string()),
            txid: raw
                .txid
                .filter(|t| !t.is_empty())
                .unwrap_or_else(generate_txid),
            valor: raw.valor,
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}

/// Transaction reference for events that arrived without one.
pub fn generate_txid() -> String {
    format!("TXID-{}", Uuid::new_v4().simple())
}
