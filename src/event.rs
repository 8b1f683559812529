//! Typed model of gateway webhook notifications.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::CanonicalStatus;

/// A webhook notification as delivered by the gateway. The event id doubles
/// as the idempotency key; the metadata map must carry the order reference so
/// the event can be correlated back to a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, rename = "createdDate")]
    pub created_date: Option<DateTime<Utc>>,
    /// Amount in minor currency units (cents).
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default, rename = "failureReason")]
    pub failure_reason: Option<String>,
    #[serde(default, rename = "refundAmount")]
    pub refund_amount: Option<i64>,
}

impl GatewayEvent {
    /// Order reference carried in the metadata map, under either of the keys
    /// the storefront writes at intent creation.
    pub fn reference(&self) -> Option<&str> {
        ["reference", "orderId"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(Value::as_str))
    }

    /// Raw vendor status string: the explicit `status` field when present,
    /// otherwise derived from the event type suffix (`payment.succeeded`
    /// yields `succeeded`).
    pub fn raw_status(&self) -> String {
        if let Some(status) = &self.status {
            return status.clone();
        }
        self.event_type
            .rsplit_once('.')
            .map(|(_, suffix)| suffix.to_string())
            .unwrap_or_else(|| self.event_type.clone())
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from_type(&self.event_type)
    }
}

/// Tagged union over the known gateway event types, with an explicit unknown
/// variant for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PaymentSucceeded,
    PaymentFailed,
    PaymentCancelled,
    PaymentRefunded,
    Unknown(String),
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment.succeeded" => Self::PaymentSucceeded,
            "payment.failed" => Self::PaymentFailed,
            "payment.cancelled" => Self::PaymentCancelled,
            "payment.refunded" => Self::PaymentRefunded,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Canonical status this event maps to, or `None` for events that are
    /// recorded but must not change the payment status (refunds, unknowns).
    pub fn canonical_status(&self) -> Option<CanonicalStatus> {
        match self {
            Self::PaymentSucceeded => Some(CanonicalStatus::Paid),
            Self::PaymentFailed | Self::PaymentCancelled => Some(CanonicalStatus::Failed),
            Self::PaymentRefunded | Self::Unknown(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> GatewayEvent {
        serde_json::from_value(json!({
            "id": "evt_01",
            "type": "payment.succeeded",
            "amount": 35000,
            "currency": "ZAR",
            "metadata": {
                "reference": "ORD-1",
                "customerName": "Thandi M",
                "itemCount": 3
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_gateway_payload_and_extracts_reference() {
        let event = sample_event();
        assert_eq!(event.reference(), Some("ORD-1"));
        assert_eq!(event.amount, Some(35000));
        assert_eq!(event.kind(), EventKind::PaymentSucceeded);
    }

    #[test]
    fn falls_back_to_order_id_metadata_key() {
        let event: GatewayEvent = serde_json::from_value(json!({
            "id": "evt_02",
            "type": "payment.failed",
            "metadata": {"orderId": "ORD-2"}
        }))
        .unwrap();
        assert_eq!(event.reference(), Some("ORD-2"));
    }

    #[test]
    fn missing_reference_yields_none() {
        let event: GatewayEvent = serde_json::from_value(json!({
            "id": "evt_03",
            "type": "payment.succeeded",
            "metadata": {"itemCount": 1}
        }))
        .unwrap();
        assert_eq!(event.reference(), None);
    }

    #[test]
    fn raw_status_prefers_explicit_field_over_type_suffix() {
        let mut event = sample_event();
        assert_eq!(event.raw_status(), "succeeded");
        event.status = Some("successful".to_string());
        assert_eq!(event.raw_status(), "successful");
    }

    #[test]
    fn event_kinds_map_to_canonical_statuses() {
        assert_eq!(
            EventKind::PaymentSucceeded.canonical_status(),
            Some(CanonicalStatus::Paid)
        );
        assert_eq!(
            EventKind::PaymentFailed.canonical_status(),
            Some(CanonicalStatus::Failed)
        );
        assert_eq!(
            EventKind::PaymentCancelled.canonical_status(),
            Some(CanonicalStatus::Failed)
        );
        assert_eq!(EventKind::PaymentRefunded.canonical_status(), None);
        assert_eq!(
            EventKind::from_type("payout.settled"),
            EventKind::Unknown("payout.settled".to_string())
        );
        assert_eq!(EventKind::from_type("payout.settled").canonical_status(), None);
    }
}
