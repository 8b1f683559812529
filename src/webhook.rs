//! Inbound webhook endpoint: authenticate, dedup, apply.
//!
//! Response contract: 400 for malformed JSON, 401 for a bad signature, 200
//! for every authenticated syntactically-valid event, including ones that are
//! business-irrelevant, so the gateway does not retry unnecessarily.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::audit::AuditEntry;
use crate::error::ApiError;
use crate::event::GatewayEvent;
use crate::idempotency::ProcessedOutcome;
use crate::store::{StatusUpdate, UpsertOutcome};
use crate::verify::{verify_signature, SignatureInput};

/// Header names the gateway has been observed to use for the signature.
const SIGNATURE_HEADERS: [&str; 3] = ["x-yoco-signature", "yoco-signature", "webhook-signature"];
const EVENT_ID_HEADER: &str = "webhook-id";
const TIMESTAMP_HEADER: &str = "webhook-timestamp";

pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    // Malformed payloads are rejected before any signature or semantic work.
    let event: GatewayEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::MalformedPayload(e.to_string()))?;

    match &state.config.webhook_secret {
        Some(secret) => {
            let signature = signature_header(&headers).ok_or_else(|| {
                tracing::warn!(event_id = %event.id, "webhook missing signature header");
                ApiError::InvalidSignature
            })?;
            let input = SignatureInput {
                body: &body,
                signature,
                event_id: header_str(&headers, EVENT_ID_HEADER),
                timestamp: header_str(&headers, TIMESTAMP_HEADER),
            };
            match verify_signature(&input, secret) {
                Some(scheme) => tracing::debug!(
                    event_id = %event.id,
                    scheme = scheme.name(),
                    "webhook signature verified"
                ),
                None => {
                    tracing::warn!(event_id = %event.id, "webhook signature verification failed");
                    return Err(ApiError::InvalidSignature);
                }
            }
        }
        None => tracing::warn!(
            event_id = %event.id,
            "webhook signature verification skipped (no secret configured)"
        ),
    }

    if state.idempotency.is_processed(&event.id).await {
        tracing::info!(event_id = %event.id, "event already processed");
        return Ok(Json(
            json!({"success": true, "received": true, "duplicate": true}),
        ));
    }

    let verified = state.config.webhook_secret.is_some();
    let outcome = process_event(&state, &event, verified).await;
    state.idempotency.mark_processed(event.id.clone(), outcome).await;

    Ok(Json(
        json!({"success": true, "received": true, "timestamp": Utc::now()}),
    ))
}

fn signature_header(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS
        .iter()
        .find_map(|name| header_str(headers, name))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Turn a verified event into a status-store update plus an audit entry.
pub(crate) async fn process_event(
    state: &AppState,
    event: &GatewayEvent,
    verified: bool,
) -> ProcessedOutcome {
    let kind = event.kind();
    let Some(reference) = event.reference() else {
        tracing::warn!(
            event_id = %event.id,
            event_type = %event.event_type,
            "webhook event carries no order reference"
        );
        return ProcessedOutcome::Ignored {
            reason: "missing order reference".to_string(),
        };
    };

    let Some(status) = kind.canonical_status() else {
        // Unknown and refund events are recorded for forward compatibility
        // but never change the payment status.
        state
            .audit
            .append(
                reference,
                AuditEntry::new("webhook.recorded").payload(json!({
                    "eventId": event.id,
                    "type": event.event_type,
                })),
            )
            .await;
        tracing::info!(
            reference,
            event_id = %event.id,
            event_type = %event.event_type,
            "recorded event without status change"
        );
        return ProcessedOutcome::Ignored {
            reason: format!("no status change for {}", event.event_type),
        };
    };

    let update = StatusUpdate {
        status: status.clone(),
        raw_status: event.raw_status(),
        verified,
        source_event_id: event.id.clone(),
    };

    match state.statuses.apply(reference, update).await {
        UpsertOutcome::Applied => {
            state
                .audit
                .append(
                    reference,
                    AuditEntry::new("webhook.applied")
                        .status(status.clone())
                        .payload(json!({
                            "eventId": event.id,
                            "type": event.event_type,
                            "amount": event.amount,
                            "currency": event.currency,
                        })),
                )
                .await;
            tracing::info!(reference, event_id = %event.id, status = %status, "payment status updated");
            ProcessedOutcome::Applied {
                reference: reference.to_string(),
                status,
            }
        }
        UpsertOutcome::Duplicate => {
            tracing::info!(reference, event_id = %event.id, "duplicate event id, state unchanged");
            ProcessedOutcome::Ignored {
                reason: "duplicate event id".to_string(),
            }
        }
        UpsertOutcome::Superseded => {
            state
                .audit
                .append(
                    reference,
                    AuditEntry::new("webhook.stale").payload(json!({
                        "eventId": event.id,
                        "type": event.event_type,
                    })),
                )
                .await;
            tracing::info!(
                reference,
                event_id = %event.id,
                "stale update ignored, stored status is terminal"
            );
            ProcessedOutcome::Ignored {
                reason: "stale update for terminal status".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{build_router, AppState};
    use crate::config::ServerConfig;
    use crate::status::CanonicalStatus;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use hmac::{Hmac, Mac};
    use http_body_util::BodyExt;
    use sha2::Sha256;
    use tower::ServiceExt;

    const SECRET: &str = "test_webhook_secret";

    fn test_state(secret: Option<&str>) -> AppState {
        let mut config = ServerConfig::for_tests();
        config.webhook_secret = secret.map(String::from);
        AppState::new(config)
    }

    fn sign(body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn event_body(event_id: &str, event_type: &str, reference: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": event_id,
            "type": event_type,
            "amount": 35000,
            "currency": "ZAR",
            "metadata": {"reference": reference}
        }))
        .unwrap()
    }

    async fn post_webhook(
        state: &AppState,
        body: Vec<u8>,
        signature: Option<String>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/payments/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            request = request.header("x-yoco-signature", sig);
        }
        let response = build_router(state.clone())
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn valid_signed_event_updates_the_status_record() {
        let state = test_state(Some(SECRET));
        let body = event_body("evt_1", "payment.succeeded", "ORD-1");
        let signature = sign(&body);

        let (status, response) = post_webhook(&state, body, Some(signature)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["received"], json!(true));

        let record = state.statuses.get("ORD-1").await.unwrap();
        assert_eq!(record.status, CanonicalStatus::Paid);
        assert!(record.verified);
        assert_eq!(record.source_event_id, "evt_1");
        assert_eq!(state.audit.entries_for("ORD-1").await.len(), 1);
    }

    #[tokio::test]
    async fn replaying_the_same_event_is_acknowledged_but_inert() {
        let state = test_state(Some(SECRET));
        let body = event_body("evt_1", "payment.succeeded", "ORD-1");
        let signature = sign(&body);

        post_webhook(&state, body.clone(), Some(signature.clone())).await;
        let before = state.statuses.get("ORD-1").await.unwrap();

        let (status, response) = post_webhook(&state, body, Some(signature)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["duplicate"], json!(true));

        let after = state.statuses.get("ORD-1").await.unwrap();
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(state.audit.entries_for("ORD-1").await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_and_nothing_is_processed() {
        let state = test_state(Some(SECRET));
        let body = event_body("evt_1", "payment.succeeded", "ORD-1");

        let (status, response) =
            post_webhook(&state, body, Some("deadbeef".repeat(8))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["error"], json!("INVALID_SIGNATURE"));
        assert!(state.statuses.get("ORD-1").await.is_none());
        assert!(state.audit.entries_for("ORD-1").await.is_empty());
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected_when_secret_is_configured() {
        let state = test_state(Some(SECRET));
        let body = event_body("evt_1", "payment.succeeded", "ORD-1");

        let (status, _) = post_webhook(&state, body, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_json_is_a_client_error() {
        let state = test_state(Some(SECRET));
        let body = b"{not json".to_vec();
        let signature = sign(&body);

        let (status, response) = post_webhook(&state, body, Some(signature)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], json!("INVALID_PAYLOAD"));
    }

    #[tokio::test]
    async fn unauthenticated_events_are_accepted_when_no_secret_is_configured() {
        let state = test_state(None);
        let body = event_body("evt_1", "payment.succeeded", "ORD-1");

        let (status, _) = post_webhook(&state, body, None).await;

        assert_eq!(status, StatusCode::OK);
        let record = state.statuses.get("ORD-1").await.unwrap();
        assert_eq!(record.status, CanonicalStatus::Paid);
        assert!(!record.verified);
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged_without_status_change() {
        let state = test_state(Some(SECRET));
        let body = event_body("evt_9", "payout.settled", "ORD-1");
        let signature = sign(&body);

        let (status, _) = post_webhook(&state, body, Some(signature)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(state.statuses.get("ORD-1").await.is_none());
        // Recorded in the audit trail for forward compatibility.
        let entries = state.audit.entries_for("ORD-1").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "webhook.recorded");
    }

    #[tokio::test]
    async fn cancelled_event_maps_to_failed() {
        let state = test_state(Some(SECRET));
        let body = event_body("evt_2", "payment.cancelled", "ORD-2");
        let signature = sign(&body);

        post_webhook(&state, body, Some(signature)).await;

        let record = state.statuses.get("ORD-2").await.unwrap();
        assert_eq!(record.status, CanonicalStatus::Failed);
        assert_eq!(record.raw_status, "cancelled");
    }

    #[tokio::test]
    async fn event_without_reference_is_acknowledged_but_ignored() {
        let state = test_state(Some(SECRET));
        let body = serde_json::to_vec(&json!({
            "id": "evt_3",
            "type": "payment.succeeded",
            "metadata": {}
        }))
        .unwrap();
        let signature = sign(&body);

        let (status, _) = post_webhook(&state, body, Some(signature)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn late_pending_event_does_not_downgrade_terminal_status() {
        let state = test_state(None);
        let paid = event_body("evt_1", "payment.succeeded", "ORD-1");
        post_webhook(&state, paid, None).await;

        // A stale pending-ish notification with a different event id.
        let stale = serde_json::to_vec(&json!({
            "id": "evt_0",
            "type": "payment.cancelled",
            "metadata": {"reference": "ORD-1"}
        }))
        .unwrap();
        post_webhook(&state, stale, None).await;

        // cancelled is terminal too, so it applies; now replay a duplicate of
        // the original paid event and confirm it cannot resurrect anything.
        let replay = event_body("evt_1", "payment.succeeded", "ORD-1");
        let (status, _) = post_webhook(&state, replay, None).await;
        assert_eq!(status, StatusCode::OK);
        let record = state.statuses.get("ORD-1").await.unwrap();
        assert_eq!(record.status, CanonicalStatus::Failed);
    }
}
