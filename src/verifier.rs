//! Post-redirect verification client.
//!
//! After the gateway redirects the shopper back, the confirmation page cannot
//! trust the locally cached order: the webhook may not have landed yet. This
//! client queries the authoritative status endpoint once, then polls with
//! bounded retries, and finally hands the outcome to the reconciler. When the
//! bound is exhausted it resolves in a degraded mode: last-known status,
//! explicitly flagged unverified, so the UI shows "still confirming" instead
//! of a false positive.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::watch;

use crate::audit::{AuditEntry, AuditTrail};
use crate::orders::OrderStore;
use crate::reconcile::OrderReconciler;
use crate::status::CanonicalStatus;
use crate::store::StatusResponse;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("unexpected response shape")]
    Decode,
    #[error("request timed out")]
    Timeout,
}

/// Transport seam for the status endpoint, so the polling protocol can be
/// exercised without a network.
#[async_trait]
pub trait StatusQuery: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<StatusResponse, QueryError>;
}

pub struct HttpStatusQuery {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStatusQuery {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl StatusQuery for HttpStatusQuery {
    async fn fetch(&self, reference: &str) -> Result<StatusResponse, QueryError> {
        let url = format!(
            "{}/payments/{}/status",
            self.base_url.trim_end_matches('/'),
            reference
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(QueryError::Status(response.status().as_u16()));
        }
        let value: Value = response.json().await?;
        extract_status(value).ok_or(QueryError::Decode)
    }
}

/// Accepts the enveloped `{success, data}` shape this server produces, a bare
/// status record, and the `{payment: {...}}` nesting some API versions used.
fn extract_status(value: Value) -> Option<StatusResponse> {
    let inner = match value.get("data") {
        Some(data) => data.clone(),
        None => value,
    };
    match serde_json::from_value(inner.clone()) {
        Ok(response) => Some(response),
        Err(_) => inner
            .get("payment")
            .and_then(|payment| serde_json::from_value(payment.clone()).ok()),
    }
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Total query attempts, the immediate first check included.
    pub attempts: u32,
    /// Fixed wait between attempts.
    pub interval: Duration,
    /// Per-attempt network timeout.
    pub attempt_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 6,
            interval: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerificationSource {
    #[serde(rename = "server")]
    Server,
    #[serde(rename = "fallback-local")]
    FallbackLocal,
}

/// Transient outcome handed to the UI and the reconciler; never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub reference: String,
    /// True only when the server confirmed a terminal status.
    pub verified: bool,
    pub status: CanonicalStatus,
    pub source: VerificationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_payload: Option<StatusResponse>,
}

pub struct PaymentVerifier {
    query: Arc<dyn StatusQuery>,
    orders: Arc<dyn OrderStore>,
    reconciler: OrderReconciler,
    audit: AuditTrail,
    policy: PollPolicy,
}

impl PaymentVerifier {
    pub fn new(
        query: Arc<dyn StatusQuery>,
        orders: Arc<dyn OrderStore>,
        audit: AuditTrail,
        policy: PollPolicy,
    ) -> Self {
        Self {
            reconciler: OrderReconciler::new(orders.clone(), audit.clone()),
            query,
            orders,
            audit,
            policy,
        }
    }

    /// Run the full check-then-poll protocol to completion.
    pub async fn verify(&self, reference: &str) -> VerificationResult {
        // The sender must outlive the loop; dropping it reads as cancellation.
        let (_keep_alive, cancel) = watch::channel(false);
        self.verify_cancellable(reference, cancel).await
    }

    /// As [`verify`](Self::verify), but resolves early in degraded mode when
    /// the cancel channel fires or its sender is dropped (user navigated
    /// away). No timers are left behind either way.
    pub async fn verify_cancellable(
        &self,
        reference: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> VerificationResult {
        let local_status = self
            .orders
            .get(reference)
            .await
            .map(|order| order.status);

        let mut last_server: Option<StatusResponse> = None;
        let mut server_reached = false;
        let mut cancelled = false;

        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            let phase = if attempt == 1 { "checking" } else { "polling" };
            let outcome =
                match tokio::time::timeout(self.policy.attempt_timeout, self.query.fetch(reference))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(QueryError::Timeout),
                };

            match outcome {
                Ok(response) => {
                    server_reached = true;
                    self.audit
                        .append(
                            reference,
                            AuditEntry::new("verify.attempt")
                                .attempt(attempt)
                                .status(response.status.clone())
                                .payload(json!({"phase": phase, "server": &response})),
                        )
                        .await;

                    if response.status.is_terminal() {
                        let result = VerificationResult {
                            reference: reference.to_string(),
                            verified: true,
                            status: response.status.clone(),
                            source: VerificationSource::Server,
                            server_payload: Some(response),
                        };
                        self.audit
                            .append(
                                reference,
                                AuditEntry::new("verify.resolved")
                                    .attempt(attempt)
                                    .status(result.status.clone()),
                            )
                            .await;
                        tracing::info!(
                            reference,
                            attempt,
                            status = %result.status,
                            "payment status confirmed"
                        );
                        self.reconciler.apply(&result).await;
                        return result;
                    }
                    last_server = Some(response);
                }
                Err(err) => {
                    // A failed attempt consumes its slot; the loop keeps
                    // forward progress under transient failures.
                    tracing::warn!(reference, attempt, error = %err, "status query attempt failed");
                    self.audit
                        .append(
                            reference,
                            AuditEntry::new("verify.attempt")
                                .attempt(attempt)
                                .failed(err.to_string()),
                        )
                        .await;
                }
            }

            if attempt < attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.policy.interval) => {}
                    changed = cancel.changed() => {
                        if changed.is_err() || *cancel.borrow_and_update() {
                            cancelled = true;
                        }
                    }
                }
                if cancelled {
                    break;
                }
            }
        }

        // Degraded resolution: last-known server status, or the cached local
        // order status when every query failed outright. Never verified.
        let status = last_server
            .as_ref()
            .map(|response| response.status.clone())
            .or(local_status)
            .unwrap_or(CanonicalStatus::Pending);
        let source = if server_reached {
            VerificationSource::Server
        } else {
            VerificationSource::FallbackLocal
        };
        let result = VerificationResult {
            reference: reference.to_string(),
            verified: false,
            status,
            source,
            server_payload: last_server,
        };

        let action = if cancelled { "verify.cancelled" } else { "verify.degraded" };
        self.audit
            .append(
                reference,
                AuditEntry::new(action)
                    .status(result.status.clone())
                    .failed("no terminal status confirmed"),
            )
            .await;
        tracing::warn!(
            reference,
            cancelled,
            status = %result.status,
            "verification resolved degraded"
        );
        self.reconciler.apply(&result).await;
        result
    }
}
