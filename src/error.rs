//! API error taxonomy.
//!
//! Each variant maps to an HTTP status and a stable machine-readable error
//! code, so callers can branch on `error` without parsing messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Checkout-time validation failures, rejected before any network call.
#[derive(Debug, Error, PartialEq)]
pub enum IntentValidationError {
    #[error("amount must be a positive number")]
    InvalidAmount,
    #[error("amount cannot exceed R{0}")]
    AmountTooHigh(f64),
    #[error("valid customer email is required")]
    InvalidEmail,
    #[error("payment reference is required")]
    MissingReference,
}

impl IntentValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::AmountTooHigh(_) => "AMOUNT_TOO_HIGH",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::MissingReference => "MISSING_REFERENCE",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] IntentValidationError),
    #[error("webhook signature verification failed")]
    InvalidSignature,
    #[error("malformed JSON payload: {0}")]
    MalformedPayload(String),
    /// Gateway-side rejection, passed through with the upstream status code.
    /// `detail` is already redacted according to the deployment mode.
    #[error("gateway rejected the request with status {status}")]
    GatewayRejected { status: u16, detail: serde_json::Value },
    /// The gateway answered 2xx but the body did not match the checkout
    /// contract. Distinct from [`Upstream`](Self::Upstream), which is a
    /// transport failure.
    #[error("unexpected gateway response: {0}")]
    GatewayDecode(String),
    #[error("gateway request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(inner) => inner.code(),
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::MalformedPayload(_) => "INVALID_PAYLOAD",
            Self::GatewayRejected { .. } => "PAYMENT_PROVIDER_ERROR",
            Self::GatewayDecode(_) => "GATEWAY_BAD_RESPONSE",
            Self::Upstream(_) => "GATEWAY_UNREACHABLE",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::GatewayRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::GatewayDecode(_) | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::GatewayRejected { detail, .. } => json!({
                "success": false,
                "error": self.code(),
                "message": "Failed to create payment intent",
                "details": detail,
            }),
            _ => json!({
                "success": false,
                "error": self.code(),
                "message": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}
