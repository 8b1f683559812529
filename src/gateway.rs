//! Gateway adapter: turns an order into a hosted-checkout intent.
//!
//! Validation happens entirely before the outbound call; a transient network
//! failure surfaces to the caller and is never retried here.

use std::collections::HashMap;

use axum::{extract::State, Json};
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::config::{AppMode, ServerConfig};
use crate::error::{ApiError, IntentValidationError};
use crate::status::CanonicalStatus;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    /// Major currency units (Rand), converted to cents before the call.
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub failure_url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

fn default_currency() -> String {
    "ZAR".to_string()
}

impl CreateIntentRequest {
    pub fn validate(&self, max_amount: f64) -> Result<(), IntentValidationError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(IntentValidationError::InvalidAmount);
        }
        if self.amount > max_amount {
            return Err(IntentValidationError::AmountTooHigh(max_amount));
        }
        if !is_valid_email(&self.customer_email) {
            return Err(IntentValidationError::InvalidEmail);
        }
        if self.reference.trim().is_empty() {
            return Err(IntentValidationError::MissingReference);
        }
        Ok(())
    }
}

pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn is_valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Outbound request body in the gateway's checkout format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutRequest {
    amount: i64,
    currency: String,
    metadata: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    success_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancel_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_url: Option<String>,
}

impl CheckoutRequest {
    fn from_request(req: &CreateIntentRequest) -> Self {
        let mut metadata = req.metadata.clone();
        // The reference must round-trip through the gateway so the webhook
        // can be correlated back to the order.
        metadata.insert("reference".to_string(), json!(req.reference));
        metadata.insert(
            "customerName".to_string(),
            json!(req.customer_name.as_deref().unwrap_or("Guest Customer")),
        );
        Self {
            amount: to_minor_units(req.amount),
            currency: req.currency.to_uppercase(),
            metadata,
            success_url: req.success_url.clone(),
            cancel_url: req.cancel_url.clone(),
            failure_url: req.failure_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    id: String,
    redirect_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub payment_id: String,
    pub redirect_url: String,
    pub amount: f64,
    pub currency: String,
    pub reference: String,
    pub status: CanonicalStatus,
}

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
    max_amount: f64,
    mode: AppMode,
}

impl GatewayClient {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.gateway_api_url.clone(),
            secret_key: config.gateway_secret_key.clone(),
            max_amount: config.max_amount,
            mode: config.mode,
        }
    }

    pub async fn create_intent(
        &self,
        req: &CreateIntentRequest,
    ) -> Result<IntentResponse, ApiError> {
        req.validate(self.max_amount)?;
        let outbound = CheckoutRequest::from_request(req);

        tracing::info!(
            reference = %req.reference,
            amount_minor = outbound.amount,
            currency = %outbound.currency,
            "creating payment intent"
        );

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.secret_key)
            .header(header::USER_AGENT, "lume-payment-server/1.0")
            .json(&outbound)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            tracing::error!(
                status = status.as_u16(),
                reference = %req.reference,
                "gateway rejected payment intent"
            );
            return Err(rejection(status.as_u16(), body, self.mode));
        }

        let body: CheckoutResponse = response
            .json()
            .await
            .map_err(|e| ApiError::GatewayDecode(e.to_string()))?;
        tracing::info!(payment_id = %body.id, reference = %req.reference, "payment intent created");

        Ok(IntentResponse {
            payment_id: body.id,
            redirect_url: body.redirect_url,
            amount: req.amount,
            currency: req.currency.to_uppercase(),
            reference: req.reference.clone(),
            status: CanonicalStatus::Pending,
        })
    }
}

/// Gateway error detail is passed through in sandbox mode and redacted to a
/// generic message in live mode.
fn rejection(status: u16, body: Value, mode: AppMode) -> ApiError {
    let detail = if mode.is_live() {
        Value::String("Contact support".to_string())
    } else {
        body
    };
    ApiError::GatewayRejected { status, detail }
}

pub async fn create_intent_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateIntentRequest>,
) -> Result<Json<Value>, ApiError> {
    let data = state.gateway.create_intent(&req).await?;
    Ok(Json(json!({"success": true, "data": data})))
}
