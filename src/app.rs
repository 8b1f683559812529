//! Application state and router assembly.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audit::AuditTrail;
use crate::config::ServerConfig;
use crate::gateway::{create_intent_handler, GatewayClient};
use crate::idempotency::IdempotencyStore;
use crate::store::{MemoryStatusStore, StatusResponse, StatusStore};
use crate::webhook::webhook_handler;

#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub gateway: GatewayClient,
    pub statuses: Arc<dyn StatusStore>,
    pub idempotency: IdempotencyStore,
    pub audit: AuditTrail,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            gateway: GatewayClient::new(&config),
            statuses: MemoryStatusStore::shared(),
            idempotency: IdempotencyStore::new(config.redis_url.clone()),
            audit: AuditTrail::new(),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(health_handler))
        .route("/payments/create-intent", post(create_intent_handler))
        .route("/payments/webhook", post(webhook_handler))
        .route("/payments/:reference/status", get(payment_status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    match &config.allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        }
        None => CorsLayer::permissive(),
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "Payment Server Running",
        "mode": if state.config.mode.is_live() { "live" } else { "sandbox" },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

/// Read-only status poll target. Safe to call repeatedly; a reference with no
/// webhook yet reads as an unverified `pending`.
async fn payment_status_handler(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Json<Value> {
    let data = match state.statuses.get(&reference).await {
        Some(record) => StatusResponse::from_record(record),
        None => StatusResponse::pending(reference),
    };
    Json(json!({"success": true, "data": data}))
}
