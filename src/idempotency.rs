//! Webhook event dedup, Redis-backed with an in-memory fallback.
//!
//! The gateway redelivers webhooks at-least-once; this store remembers which
//! event ids have already been handled so redelivery does not change
//! observable state. Records expire after 24 hours, well past the gateway's
//! retry window.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::status::CanonicalStatus;

/// What processing an event amounted to, kept for the dedup window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ProcessedOutcome {
    Applied {
        reference: String,
        status: CanonicalStatus,
    },
    Ignored {
        reason: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub processed_at: DateTime<Utc>,
    pub outcome: ProcessedOutcome,
}

#[derive(Clone)]
pub struct IdempotencyStore {
    redis_client: Option<redis::Client>,
    fallback: Arc<RwLock<HashMap<String, ProcessedEvent>>>,
}

impl IdempotencyStore {
    pub fn new(redis_url: Option<String>) -> Self {
        let redis_client = redis_url.and_then(|url| {
            redis::Client::open(url)
                .map_err(|e| tracing::error!("redis connect error: {e}"))
                .ok()
        });

        Self {
            redis_client,
            fallback: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn is_processed(&self, event_id: &str) -> bool {
        if let Some(client) = &self.redis_client {
            if let Ok(mut con) = client.get_multiplexed_async_connection().await {
                let exists: bool = con
                    .exists(format!("event:{event_id}"))
                    .await
                    .unwrap_or(false);
                return exists;
            }
        }

        self.fallback.read().await.contains_key(event_id)
    }

    pub async fn mark_processed(&self, event_id: String, outcome: ProcessedOutcome) {
        let record = ProcessedEvent {
            event_id: event_id.clone(),
            processed_at: Utc::now(),
            outcome,
        };

        if let Some(client) = &self.redis_client {
            if let Ok(mut con) = client.get_multiplexed_async_connection().await {
                if let Ok(json) = serde_json::to_string(&record) {
                    let _: () = con
                        .set_ex(format!("event:{event_id}"), json, 86400) // 24h expire
                        .await
                        .unwrap_or(());
                    return;
                }
            }
        }

        self.fallback.write().await.insert(event_id, record);
    }
}
