//! Append-only audit trail keyed by order reference.
//!
//! Exists specifically to debug the race between webhook delivery and the
//! redirect path: every verification attempt and status transition leaves an
//! entry here and a structured log line.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::status::CanonicalStatus;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CanonicalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            attempt: None,
            status: None,
            payload: None,
            success: true,
            error: None,
            at: Utc::now(),
        }
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn status(mut self, status: CanonicalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

#[derive(Clone, Default)]
pub struct AuditTrail {
    entries: Arc<RwLock<HashMap<String, Vec<AuditEntry>>>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, reference: &str, entry: AuditEntry) {
        tracing::info!(
            reference,
            action = %entry.action,
            attempt = entry.attempt,
            success = entry.success,
            status = entry.status.as_ref().map(|s| s.as_str()),
            "audit"
        );
        self.entries
            .write()
            .await
            .entry(reference.to_string())
            .or_default()
            .push(entry);
    }

    pub async fn entries_for(&self, reference: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .get(reference)
            .cloned()
            .unwrap_or_default()
    }
}
