//! Authoritative payment status store, keyed by order reference.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::status::CanonicalStatus;

/// One record per order reference, created and overwritten only by the
/// verified webhook pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusRecord {
    pub reference: String,
    pub status: CanonicalStatus,
    /// Vendor status string as received, before normalization.
    pub raw_status: String,
    /// Whether the originating webhook passed signature verification.
    pub verified: bool,
    /// Event id that produced this record, used for idempotency and auditing.
    pub source_event_id: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: CanonicalStatus,
    pub raw_status: String,
    pub verified: bool,
    pub source_event_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record was created or overwritten.
    Applied,
    /// Same source event id as the stored record; nothing changed.
    Duplicate,
    /// The stored status is terminal and the update is not; nothing changed.
    Superseded,
}

/// Store abstraction so a durable keyed backend can replace the in-memory map
/// without touching the webhook pipeline.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get(&self, reference: &str) -> Option<PaymentStatusRecord>;
    /// Idempotent, monotonic upsert. All decisions happen atomically with the
    /// write so concurrent deliveries for one reference serialize.
    async fn apply(&self, reference: &str, update: StatusUpdate) -> UpsertOutcome;
}

/// In-memory implementation. Mutations take the write lock for the whole
/// check-then-write, which serializes concurrent updates per key.
#[derive(Default)]
pub struct MemoryStatusStore {
    records: RwLock<HashMap<String, PaymentStatusRecord>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn StatusStore> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get(&self, reference: &str) -> Option<PaymentStatusRecord> {
        self.records.read().await.get(reference).cloned()
    }

    async fn apply(&self, reference: &str, update: StatusUpdate) -> UpsertOutcome {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(reference) {
            if existing.source_event_id == update.source_event_id {
                return UpsertOutcome::Duplicate;
            }
            if existing.status.is_terminal() && !update.status.is_terminal() {
                return UpsertOutcome::Superseded;
            }
        }
        records.insert(
            reference.to_string(),
            PaymentStatusRecord {
                reference: reference.to_string(),
                status: update.status,
                raw_status: update.raw_status,
                verified: update.verified,
                source_event_id: update.source_event_id,
                updated_at: Utc::now(),
            },
        );
        UpsertOutcome::Applied
    }
}

/// Wire shape of a status query response. Defaults to an unverified `pending`
/// when no webhook has arrived for the reference yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub reference: String,
    pub status: CanonicalStatus,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusResponse {
    pub fn from_record(record: PaymentStatusRecord) -> Self {
        Self {
            reference: record.reference,
            status: record.status,
            verified: record.verified,
            raw_status: Some(record.raw_status),
            updated_at: Some(record.updated_at),
        }
    }

    pub fn pending(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            status: CanonicalStatus::Pending,
            verified: false,
            raw_status: None,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(status: CanonicalStatus, event_id: &str) -> StatusUpdate {
        StatusUpdate {
            raw_status: status.as_str().to_string(),
            status,
            verified: true,
            source_event_id: event_id.to_string(),
        }
    }

    #[tokio::test]
    async fn applies_first_update_for_a_reference() {
        let store = MemoryStatusStore::new();
        let outcome = store
            .apply("ORD-1", update(CanonicalStatus::Paid, "evt_1"))
            .await;
        assert_eq!(outcome, UpsertOutcome::Applied);

        let record = store.get("ORD-1").await.unwrap();
        assert_eq!(record.status, CanonicalStatus::Paid);
        assert_eq!(record.source_event_id, "evt_1");
        assert!(record.verified);
    }

    #[tokio::test]
    async fn replaying_the_same_event_id_is_a_no_op() {
        let store = MemoryStatusStore::new();
        store
            .apply("ORD-1", update(CanonicalStatus::Paid, "evt_1"))
            .await;
        let before = store.get("ORD-1").await.unwrap();

        let outcome = store
            .apply("ORD-1", update(CanonicalStatus::Paid, "evt_1"))
            .await;
        assert_eq!(outcome, UpsertOutcome::Duplicate);

        let after = store.get("ORD-1").await.unwrap();
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn terminal_status_never_downgrades_to_pending() {
        let store = MemoryStatusStore::new();
        store
            .apply("ORD-1", update(CanonicalStatus::Paid, "evt_1"))
            .await;

        let outcome = store
            .apply("ORD-1", update(CanonicalStatus::Pending, "evt_0"))
            .await;
        assert_eq!(outcome, UpsertOutcome::Superseded);
        assert_eq!(store.get("ORD-1").await.unwrap().status, CanonicalStatus::Paid);
    }

    #[tokio::test]
    async fn terminal_to_terminal_transition_is_applied() {
        // A later, distinct event may flip paid to failed (e.g. a reversal
        // reported as payment.failed); only regression to pending is blocked.
        let store = MemoryStatusStore::new();
        store
            .apply("ORD-1", update(CanonicalStatus::Paid, "evt_1"))
            .await;
        let outcome = store
            .apply("ORD-1", update(CanonicalStatus::Failed, "evt_2"))
            .await;
        assert_eq!(outcome, UpsertOutcome::Applied);
        assert_eq!(
            store.get("ORD-1").await.unwrap().status,
            CanonicalStatus::Failed
        );
    }

    #[tokio::test]
    async fn references_are_independent() {
        let store = MemoryStatusStore::new();
        store
            .apply("ORD-1", update(CanonicalStatus::Paid, "evt_1"))
            .await;
        assert!(store.get("ORD-2").await.is_none());
    }

    #[test]
    fn default_status_response_is_unverified_pending() {
        let resp = StatusResponse::pending("ORD-9");
        assert_eq!(resp.status, CanonicalStatus::Pending);
        assert!(!resp.verified);
        assert!(resp.raw_status.is_none());
    }
}
