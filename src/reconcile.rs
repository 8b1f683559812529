//! Applies a server-confirmed status to the locally persisted order.
//!
//! This is the only place allowed to mutate an order's `status` after
//! creation. Unverified results never touch the order.

use std::sync::Arc;

use serde_json::json;

use crate::audit::{AuditEntry, AuditTrail};
use crate::orders::OrderStore;
use crate::status::CanonicalStatus;
use crate::verifier::VerificationResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Updated {
        from: CanonicalStatus,
        to: CanonicalStatus,
    },
    /// The order already carries the confirmed status.
    Unchanged,
    /// The result was not server-verified; the order is left untouched.
    SkippedUnverified,
    OrderMissing,
}

pub struct OrderReconciler {
    orders: Arc<dyn OrderStore>,
    audit: AuditTrail,
}

impl OrderReconciler {
    pub fn new(orders: Arc<dyn OrderStore>, audit: AuditTrail) -> Self {
        Self { orders, audit }
    }

    pub async fn apply(&self, result: &VerificationResult) -> ReconcileOutcome {
        if !result.verified {
            tracing::debug!(
                reference = %result.reference,
                "skipping reconciliation for unverified result"
            );
            return ReconcileOutcome::SkippedUnverified;
        }

        let Some(order) = self.orders.get(&result.reference).await else {
            tracing::warn!(
                reference = %result.reference,
                "verified status for an order not found locally"
            );
            return ReconcileOutcome::OrderMissing;
        };

        if order.status == result.status {
            return ReconcileOutcome::Unchanged;
        }

        self.orders
            .set_status(&result.reference, result.status.clone())
            .await;
        self.audit
            .append(
                &result.reference,
                AuditEntry::new("status.sync")
                    .status(result.status.clone())
                    .payload(json!({
                        "from": &order.status,
                        "to": &result.status,
                    })),
            )
            .await;
        tracing::info!(
            reference = %result.reference,
            from = %order.status,
            to = %result.status,
            "order status reconciled"
        );
        ReconcileOutcome::Updated {
            from: order.status,
            to: result.status.clone(),
        }
    }
}
