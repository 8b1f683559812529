//! Order records and the store they live in.
//!
//! Orders are created at checkout and their `status` is mutated only by the
//! reconciler once a verified payment status is available. The in-memory
//! implementation stands in for the hosted document store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::status::CanonicalStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    /// Major currency units (Rand).
    pub unit_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetails {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub items: Vec<LineItem>,
    /// Computed total in major currency units.
    pub total: f64,
    pub payment_method: String,
    pub delivery: DeliveryDetails,
    pub status: CanonicalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A freshly checked-out order, pending payment.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        items: Vec<LineItem>,
        payment_method: impl Into<String>,
        delivery: DeliveryDetails,
    ) -> Self {
        let now = Utc::now();
        let total = items
            .iter()
            .map(|item| item.unit_price * f64::from(item.quantity))
            .sum();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            items,
            total,
            payment_method: payment_method.into(),
            delivery,
            status: CanonicalStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, order_id: &str) -> Option<Order>;
    async fn insert(&self, order: Order);
    /// Overwrite the status and timestamp the change. Returns `false` when no
    /// such order exists.
    async fn set_status(&self, order_id: &str, status: CanonicalStatus) -> bool;
}

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn OrderStore> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.read().await.get(order_id).cloned()
    }

    async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id.clone(), order);
    }

    async fn set_status(&self, order_id: &str, status: CanonicalStatus) -> bool {
        let mut orders = self.orders.write().await;
        match orders.get_mut(order_id) {
            Some(order) => {
                order.status = status;
                order.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_order(id: &str) -> Order {
    Order::new(
        id,
        "user_1",
        vec![LineItem {
            product_id: "prod_1".to_string(),
            name: "Scented candle".to_string(),
            quantity: 2,
            unit_price: 175.0,
            variant: Some("vanilla".to_string()),
        }],
        "card",
        DeliveryDetails {
            name: "Thandi M".to_string(),
            email: "thandi@example.com".to_string(),
            phone: Some("+27 82 000 0000".to_string()),
            address: Some("12 Long Street, Cape Town".to_string()),
        },
    )
}
