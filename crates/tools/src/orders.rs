//! In-memory order store
//!
//! Read-only lookup over a fixed set of orders, loaded from a YAML fixture
//! file or built in code. Stands in for the shop's order API.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use voice_support_config::OrdersConfig;
use voice_support_core::{DeliveryMethod, OrderState, OrderStatus, OrderStore, StoreError};

pub struct InMemoryOrderStore {
    orders: HashMap<String, OrderStatus>,
}

impl InMemoryOrderStore {
    pub fn new(orders: impl IntoIterator<Item = OrderStatus>) -> Self {
        Self {
            orders: orders
                .into_iter()
                .map(|o| (o.order_id.clone(), o))
                .collect(),
        }
    }

    /// Load a YAML list of orders
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let orders: Vec<OrderStatus> = serde_yaml::from_str(&content)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), orders = orders.len(), "Loaded order fixtures");
        Ok(Self::new(orders))
    }

    /// Store as configured; the sample orders when no fixture file is set
    pub fn from_config(config: &OrdersConfig) -> Result<Self, StoreError> {
        match &config.fixtures_path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::sample()),
        }
    }

    /// A handful of orders in different states for console runs
    pub fn sample() -> Self {
        Self::new([
            OrderStatus {
                order_id: "12345".into(),
                state: OrderState::InTransit,
                items: vec!["ноутбук".into()],
                total_kopecks: 5_499_000,
                paid: true,
                delivery_method: Some(DeliveryMethod::Courier),
                eta: Some("пятницу".into()),
            },
            OrderStatus {
                order_id: "777001".into(),
                state: OrderState::Created,
                items: vec!["книга".into(), "кружка".into()],
                total_kopecks: 129_000,
                paid: false,
                delivery_method: None,
                eta: None,
            },
            OrderStatus {
                order_id: "555222".into(),
                state: OrderState::ReadyForPickup,
                items: vec!["кроссовки".into()],
                total_kopecks: 799_000,
                paid: true,
                delivery_method: Some(DeliveryMethod::Pickup),
                eta: None,
            },
        ])
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_order(&self, order_id: &str) -> Result<Option<OrderStatus>, StoreError> {
        let id = order_id.trim().trim_start_matches(['№', '#']);
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(StoreError::InvalidId(order_id.to_string()));
        }
        Ok(self.orders.get(id).cloned())
    }
}
