//! Order status as read from the order store

use serde::{Deserialize, Serialize};

use crate::delivery::DeliveryMethod;

/// Fulfilment state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Created,
    Paid,
    Assembling,
    InTransit,
    ReadyForPickup,
    Delivered,
    Cancelled,
}

impl OrderState {
    /// Russian phrase for prompts
    pub fn spoken(&self) -> &'static str {
        match self {
            OrderState::Created => "оформлен и ожидает оплаты",
            OrderState::Paid => "оплачен и передан на сборку",
            OrderState::Assembling => "собирается на складе",
            OrderState::InTransit => "в пути",
            OrderState::ReadyForPickup => "ожидает вас в пункте выдачи",
            OrderState::Delivered => "доставлен",
            OrderState::Cancelled => "отменён",
        }
    }

    /// Whether the order can still be cancelled by phone
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderState::Created | OrderState::Paid | OrderState::Assembling
        )
    }
}

/// Read-only order snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub order_id: String,
    pub state: OrderState,
    #[serde(default)]
    pub items: Vec<String>,
    /// Order total in kopecks
    pub total_kopecks: u64,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub delivery_method: Option<DeliveryMethod>,
    /// Human readable ETA ("12 марта")
    #[serde(default)]
    pub eta: Option<String>,
}

impl OrderStatus {
    pub fn total_rubles(&self) -> u64 {
        self.total_kopecks.div_ceil(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_transit_phrase() {
        assert_eq!(OrderState::InTransit.spoken(), "в пути");
        assert!(!OrderState::InTransit.is_cancellable());
        assert!(OrderState::Paid.is_cancellable());
    }

    #[test]
    fn test_deserialize_minimal() {
        let order: OrderStatus = serde_json::from_str(
            r#"{"order_id":"12345","state":"in_transit","total_kopecks":199000}"#,
        )
        .unwrap();
        assert_eq!(order.state, OrderState::InTransit);
        assert!(order.items.is_empty());
        assert_eq!(order.total_rubles(), 1990);
    }
}
