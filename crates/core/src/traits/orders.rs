//! Order store

use async_trait::async_trait;

use crate::error::StoreError;
use crate::order::OrderStatus;

/// Read-only order lookup
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// `Ok(None)` when no such order exists
    async fn get_order(&self, order_id: &str) -> Result<Option<OrderStatus>, StoreError>;
}
