//! Postal carrier transport

use async_trait::async_trait;

use crate::delivery::{CleanAddress, Tariff, TariffRequest};
use crate::error::CarrierError;

/// Raw carrier operations, one HTTP round trip each
///
/// Retry and idempotence live in the Shipping Client above this trait.
#[async_trait]
pub trait CarrierApi: Send + Sync + 'static {
    /// Address cleanup. `Ok(None)` means the carrier could not recognize the address.
    async fn clean_address(&self, free_text: &str) -> Result<Option<CleanAddress>, CarrierError>;

    /// Tariff lookup for a structured address
    async fn tariff(&self, request: &TariffRequest) -> Result<Tariff, CarrierError>;
}
