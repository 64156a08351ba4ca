//! External collaborators of the voice support engine
//!
//! - [`ShippingClient`]: address normalization and delivery quotes with
//!   retry, over any [`CarrierApi`](voice_support_core::CarrierApi)
//! - [`HttpCarrierApi`]: the postal carrier's REST endpoints
//! - [`InMemoryOrderStore`]: read-only order lookup from fixtures
//! - [`LoggingSmsNotifier`] and [`notify_detached`]: the SMS hook

pub mod carrier_http;
pub mod orders;
pub mod shipping;
pub mod sms;

pub use carrier_http::HttpCarrierApi;
pub use orders::InMemoryOrderStore;
pub use shipping::{RetryPolicy, ShippingClient, ShippingError};
pub use sms::{notify_detached, LoggingSmsNotifier};
