//! Shipping Client
//!
//! Address normalization and delivery quoting on top of a [`CarrierApi`].
//!
//! - `normalize_address` is idempotent: results are cached under both the
//!   caller's text and the canonical text, so normalizing the canonical form
//!   of a normalized address returns that same address.
//! - The cache is bounded. Entries expire after the configured TTL and the
//!   oldest insertion is evicted once capacity is reached.
//! - `quote` refuses non-normalized addresses before any network call.
//! - Retryable carrier failures (429, 5xx, timeouts) are retried with
//!   exponential backoff up to `max_attempts` in total.

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use voice_support_config::CarrierConfig;
use voice_support_core::{Address, CarrierApi, CarrierError, DeliveryMethod, DeliveryQuote, TariffRequest};

/// Shipping Client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShippingError {
    /// Caller asked for a quote on an address the carrier never confirmed
    #[error("Address is not normalized")]
    NotNormalized,

    #[error("Carrier could not recognize the address")]
    AddressNotFound,

    /// Retry budget spent on transient failures
    #[error("Carrier unavailable after {attempts} attempts: {message}")]
    Unavailable { attempts: u32, message: String },

    /// Non-retryable carrier answer
    #[error("Carrier rejected the request: {0}")]
    Rejected(String),
}

impl From<CarrierError> for ShippingError {
    fn from(err: CarrierError) -> Self {
        ShippingError::Rejected(err.to_string())
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts including the first call
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&CarrierConfig::default())
    }
}

impl From<&CarrierConfig> for RetryPolicy {
    fn from(config: &CarrierConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.clamp(1, 3),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

struct CachedAddress {
    address: Address,
    stored_at: Instant,
    seq: u64,
}

/// Shared, concurrency-safe carrier client
pub struct ShippingClient {
    api: Arc<dyn CarrierApi>,
    policy: RetryPolicy,
    origin_postcode: String,
    parcel_grams: u32,
    cache: DashMap<String, CachedAddress>,
    cache_capacity: usize,
    cache_ttl: Duration,
    next_seq: AtomicU64,
}

impl ShippingClient {
    pub fn new(api: Arc<dyn CarrierApi>, config: &CarrierConfig) -> Self {
        Self {
            api,
            policy: RetryPolicy::from(config),
            origin_postcode: config.origin_postcode.clone(),
            parcel_grams: config.default_parcel_grams,
            cache: DashMap::new(),
            cache_capacity: config.address_cache_capacity.max(1),
            cache_ttl: Duration::from_secs(config.address_cache_ttl_secs),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cache_limits(mut self, capacity: usize, ttl: Duration) -> Self {
        self.cache_capacity = capacity.max(1);
        self.cache_ttl = ttl;
        self
    }

    /// Free text to a normalized address
    pub async fn normalize_address(&self, free_text: &str) -> Result<Address, ShippingError> {
        let key = cache_key(free_text);
        if key.is_empty() {
            return Err(ShippingError::AddressNotFound);
        }
        if let Some(hit) = self.cached(&key) {
            tracing::debug!(address = %hit.line, "Address normalization cache hit");
            return Ok(hit);
        }

        let cleaned = self
            .with_retry("clean_address", || self.api.clean_address(free_text))
            .await?;

        let Some(cleaned) = cleaned else {
            tracing::info!(input = %free_text, "Carrier could not normalize address");
            return Err(ShippingError::AddressNotFound);
        };

        let address = cleaned.into_address();
        tracing::info!(address = %address.line, "Address normalized");

        self.remember(cache_key(&address.text()), &address);
        self.remember(key, &address);
        Ok(address)
    }

    /// Delivery cost and time for a normalized address
    pub async fn quote(&self, address: &Address, method: DeliveryMethod) -> Result<DeliveryQuote, ShippingError> {
        if !address.normalized {
            return Err(ShippingError::NotNormalized);
        }
        let Some(postcode) = address.postcode.clone() else {
            return Err(ShippingError::NotNormalized);
        };

        let request = TariffRequest {
            from_postcode: self.origin_postcode.clone(),
            to_postcode: postcode,
            method,
            mass_grams: self.parcel_grams,
        };
        let tariff = self.with_retry("tariff", || self.api.tariff(&request)).await?;

        tracing::info!(
            method = method.as_str(),
            cost_kopecks = tariff.total_kopecks,
            min_days = tariff.min_days,
            max_days = tariff.max_days,
            "Delivery quoted"
        );

        Ok(DeliveryQuote {
            method,
            cost_kopecks: tariff.total_kopecks,
            min_days: tariff.min_days,
            max_days: tariff.max_days,
            address_text: address.text(),
        })
    }

    /// Cached normalizations (input and canonical keys both count)
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, key: &str) -> Option<Address> {
        {
            let entry = self.cache.get(key)?;
            if entry.stored_at.elapsed() < self.cache_ttl {
                return Some(entry.address.clone());
            }
        }
        // shard guard released above; removing under it would deadlock
        self.cache.remove(key);
        None
    }

    fn remember(&self, key: String, address: &Address) {
        if !self.cache.contains_key(&key) && self.cache.len() >= self.cache_capacity {
            self.cache.retain(|_, entry| entry.stored_at.elapsed() < self.cache_ttl);
            if self.cache.len() >= self.cache_capacity {
                let oldest = self
                    .cache
                    .iter()
                    .min_by_key(|entry| entry.seq)
                    .map(|entry| entry.key().clone());
                if let Some(oldest) = oldest {
                    tracing::debug!(key = %oldest, "Evicting oldest cached address");
                    self.cache.remove(&oldest);
                }
            }
        }
        self.cache.insert(
            key,
            CachedAddress {
                address: address.clone(),
                stored_at: Instant::now(),
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            },
        );
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, ShippingError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CarrierError>>,
    {
        let mut last_error = None;
        let mut backoff = self.policy.initial_backoff;

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    "Carrier call failed, retrying in {:?}",
                    backoff
                );
                metrics::counter!("voice_support_carrier_retries_total").increment(1);
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => {
                    tracing::warn!(operation, error = %e, "Carrier call rejected");
                    return Err(e.into());
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        tracing::error!(operation, attempts = self.policy.max_attempts, %message, "Carrier unavailable");
        Err(ShippingError::Unavailable {
            attempts: self.policy.max_attempts,
            message,
        })
    }
}

/// Case and whitespace insensitive key
fn cache_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace('ё', "е")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use voice_support_core::{CleanAddress, Tariff};

    /// Carrier double: knows addresses mentioning "мясницкая", scripted failures
    #[derive(Default)]
    struct FakeCarrier {
        clean_calls: AtomicU32,
        tariff_calls: AtomicU32,
        failures: Mutex<VecDeque<CarrierError>>,
    }

    impl FakeCarrier {
        fn fail_next(&self, errors: impl IntoIterator<Item = CarrierError>) {
            self.failures.lock().extend(errors);
        }
    }

    #[async_trait]
    impl CarrierApi for FakeCarrier {
        async fn clean_address(&self, free_text: &str) -> Result<Option<CleanAddress>, CarrierError> {
            self.clean_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = self.failures.lock().pop_front() {
                return Err(e);
            }
            if !free_text.to_lowercase().contains("мясницкая") {
                return Ok(None);
            }
            Ok(Some(CleanAddress {
                postcode: "101000".into(),
                region: Some("Москва".into()),
                place: Some("Москва".into()),
                street: Some("Мясницкая".into()),
                house: Some("1".into()),
                room: None,
            }))
        }

        async fn tariff(&self, request: &TariffRequest) -> Result<Tariff, CarrierError> {
            self.tariff_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = self.failures.lock().pop_front() {
                return Err(e);
            }
            let base = match request.method {
                DeliveryMethod::Express => 90_000,
                _ => 35_000,
            };
            Ok(Tariff {
                total_kopecks: base,
                min_days: 2,
                max_days: 4,
            })
        }
    }

    fn client(api: Arc<FakeCarrier>) -> ShippingClient {
        ShippingClient::new(api, &CarrierConfig::default()).with_policy(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        })
    }

    #[tokio::test]
    async fn test_normalize_idempotent() {
        let api = Arc::new(FakeCarrier::default());
        let shipping = client(api.clone());

        let first = shipping.normalize_address("москва мясницкая 1").await.unwrap();
        assert!(first.normalized);
        let second = shipping.normalize_address(&first.text()).await.unwrap();
        assert_eq!(first, second);
        // canonical text answered from cache
        assert_eq!(api.clean_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found() {
        let shipping = client(Arc::new(FakeCarrier::default()));
        assert_eq!(
            shipping.normalize_address("где-то там").await,
            Err(ShippingError::AddressNotFound)
        );
        assert_eq!(shipping.normalize_address("   ").await, Err(ShippingError::AddressNotFound));
    }

    #[tokio::test]
    async fn test_quote_rejects_unnormalized_without_network() {
        let api = Arc::new(FakeCarrier::default());
        let shipping = client(api.clone());

        let raw = Address::from_free_text("москва мясницкая 1");
        assert_eq!(
            shipping.quote(&raw, DeliveryMethod::Courier).await,
            Err(ShippingError::NotNormalized)
        );
        assert_eq!(api.tariff_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_quote_for_normalized() {
        let shipping = client(Arc::new(FakeCarrier::default()));
        let address = shipping.normalize_address("Москва, Мясницкая 1").await.unwrap();

        let quote = shipping.quote(&address, DeliveryMethod::Express).await.unwrap();
        assert_eq!(quote.cost_rubles(), 900);
        assert!(quote.is_for(&address, DeliveryMethod::Express));
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let api = Arc::new(FakeCarrier::default());
        api.fail_next([CarrierError::RateLimited, CarrierError::Timeout]);
        let shipping = client(api.clone());

        assert!(shipping.normalize_address("мясницкая 1").await.is_ok());
        assert_eq!(api.clean_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion() {
        let api = Arc::new(FakeCarrier::default());
        api.fail_next((0..3).map(|_| CarrierError::Server {
            status: 503,
            message: "maintenance".into(),
        }));
        let shipping = client(api.clone());

        let err = shipping.normalize_address("мясницкая 1").await.unwrap_err();
        assert!(matches!(err, ShippingError::Unavailable { attempts: 3, .. }));
        assert_eq!(api.clean_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let api = Arc::new(FakeCarrier::default());
        api.fail_next([CarrierError::Rejected {
            status: 400,
            message: "bad request".into(),
        }]);
        let shipping = client(api.clone());

        assert!(matches!(
            shipping.normalize_address("мясницкая 1").await,
            Err(ShippingError::Rejected(_))
        ));
        assert_eq!(api.clean_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_evicts_oldest_at_capacity() {
        let api = Arc::new(FakeCarrier::default());
        let shipping = client(api.clone()).with_cache_limits(2, Duration::from_secs(60));

        // canonical key and input key fill the cache
        shipping.normalize_address("мясницкая 1").await.unwrap();
        assert_eq!(shipping.cached_len(), 2);

        // the canonical key is refreshed, the first input key goes
        shipping.normalize_address("москва мясницкая 1").await.unwrap();
        assert_eq!(shipping.cached_len(), 2);
        assert_eq!(api.clean_calls.load(Ordering::SeqCst), 2);

        shipping.normalize_address("мясницкая 1").await.unwrap();
        assert_eq!(api.clean_calls.load(Ordering::SeqCst), 3);
        assert_eq!(shipping.cached_len(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_requeried() {
        let api = Arc::new(FakeCarrier::default());
        let shipping = client(api.clone()).with_cache_limits(16, Duration::ZERO);

        shipping.normalize_address("мясницкая 1").await.unwrap();
        shipping.normalize_address("мясницкая 1").await.unwrap();
        assert_eq!(api.clean_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("  Москва   Мясницкая "), "москва мясницкая");
    }
}
