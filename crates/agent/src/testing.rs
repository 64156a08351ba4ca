//! Scripted collaborators for unit tests

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use voice_support_config::{CarrierConfig, SessionConfig};
use voice_support_core::{
    AccessToken, AnalysisResult, CarrierApi, CarrierError, CleanAddress, ListenOutcome,
    NotifyError, SmsMessage, SmsNotifier, SpeakRequest, SpeechError, SpeechProvider, Tariff,
    TariffRequest, TokenSource,
};
use voice_support_pipeline::{Invoker, InvokerConfig, TokenManager};
use voice_support_text_processing::{analyze_with, normalize, PatternLibrary, PromptCatalog};
use voice_support_tools::{InMemoryOrderStore, RetryPolicy, ShippingClient};

use crate::dispatcher::SharedResources;
use crate::state::{DialogueLimits, StateServices};

static LIBRARY: Lazy<PatternLibrary> = Lazy::new(PatternLibrary::builtin);

/// Analyze a transcript with the built-in rules
pub fn heard(text: &str) -> AnalysisResult {
    analyze_with(&LIBRARY, normalize::utterance(text))
}

/// Speech provider that records prompts and replays scripted answers
pub struct ScriptedSpeech {
    spoken: Mutex<Vec<String>>,
    replies: Mutex<VecDeque<Result<ListenOutcome, SpeechError>>>,
}

impl ScriptedSpeech {
    pub fn new(replies: impl IntoIterator<Item = ListenOutcome>) -> Arc<Self> {
        Self::with_results(replies.into_iter().map(Ok))
    }

    pub fn with_results(
        replies: impl IntoIterator<Item = Result<ListenOutcome, SpeechError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            spoken: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into_iter().collect()),
        })
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

#[async_trait]
impl SpeechProvider for ScriptedSpeech {
    async fn speak(&self, _: &AccessToken, request: &SpeakRequest) -> Result<(), SpeechError> {
        self.spoken.lock().push(request.markup.clone());
        Ok(())
    }

    async fn listen(&self, _: &AccessToken, _: Duration) -> Result<ListenOutcome, SpeechError> {
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ListenOutcome::heard("до свидания", 1.0)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct FixedTokens;

#[async_trait]
impl TokenSource for FixedTokens {
    async fn fetch(&self) -> Result<AccessToken, SpeechError> {
        Ok(AccessToken {
            value: "test-token".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }
}

pub fn tokens() -> Arc<TokenManager> {
    Arc::new(TokenManager::new(Arc::new(FixedTokens), Duration::from_secs(60)))
}

pub fn invoker(speech: Arc<ScriptedSpeech>) -> Invoker {
    Invoker::new(
        speech,
        tokens(),
        InvokerConfig {
            retry_backoff: Duration::from_millis(1),
            ..InvokerConfig::default()
        },
    )
}

/// Carrier that knows addresses on Мясницкая
#[derive(Default)]
pub struct FakeCarrier {
    pub down: AtomicBool,
    pub clean_calls: AtomicU32,
    pub tariff_calls: AtomicU32,
}

#[async_trait]
impl CarrierApi for FakeCarrier {
    async fn clean_address(&self, free_text: &str) -> Result<Option<CleanAddress>, CarrierError> {
        self.clean_calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(CarrierError::RateLimited);
        }
        if !free_text.to_lowercase().contains("мясницк") {
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
        if self.down.load(Ordering::SeqCst) {
            return Err(CarrierError::Timeout);
        }
        let total_kopecks = match request.method {
            voice_support_core::DeliveryMethod::Express => 90_000,
            _ => 35_000,
        };
        Ok(Tariff {
            total_kopecks,
            min_days: 2,
            max_days: 4,
        })
    }
}

#[derive(Default)]
pub struct RecordingSms {
    pub sent: Mutex<Vec<SmsMessage>>,
}

#[async_trait]
impl SmsNotifier for RecordingSms {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn services_with(carrier: Arc<FakeCarrier>, sms: Arc<RecordingSms>) -> StateServices {
    let shipping = ShippingClient::new(carrier, &CarrierConfig::default()).with_policy(RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
    });
    StateServices {
        orders: Arc::new(InMemoryOrderStore::sample()),
        shipping: Arc::new(shipping),
        sms,
        catalog: Arc::new(PromptCatalog::builtin()),
        limits: DialogueLimits::from(&SessionConfig::default()),
    }
}

pub fn services() -> StateServices {
    services_with(Arc::new(FakeCarrier::default()), Arc::new(RecordingSms::default()))
}

/// Shared resources over the doubles, with a fixed prompt seed
pub fn resources() -> SharedResources {
    let services = services();
    SharedResources {
        patterns: Arc::new(PatternLibrary::builtin()),
        catalog: services.catalog,
        shipping: services.shipping,
        orders: services.orders,
        sms: services.sms,
        tokens: tokens(),
        session: SessionConfig {
            prompt_seed: Some(42),
            ..SessionConfig::default()
        },
        invoker: InvokerConfig {
            retry_backoff: Duration::from_millis(1),
            ..InvokerConfig::default()
        },
    }
}
