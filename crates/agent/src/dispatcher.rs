//! Session dispatcher
//!
//! Accepts new calls and runs each one on its own task. Every session gets
//! its own context; the rule tables, prompt catalog and service clients are
//! built once and shared read-only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use voice_support_config::{SessionConfig, Settings};
use voice_support_core::{CarrierApi, OrderStore, SmsNotifier, SpeechProvider, TokenSource};
use voice_support_pipeline::{InvokerConfig, TokenManager};
use voice_support_text_processing::{PatternLibrary, PromptCatalog};
use voice_support_tools::{InMemoryOrderStore, LoggingSmsNotifier, ShippingClient};

use crate::context::{SessionContext, SessionReport};
use crate::state::{DialogueLimits, StateServices};
use crate::AgentError;

/// Immutable bundle shared by every session of the process
#[derive(Clone)]
pub struct SharedResources {
    pub patterns: Arc<PatternLibrary>,
    pub catalog: Arc<PromptCatalog>,
    pub shipping: Arc<ShippingClient>,
    pub orders: Arc<dyn OrderStore>,
    pub sms: Arc<dyn SmsNotifier>,
    pub tokens: Arc<TokenManager>,
    pub session: SessionConfig,
    pub invoker: InvokerConfig,
}

impl SharedResources {
    /// Build everything from settings; the speech token source and the
    /// carrier transport are supplied by the caller
    pub fn from_settings(
        settings: &Settings,
        tokens: Arc<dyn TokenSource>,
        carrier: Arc<dyn CarrierApi>,
    ) -> Result<Self, AgentError> {
        let catalog = PromptCatalog::from_settings(&settings.prompts)?;
        let orders = InMemoryOrderStore::from_config(&settings.orders)
            .map_err(|e| AgentError::Initialization(format!("order fixtures: {}", e)))?;
        let patterns = PatternLibrary::builtin();

        tracing::info!(
            rules = patterns.len(),
            orders = orders.len(),
            sms_enabled = settings.sms.enabled,
            "Shared resources ready"
        );

        Ok(Self {
            patterns: Arc::new(patterns),
            catalog: Arc::new(catalog),
            shipping: Arc::new(ShippingClient::new(carrier, &settings.carrier)),
            orders: Arc::new(orders),
            sms: Arc::new(LoggingSmsNotifier::new(&settings.sms)),
            tokens: Arc::new(TokenManager::new(
                tokens,
                Duration::from_secs(settings.speech.token_refresh_margin_secs),
            )),
            session: settings.session.clone(),
            invoker: InvokerConfig::from(&settings.speech),
        })
    }

    pub fn services(&self) -> StateServices {
        StateServices {
            orders: self.orders.clone(),
            shipping: self.shipping.clone(),
            sms: self.sms.clone(),
            catalog: self.catalog.clone(),
            limits: DialogueLimits::from(&self.session),
        }
    }
}

/// Counts a running session until dropped, also when its task is aborted
struct ActiveSession {
    active: Arc<AtomicUsize>,
}

impl ActiveSession {
    fn enter(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        metrics::gauge!("voice_support_active_sessions").increment(1.0);
        Self { active }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!("voice_support_active_sessions").decrement(1.0);
    }
}

/// Runs calls concurrently, at most `max_concurrent_sessions` at a time
pub struct SessionDispatcher {
    resources: Arc<SharedResources>,
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
}

impl SessionDispatcher {
    pub fn new(resources: SharedResources) -> Self {
        let limit = resources.session.max_concurrent_sessions.max(1);
        Self {
            resources: Arc::new(resources),
            permits: Arc::new(Semaphore::new(limit)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn resources(&self) -> &SharedResources {
        &self.resources
    }

    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Sessions currently in a call
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop accepting calls; sessions already running finish normally
    pub fn close(&self) {
        self.permits.close();
    }

    /// Start a call on its own task; waits for a free slot first
    pub fn spawn(
        &self,
        caller: impl Into<String>,
        provider: Arc<dyn SpeechProvider>,
    ) -> JoinHandle<Result<SessionReport, AgentError>> {
        let resources = self.resources.clone();
        let permits = self.permits.clone();
        let active = self.active.clone();
        let caller = caller.into();

        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| AgentError::DispatcherClosed)?;

            let _active = ActiveSession::enter(active);
            Ok(SessionContext::new(caller, &resources, provider).run().await)
        })
    }

    /// Run a call and wait for its report
    pub async fn run(
        &self,
        caller: impl Into<String>,
        provider: Arc<dyn SpeechProvider>,
    ) -> Result<SessionReport, AgentError> {
        self.spawn(caller, provider)
            .await
            .map_err(|e| AgentError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Ending;
    use crate::testing::{resources, ScriptedSpeech};
    use async_trait::async_trait;
    use voice_support_core::{AccessToken, ListenOutcome, SpeakRequest, SpeechError};

    /// Caller that never answers
    struct SilentLine;

    #[async_trait]
    impl SpeechProvider for SilentLine {
        async fn speak(&self, _: &AccessToken, _: &SpeakRequest) -> Result<(), SpeechError> {
            Ok(())
        }

        async fn listen(&self, _: &AccessToken, _: Duration) -> Result<ListenOutcome, SpeechError> {
            std::future::pending().await
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    #[tokio::test]
    async fn test_aborted_session_leaves_active_count() {
        let dispatcher = SessionDispatcher::new(resources());
        let handle = dispatcher.spawn("+79990000003", Arc::new(SilentLine));

        while dispatcher.active_sessions() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        assert_eq!(dispatcher.active_sessions(), 0);
        assert_eq!(dispatcher.available_slots(), 64);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_are_isolated() {
        let dispatcher = SessionDispatcher::new(resources());

        let order = ScriptedSpeech::new([
            ListenOutcome::heard("где мой заказ 12345", 0.9),
            ListenOutcome::heard("до свидания", 0.9),
        ]);
        let payment = ScriptedSpeech::new([
            ListenOutcome::heard("как можно оплатить", 0.9),
            ListenOutcome::heard("до свидания", 0.9),
        ]);

        let first = dispatcher.spawn("+79990000001", order);
        let second = dispatcher.spawn("+79990000002", payment);
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(first.outcome, Ending::Goodbye);
        assert_eq!(first.slots.order_id.as_deref(), Some("12345"));
        assert_eq!(second.slots.order_id, None);
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(dispatcher.available_slots(), 64);
    }

    #[tokio::test]
    async fn test_closed_dispatcher_rejects_calls() {
        let dispatcher = SessionDispatcher::new(resources());
        dispatcher.close();
        let result = dispatcher
            .run("c", ScriptedSpeech::new(Vec::<ListenOutcome>::new()))
            .await;
        assert!(matches!(result, Err(AgentError::DispatcherClosed)));
    }
}
