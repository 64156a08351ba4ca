//! Invoker
//!
//! Single entry point for speech commands within one session. It enforces
//! turn ordering (speak before listen, never speak after the caller was
//! heard in the same turn), attaches a fresh token to each attempt and
//! retries transient failures a bounded number of times.

use std::sync::Arc;
use std::time::Duration;

use voice_support_config::SpeechConfig;
use voice_support_core::{ListenOutcome, SpeakRequest, SpeechError, SpeechProvider};

use crate::command::{CommandKind, Listen, Speak, SpeechCommand};
use crate::token::TokenManager;

/// Where the current turn is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Nothing issued yet
    Idle,
    /// At least one prompt played
    Speaking,
    /// Caller was heard; the turn is closed
    Listened,
}

/// Invoker tuning
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    pub voice: String,
    pub locale: String,
    pub speak_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub listen_grace: Duration,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self::from(&SpeechConfig::default())
    }
}

impl From<&SpeechConfig> for InvokerConfig {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            voice: config.voice.clone(),
            locale: config.locale.clone(),
            speak_timeout: Duration::from_millis(config.speak_timeout_ms),
            max_retries: config.max_retries.min(1),
            retry_backoff: Duration::from_millis(100),
            listen_grace: Duration::from_millis(500),
        }
    }
}

/// Per-session command invoker
pub struct Invoker {
    provider: Arc<dyn SpeechProvider>,
    tokens: Arc<TokenManager>,
    config: InvokerConfig,
    phase: TurnPhase,
}

impl Invoker {
    pub fn new(provider: Arc<dyn SpeechProvider>, tokens: Arc<TokenManager>, config: InvokerConfig) -> Self {
        Self {
            provider,
            tokens,
            config,
            phase: TurnPhase::Idle,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Open a new turn
    pub fn begin_turn(&mut self) {
        self.phase = TurnPhase::Idle;
    }

    /// Play markup to the caller
    pub async fn speak(&mut self, markup: &str) -> Result<(), SpeechError> {
        self.check_order(CommandKind::Speak)?;

        let command = Speak {
            request: SpeakRequest {
                markup: markup.to_string(),
                voice: self.config.voice.clone(),
                locale: self.config.locale.clone(),
            },
            timeout: self.config.speak_timeout,
        };
        self.invoke(&command).await?;
        self.phase = TurnPhase::Speaking;
        Ok(())
    }

    /// Capture the caller's answer; closes the turn
    pub async fn listen(&mut self, max_duration: Duration) -> Result<ListenOutcome, SpeechError> {
        self.check_order(CommandKind::Listen)?;

        let command = Listen {
            max_duration,
            grace: self.config.listen_grace,
        };
        let outcome = self.invoke(&command).await?;
        self.phase = TurnPhase::Listened;
        Ok(outcome)
    }

    fn check_order(&self, next: CommandKind) -> Result<(), SpeechError> {
        if self.phase == TurnPhase::Listened {
            return Err(SpeechError::OutOfOrder(format!(
                "{} issued after listen in the same turn",
                next.as_str()
            )));
        }
        Ok(())
    }

    /// Run a command with bounded retry
    async fn invoke<C: SpeechCommand>(&self, command: &C) -> Result<C::Output, SpeechError> {
        let mut last_error = None;
        let mut backoff = self.config.retry_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    command = command.kind().as_str(),
                    provider = self.provider.name(),
                    attempt,
                    "Speech command failed, retrying in {:?}",
                    backoff
                );
                metrics::counter!("voice_support_speech_retries_total").increment(1);
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            // Auth failures are fatal and never retried
            let token = self.tokens.token().await?;

            match command.execute(self.provider.as_ref(), &token).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e @ SpeechError::Auth(_)) => {
                    // The token is shared; the next session must not reuse a refused one
                    tracing::warn!(
                        command = command.kind().as_str(),
                        provider = self.provider.name(),
                        error = %e,
                        "Provider refused the token"
                    );
                    self.tokens.invalidate().await;
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        let attempts = self.config.max_retries + 1;
        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        tracing::error!(
            command = command.kind().as_str(),
            provider = self.provider.name(),
            attempts,
            %message,
            "Speech command failed"
        );
        Err(SpeechError::ProviderFailed { attempts, message })
    }
}
