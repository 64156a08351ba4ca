//! Speech provider traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SpeechError;

/// Short-lived bearer token for the speech provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// True when the token expires within `margin` of `now`
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        self.expires_at - margin <= now
    }
}

/// Playback request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakRequest {
    /// SSML markup
    pub markup: String,
    /// Voice name (e.g. "alena")
    pub voice: String,
    /// Locale selector (e.g. "ru-RU")
    pub locale: String,
}

/// Why the provider stopped capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfSpeech {
    /// Caller finished speaking
    Detected,
    /// Nothing was said before the silence timeout
    Silence,
    /// Hard timeout hit
    Timeout,
}

/// Listen result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenOutcome {
    pub transcript: String,
    /// Provider confidence in [0, 1]
    pub confidence: f32,
    pub end: EndOfSpeech,
}

impl ListenOutcome {
    pub fn heard(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            transcript: transcript.into(),
            confidence,
            end: EndOfSpeech::Detected,
        }
    }

    /// Empty result for a turn that timed out
    pub fn timed_out() -> Self {
        Self {
            transcript: String::new(),
            confidence: 0.0,
            end: EndOfSpeech::Timeout,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.trim().is_empty()
    }
}

/// External speech provider bound to one call
///
/// Implementations:
/// - `HttpSpeechProvider` - REST speech bridge
/// - `ConsoleSpeechProvider` - local stdin/stdout runs
/// - scripted providers in tests
#[async_trait]
pub trait SpeechProvider: Send + Sync + 'static {
    /// Play markup to the caller
    ///
    /// Returns once playback has completed.
    async fn speak(&self, token: &AccessToken, request: &SpeakRequest) -> Result<(), SpeechError>;

    /// Capture one caller turn
    ///
    /// # Arguments
    /// * `max_duration` - hard cap on capture time
    ///
    /// # Returns
    /// Transcript plus end-of-speech signal. Silence is a successful empty result.
    async fn listen(
        &self,
        token: &AccessToken,
        max_duration: Duration,
    ) -> Result<ListenOutcome, SpeechError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Signed credential exchange that yields access tokens
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<AccessToken, SpeechError>;
}
