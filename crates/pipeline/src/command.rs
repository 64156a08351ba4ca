//! Speech commands
//!
//! `Speak` and `Listen` each wrap one provider call with its own timeout.
//! They carry no retry or ordering logic; the [`Invoker`](crate::Invoker)
//! owns both.

use async_trait::async_trait;
use std::time::Duration;
use voice_support_core::{AccessToken, ListenOutcome, SpeakRequest, SpeechError, SpeechProvider};

/// Command discriminator used for ordering checks and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Speak,
    Listen,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Speak => "speak",
            Self::Listen => "listen",
        }
    }
}

/// One provider call
#[async_trait]
pub trait SpeechCommand: Send + Sync {
    type Output: Send;

    fn kind(&self) -> CommandKind;

    async fn execute(
        &self,
        provider: &dyn SpeechProvider,
        token: &AccessToken,
    ) -> Result<Self::Output, SpeechError>;
}

/// Play markup; completes when playback has finished
#[derive(Debug, Clone)]
pub struct Speak {
    pub request: SpeakRequest,
    pub timeout: Duration,
}

#[async_trait]
impl SpeechCommand for Speak {
    type Output = ();

    fn kind(&self) -> CommandKind {
        CommandKind::Speak
    }

    async fn execute(&self, provider: &dyn SpeechProvider, token: &AccessToken) -> Result<(), SpeechError> {
        match tokio::time::timeout(self.timeout, provider.speak(token, &self.request)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(SpeechError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

/// Capture one caller turn
///
/// Running out of time is not an error: the turn simply produced no
/// transcript, which the dialogue treats like silence.
#[derive(Debug, Clone)]
pub struct Listen {
    pub max_duration: Duration,
    /// Extra time the provider gets to return after `max_duration`
    pub grace: Duration,
}

#[async_trait]
impl SpeechCommand for Listen {
    type Output = ListenOutcome;

    fn kind(&self) -> CommandKind {
        CommandKind::Listen
    }

    async fn execute(
        &self,
        provider: &dyn SpeechProvider,
        token: &AccessToken,
    ) -> Result<ListenOutcome, SpeechError> {
        let deadline = self.max_duration + self.grace;
        match tokio::time::timeout(deadline, provider.listen(token, self.max_duration)).await {
            Ok(Err(SpeechError::Timeout(ms))) => {
                tracing::debug!(timeout_ms = ms, "Provider reported listen timeout");
                Ok(ListenOutcome::timed_out())
            }
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::debug!(timeout_ms = deadline.as_millis() as u64, "Listen timed out");
                Ok(ListenOutcome::timed_out())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use voice_support_core::EndOfSpeech;

    struct SlowProvider;

    #[async_trait]
    impl SpeechProvider for SlowProvider {
        async fn speak(&self, _: &AccessToken, _: &SpeakRequest) -> Result<(), SpeechError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn listen(&self, _: &AccessToken, _: Duration) -> Result<ListenOutcome, SpeechError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ListenOutcome::heard("поздно", 1.0))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn token() -> AccessToken {
        AccessToken {
            value: "t".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_speak_timeout_is_error() {
        let cmd = Speak {
            request: SpeakRequest {
                markup: "<speak>x</speak>".into(),
                voice: "alena".into(),
                locale: "ru-RU".into(),
            },
            timeout: Duration::from_millis(500),
        };
        let err = cmd.execute(&SlowProvider, &token()).await.unwrap_err();
        assert_eq!(err, SpeechError::Timeout(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_timeout_is_empty_turn() {
        let cmd = Listen {
            max_duration: Duration::from_secs(2),
            grace: Duration::from_millis(100),
        };
        let outcome = cmd.execute(&SlowProvider, &token()).await.unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.end, EndOfSpeech::Timeout);
    }
}
