//! SMS hook
//!
//! Fire-and-forget: the dialogue loop hands a message to
//! [`notify_detached`] and moves on. One attempt, failures only logged.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use voice_support_config::SmsConfig;
use voice_support_core::{NotifyError, SmsMessage, SmsNotifier};

/// Notifier that writes messages to the log instead of a gateway
pub struct LoggingSmsNotifier {
    sender: String,
    enabled: bool,
}

impl LoggingSmsNotifier {
    pub fn new(config: &SmsConfig) -> Self {
        Self {
            sender: config.sender.clone(),
            enabled: config.enabled,
        }
    }
}

#[async_trait]
impl SmsNotifier for LoggingSmsNotifier {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError> {
        if !self.enabled {
            return Err(NotifyError::Disabled);
        }
        tracing::info!(
            sender = %self.sender,
            to = %message.to,
            text = %message.text,
            "SMS sent"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Send on a detached task; never blocks the caller and never retries
pub fn notify_detached(notifier: Arc<dyn SmsNotifier>, message: SmsMessage) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.send(&message).await {
            Ok(()) => tracing::debug!(notifier = notifier.name(), to = %message.to, "SMS dispatched"),
            Err(NotifyError::Disabled) => {
                tracing::debug!(to = %message.to, "SMS disabled, message dropped")
            }
            Err(e) => tracing::warn!(notifier = notifier.name(), error = %e, "SMS delivery failed"),
        }
    })
}
