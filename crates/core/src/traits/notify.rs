//! Outbound SMS hook

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

/// Text message to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub to: String,
    pub text: String,
}

/// Best-effort notifier. Callers send once and never retry.
#[async_trait]
pub trait SmsNotifier: Send + Sync + 'static {
    async fn send(&self, message: &SmsMessage) -> Result<(), NotifyError>;

    fn name(&self) -> &str;
}
