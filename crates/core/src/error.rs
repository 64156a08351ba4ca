//! Error types
//!
//! Each external collaborator gets its own error enum so callers can decide
//! retry and escalation behavior by variant. `Error` wraps them all for the
//! binary and for glue code that does not care which boundary failed.

use thiserror::Error;

/// Result alias over the umbrella error
pub type Result<T> = std::result::Result<T, Error>;

/// Umbrella error
#[derive(Error, Debug)]
pub enum Error {
    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Carrier error: {0}")]
    Carrier(#[from] CarrierError),

    #[error("Order store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Speech provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    /// Recoverable provider hiccup (connection reset, 5xx)
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Command timed out before the provider answered
    #[error("Command timed out after {0}ms")]
    Timeout(u64),

    /// Retry budget spent
    #[error("Speech provider failed after {attempts} attempts: {message}")]
    ProviderFailed { attempts: u32, message: String },

    /// Token could not be obtained or was refused
    #[error("Authorization failed: {0}")]
    Auth(String),

    /// Invoker ordering violated
    #[error("Command out of order: {0}")]
    OutOfOrder(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl SpeechError {
    /// Whether the Invoker may retry the command
    pub fn is_retryable(&self) -> bool {
        matches!(self, SpeechError::Transient(_) | SpeechError::Timeout(_))
    }
}

/// Carrier API errors (address cleanup and tariff lookup)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CarrierError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Carrier request timed out")]
    Timeout,

    #[error("Carrier rate limit hit")]
    RateLimited,

    #[error("Carrier server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Carrier rejected request {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid carrier response: {0}")]
    InvalidResponse(String),
}

impl CarrierError {
    /// 429, 5xx, timeouts and transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CarrierError::Network(_)
                | CarrierError::Timeout
                | CarrierError::RateLimited
                | CarrierError::Server { .. }
        )
    }
}

/// Order store errors. A missing order is not an error, it is `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid order id: {0}")]
    InvalidId(String),
}

/// SMS notification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("SMS notifications disabled")]
    Disabled,

    #[error("SMS delivery failed: {0}")]
    Delivery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_retryable() {
        assert!(SpeechError::Transient("reset".into()).is_retryable());
        assert!(SpeechError::Timeout(500).is_retryable());
        assert!(!SpeechError::Auth("expired".into()).is_retryable());
        assert!(!SpeechError::ProviderFailed {
            attempts: 2,
            message: "down".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_carrier_retryable() {
        assert!(CarrierError::RateLimited.is_retryable());
        assert!(CarrierError::Server {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
        assert!(!CarrierError::Rejected {
            status: 400,
            message: "bad index".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_umbrella_from() {
        let err: Error = SpeechError::Auth("denied".into()).into();
        assert!(matches!(err, Error::Speech(SpeechError::Auth(_))));
        assert!(err.to_string().contains("denied"));
    }
}
