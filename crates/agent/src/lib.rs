//! Dialogue engine
//!
//! Features:
//! - Topic state machine (greeting, order, shipping, payment, escalation)
//! - Prompt stack: rendered prompts and transcripts in one append-only history
//! - Session context: the bounded per-call turn loop with turn and time guards
//! - Session dispatcher: one task per call over shared, read-only resources

pub mod context;
pub mod dispatcher;
pub mod guards;
pub mod prompt_stack;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use context::{HandoffContext, SessionContext, SessionReport};
pub use dispatcher::{SessionDispatcher, SharedResources};
pub use guards::{GuardTrip, SessionGuards};
pub use prompt_stack::{HistoryEntry, PromptStack};
pub use session::{Awaiting, Ending, EscalationReason, Session, SlotData};
pub use state::{
    DialogueLimits, PromptPlan, PromptStep, StateServices, StateTag, TransitionDecision,
};

use thiserror::Error;
use voice_support_config::ConfigError;
use voice_support_core::SpeechError;
use voice_support_text_processing::TextProcessingError;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] TextProcessingError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Session dispatcher is closed")]
    DispatcherClosed,

    #[error("Session task failed: {0}")]
    Task(String),
}

impl From<ConfigError> for AgentError {
    fn from(err: ConfigError) -> Self {
        AgentError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: AgentError = SpeechError::Auth("expired".into()).into();
        assert!(matches!(err, AgentError::Speech(SpeechError::Auth(_))));

        let err: AgentError = TextProcessingError::UnknownTemplate("nope".into()).into();
        assert!(err.to_string().contains("nope"));
    }
}
