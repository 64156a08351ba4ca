//! Speech gateway
//!
//! Command-pattern wrapper around the external speech provider:
//! - [`Speak`] / [`Listen`] commands, each with its own timeout
//! - [`Invoker`] enforcing turn ordering and bounded retry
//! - [`TokenManager`] caching provider tokens, [`SignedTokenSource`]
//!   exchanging signed assertions for them
//! - [`HttpSpeechProvider`] for the REST speech bridge

pub mod command;
pub mod http_provider;
pub mod invoker;
pub mod token;

pub use command::{CommandKind, Listen, Speak, SpeechCommand};
pub use http_provider::HttpSpeechProvider;
pub use invoker::{Invoker, InvokerConfig, TurnPhase};
pub use token::{SignedTokenSource, TokenManager};
