//! Core traits and types for the voice support engine
//!
//! This crate provides foundational types used across all other crates:
//! - Recognition types (utterances, intents, entities)
//! - Delivery and order domain types
//! - Error types
//! - Collaborator traits for pluggable backends (speech, carrier, orders, SMS)

pub mod delivery;
pub mod error;
pub mod nlu;
pub mod order;
pub mod traits;
pub mod transcript;

pub use delivery::{
    Address, CleanAddress, DeliveryMethod, DeliveryQuote, Tariff, TariffRequest,
};
pub use error::{CarrierError, Error, NotifyError, Result, SpeechError, StoreError};
pub use nlu::{AnalysisResult, Entity, EntityKind, Intent, IntentTag, Span};
pub use order::{OrderState, OrderStatus};
pub use transcript::Utterance;

pub use traits::{
    AccessToken, CarrierApi, EndOfSpeech, ListenOutcome, OrderStore, SmsMessage, SmsNotifier,
    SpeakRequest, SpeechProvider, TokenSource,
};
