//! Text processing for the voice support engine
//!
//! This crate provides:
//! - **Normalization**: transcript cleanup shared by matching and history
//! - **Pattern Library**: declarative regex rules for intents and entities
//! - **Recognizer**: per-turn analysis (best intent + all entities)
//! - **Prompt Catalog**: template rendering into speech markup, with
//!   phrasing variation and the anti-filter substitution pass
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use voice_support_core::IntentTag;
//! use voice_support_text_processing::{PatternLibrary, Recognizer};
//!
//! let mut recognizer = Recognizer::new(Arc::new(PatternLibrary::builtin()));
//! let result = recognizer.analyze("где мой заказ 12345");
//! assert_eq!(result.intent_tag(), Some(IntentTag::OrderStatus));
//! ```

pub mod anti_filter;
pub mod catalog;
pub mod normalize;
pub mod patterns;
pub mod recognizer;

mod error;

pub use anti_filter::AntiFilter;
pub use catalog::{PromptCatalog, PromptParams, RenderedPrompt};
pub use error::{Result, TextProcessingError};
pub use normalize::normalize;
pub use patterns::{MatchKind, PatternLibrary, PatternMatch, RuleSpec, ValueSource};
pub use recognizer::{analyze_with, Recognizer};
