//! Configuration management for the voice support engine
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (VOICE_SUPPORT__ prefix)
//!
//! Prompt phrasings live in [`prompts`]; they ship built in and can be
//! overridden per deployment from a YAML file.

pub mod constants;
pub mod prompts;
pub mod settings;

pub use prompts::{keys as prompt_keys, PromptTemplates};
pub use settings::{
    load_settings, load_settings_from, CarrierConfig, ObservabilityConfig, OrdersConfig,
    PromptSettings, RuntimeEnvironment, SessionConfig, Settings, SmsConfig, SpeechConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
