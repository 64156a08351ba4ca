//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{carrier, endpoints, session, speech};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Per-call guards and dialogue limits
    #[serde(default)]
    pub session: SessionConfig,

    /// Speech provider
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Postal carrier
    #[serde(default)]
    pub carrier: CarrierConfig,

    /// SMS hook
    #[serde(default)]
    pub sms: SmsConfig,

    /// Prompt catalog overrides
    #[serde(default)]
    pub prompts: PromptSettings,

    /// Order store fixtures
    #[serde(default)]
    pub orders: OrdersConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Session guards and dialogue limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hard cap on turns per call
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Wall-clock budget per call
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,

    /// Consecutive unrecognized turns before an operator is offered
    #[serde(default = "default_no_intent_threshold")]
    pub no_intent_threshold: u32,

    /// Failed address normalizations before an operator is offered
    #[serde(default = "default_address_attempts")]
    pub address_attempts: u32,

    /// Per-turn listen cap
    #[serde(default = "default_listen_timeout_ms")]
    pub listen_timeout_ms: u64,

    /// Fixed seed for prompt phrasing (tests and replays)
    #[serde(default)]
    pub prompt_seed: Option<u64>,

    /// Calls handled concurrently by one process
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,

    /// History lines attached to operator handoffs
    #[serde(default = "default_handoff_history_lines")]
    pub handoff_history_lines: usize,

    /// Address the caller by name once it is known
    #[serde(default = "default_true")]
    pub personalize: bool,
}

fn default_max_turns() -> u32 {
    session::MAX_TURNS
}
fn default_max_duration_secs() -> u64 {
    session::MAX_DURATION_SECS
}
fn default_no_intent_threshold() -> u32 {
    session::NO_INTENT_THRESHOLD
}
fn default_address_attempts() -> u32 {
    session::ADDRESS_ATTEMPTS
}
fn default_listen_timeout_ms() -> u64 {
    session::LISTEN_TIMEOUT_MS
}
fn default_max_concurrent_sessions() -> usize {
    session::MAX_CONCURRENT_SESSIONS
}
fn default_handoff_history_lines() -> usize {
    session::HANDOFF_HISTORY_LINES
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_duration_secs: default_max_duration_secs(),
            no_intent_threshold: default_no_intent_threshold(),
            address_attempts: default_address_attempts(),
            listen_timeout_ms: default_listen_timeout_ms(),
            prompt_seed: None,
            max_concurrent_sessions: default_max_concurrent_sessions(),
            handoff_history_lines: default_handoff_history_lines(),
            personalize: true,
        }
    }
}

/// Speech provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Speech bridge base URL
    #[serde(default = "default_speech_endpoint")]
    pub endpoint: String,

    /// Token exchange URL
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    /// Service account that signs token assertions
    #[serde(default)]
    pub service_account_id: String,

    /// Key identifier sent alongside the signature
    #[serde(default)]
    pub key_id: String,

    /// Shared signing secret
    #[serde(default)]
    pub signing_secret: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_locale")]
    pub locale: String,

    /// Playback timeout
    #[serde(default = "default_speak_timeout_ms")]
    pub speak_timeout_ms: u64,

    /// HTTP request timeout for non-streaming calls
    #[serde(default = "default_speech_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retries after the first attempt (at most one)
    #[serde(default = "default_speech_max_retries")]
    pub max_retries: u32,

    /// Requested token lifetime
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Refresh this long before expiry
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,
}

fn default_speech_endpoint() -> String {
    endpoints::SPEECH_BRIDGE_DEFAULT.to_string()
}
fn default_token_endpoint() -> String {
    endpoints::SPEECH_TOKEN_DEFAULT.to_string()
}
fn default_voice() -> String {
    speech::DEFAULT_VOICE.to_string()
}
fn default_locale() -> String {
    speech::DEFAULT_LOCALE.to_string()
}
fn default_speak_timeout_ms() -> u64 {
    speech::SPEAK_TIMEOUT_MS
}
fn default_speech_request_timeout_ms() -> u64 {
    speech::REQUEST_TIMEOUT_MS
}
fn default_speech_max_retries() -> u32 {
    speech::MAX_RETRIES
}
fn default_token_ttl_secs() -> u64 {
    speech::TOKEN_TTL_SECS
}
fn default_token_refresh_margin_secs() -> u64 {
    speech::TOKEN_REFRESH_MARGIN_SECS
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: default_speech_endpoint(),
            token_endpoint: default_token_endpoint(),
            service_account_id: String::new(),
            key_id: String::new(),
            signing_secret: String::new(),
            voice: default_voice(),
            locale: default_locale(),
            speak_timeout_ms: default_speak_timeout_ms(),
            request_timeout_ms: default_speech_request_timeout_ms(),
            max_retries: default_speech_max_retries(),
            token_ttl_secs: default_token_ttl_secs(),
            token_refresh_margin_secs: default_token_refresh_margin_secs(),
        }
    }
}

/// Postal carrier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierConfig {
    #[serde(default = "default_carrier_endpoint")]
    pub endpoint: String,

    /// Application token ("AccessToken" scheme)
    #[serde(default)]
    pub access_token: String,

    /// Base64 login:password pair for the user authorization header
    #[serde(default)]
    pub user_key: String,

    /// Tariff origin
    #[serde(default = "default_origin_postcode")]
    pub origin_postcode: String,

    /// Attempts per operation, first call included
    #[serde(default = "default_carrier_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay, doubled per retry
    #[serde(default = "default_carrier_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_carrier_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Parcel mass used when the order does not say
    #[serde(default = "default_parcel_grams")]
    pub default_parcel_grams: u32,

    /// Upper bound on cached address normalizations
    #[serde(default = "default_address_cache_capacity")]
    pub address_cache_capacity: usize,

    #[serde(default = "default_address_cache_ttl_secs")]
    pub address_cache_ttl_secs: u64,
}

fn default_carrier_endpoint() -> String {
    endpoints::CARRIER_DEFAULT.to_string()
}
fn default_origin_postcode() -> String {
    carrier::DEFAULT_ORIGIN_POSTCODE.to_string()
}
fn default_carrier_max_attempts() -> u32 {
    carrier::MAX_ATTEMPTS
}
fn default_carrier_initial_backoff_ms() -> u64 {
    carrier::INITIAL_BACKOFF_MS
}
fn default_carrier_request_timeout_ms() -> u64 {
    carrier::REQUEST_TIMEOUT_MS
}
fn default_parcel_grams() -> u32 {
    carrier::DEFAULT_PARCEL_GRAMS
}
fn default_address_cache_capacity() -> usize {
    carrier::ADDRESS_CACHE_CAPACITY
}
fn default_address_cache_ttl_secs() -> u64 {
    carrier::ADDRESS_CACHE_TTL_SECS
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_carrier_endpoint(),
            access_token: String::new(),
            user_key: String::new(),
            origin_postcode: default_origin_postcode(),
            max_attempts: default_carrier_max_attempts(),
            initial_backoff_ms: default_carrier_initial_backoff_ms(),
            request_timeout_ms: default_carrier_request_timeout_ms(),
            default_parcel_grams: default_parcel_grams(),
            address_cache_capacity: default_address_cache_capacity(),
            address_cache_ttl_secs: default_address_cache_ttl_secs(),
        }
    }
}

/// SMS hook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sender name shown to the caller
    #[serde(default = "default_sms_sender")]
    pub sender: String,
}

fn default_sms_sender() -> String {
    "SHOP".to_string()
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sender: default_sms_sender(),
        }
    }
}

/// Prompt catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSettings {
    /// YAML file with template overrides (key -> list of phrasings)
    #[serde(default)]
    pub catalog_path: Option<String>,

    /// Apply the anti-filter letter substitution pass
    #[serde(default = "default_true")]
    pub anti_filter: bool,

    /// Words the synthesizer's spam filter trips on
    #[serde(default = "default_anti_filter_words")]
    pub anti_filter_words: Vec<String>,
}

fn default_anti_filter_words() -> Vec<String> {
    ["оплата", "оплатить", "карта", "картой", "перевод", "код", "скидка", "бесплатно"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            catalog_path: None,
            anti_filter: true,
            anti_filter_words: default_anti_filter_words(),
        }
    }
}

/// Order store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrdersConfig {
    /// YAML list of orders for the in-memory store
    #[serde(default)]
    pub fixtures_path: Option<String>,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
            metrics_port: default_metrics_port(),
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_session()?;
        self.validate_speech()?;
        self.validate_carrier()?;
        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        let s = &self.session;

        if s.max_turns == 0 {
            return Err(invalid("session.max_turns", "Must be at least 1"));
        }
        if s.max_duration_secs == 0 {
            return Err(invalid("session.max_duration_secs", "Must be at least 1"));
        }
        if s.no_intent_threshold == 0 || s.no_intent_threshold > s.max_turns {
            return Err(invalid(
                "session.no_intent_threshold",
                &format!("Must be between 1 and max_turns ({}), got {}", s.max_turns, s.no_intent_threshold),
            ));
        }
        if s.address_attempts == 0 {
            return Err(invalid("session.address_attempts", "Must be at least 1"));
        }
        if s.listen_timeout_ms < 500 {
            return Err(invalid(
                "session.listen_timeout_ms",
                &format!("Listen timeout too low (minimum 500ms), got {}", s.listen_timeout_ms),
            ));
        }
        if s.max_concurrent_sessions == 0 {
            return Err(invalid("session.max_concurrent_sessions", "Must be at least 1"));
        }

        Ok(())
    }

    fn validate_speech(&self) -> Result<(), ConfigError> {
        let s = &self.speech;

        // The Invoker retries a failed command at most once.
        if s.max_retries > 1 {
            return Err(invalid(
                "speech.max_retries",
                &format!("At most one retry is allowed, got {}", s.max_retries),
            ));
        }
        if s.token_refresh_margin_secs >= s.token_ttl_secs {
            return Err(invalid(
                "speech.token_refresh_margin_secs",
                "Refresh margin must be shorter than the token lifetime",
            ));
        }
        if self.environment.is_strict() && s.signing_secret.is_empty() {
            return Err(ConfigError::MissingField("speech.signing_secret".to_string()));
        }

        Ok(())
    }

    fn validate_carrier(&self) -> Result<(), ConfigError> {
        let c = &self.carrier;

        if !(1..=3).contains(&c.max_attempts) {
            return Err(invalid(
                "carrier.max_attempts",
                &format!("Must be between 1 and 3, got {}", c.max_attempts),
            ));
        }
        if c.origin_postcode.len() != 6 || !c.origin_postcode.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(invalid(
                "carrier.origin_postcode",
                &format!("Expected 6 digits, got '{}'", c.origin_postcode),
            ));
        }
        if c.address_cache_capacity < 2 {
            return Err(invalid(
                "carrier.address_cache_capacity",
                "Must hold at least one address under both keys",
            ));
        }
        if self.environment.is_strict() && c.access_token.is_empty() {
            return Err(ConfigError::MissingField("carrier.access_token".to_string()));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (VOICE_SUPPORT__ prefix, `__` separator)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Same as [`load_settings`] with an explicit config directory
pub fn load_settings_from(dir: &str, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name(&format!("{}/default", dir)).required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("{}/{}", dir, env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_SUPPORT")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(environment = ?settings.environment, "Settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.session.max_turns, 20);
        assert_eq!(settings.session.no_intent_threshold, 3);
        assert_eq!(settings.carrier.max_attempts, 3);
        assert_eq!(settings.speech.max_retries, 1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_session_validation() {
        let mut settings = Settings::default();
        settings.session.max_turns = 0;
        assert!(settings.validate().is_err());

        settings.session.max_turns = 2;
        settings.session.no_intent_threshold = 3;
        assert!(settings.validate().is_err());

        settings.session.max_turns = 20;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_speech_retry_cap() {
        let mut settings = Settings::default();
        settings.speech.max_retries = 2;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("speech.max_retries"));
    }

    #[test]
    fn test_carrier_validation() {
        let mut settings = Settings::default();
        settings.carrier.max_attempts = 5;
        assert!(settings.validate_carrier().is_err());

        settings.carrier.max_attempts = 3;
        settings.carrier.origin_postcode = "1010".to_string();
        assert!(settings.validate_carrier().is_err());

        settings.carrier.origin_postcode = "101000".to_string();
        settings.carrier.address_cache_capacity = 0;
        let err = settings.validate_carrier().unwrap_err();
        assert!(err.to_string().contains("carrier.address_cache_capacity"));
    }

    #[test]
    fn test_strict_requires_secrets() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::MissingField(_))
        ));

        settings.speech.signing_secret = "secret".to_string();
        settings.carrier.access_token = "token".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "session:\n  max_turns: 12\n  prompt_seed: 7\ncarrier:\n  origin_postcode: \"190000\"\n"
        )
        .unwrap();

        let settings = load_settings_from(dir.path().to_str().unwrap(), None).unwrap();
        assert_eq!(settings.session.max_turns, 12);
        assert_eq!(settings.session.prompt_seed, Some(7));
        assert_eq!(settings.carrier.origin_postcode, "190000");
        assert_eq!(settings.session.no_intent_threshold, 3);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.yaml"), "session:\n  max_turns: 0\n").unwrap();

        let result = load_settings_from(dir.path().to_str().unwrap(), None);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
