//! Centralized defaults
//!
//! Single source for the numeric defaults used by `Settings` and by tests
//! that need to reason about them.

/// Session guards
pub mod session {
    /// Hard cap on turns per call
    pub const MAX_TURNS: u32 = 20;

    /// Wall-clock budget per call
    pub const MAX_DURATION_SECS: u64 = 600;

    /// Consecutive unrecognized turns before offering an operator
    pub const NO_INTENT_THRESHOLD: u32 = 3;

    /// Failed address normalizations before offering an operator
    pub const ADDRESS_ATTEMPTS: u32 = 3;

    /// Per-turn capture cap
    pub const LISTEN_TIMEOUT_MS: u64 = 8_000;

    /// Calls handled at once by one process
    pub const MAX_CONCURRENT_SESSIONS: usize = 64;

    /// History lines attached to an operator handoff
    pub const HANDOFF_HISTORY_LINES: usize = 6;
}

/// Speech provider
pub mod speech {
    pub const DEFAULT_VOICE: &str = "alena";
    pub const DEFAULT_LOCALE: &str = "ru-RU";
    pub const SPEAK_TIMEOUT_MS: u64 = 15_000;
    pub const REQUEST_TIMEOUT_MS: u64 = 10_000;
    pub const TOKEN_TTL_SECS: u64 = 3_600;
    pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;
    /// Retries after the first attempt
    pub const MAX_RETRIES: u32 = 1;
}

/// Postal carrier
pub mod carrier {
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const INITIAL_BACKOFF_MS: u64 = 200;
    pub const REQUEST_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_PARCEL_GRAMS: u32 = 1_000;
    /// Warehouse postcode used as tariff origin
    pub const DEFAULT_ORIGIN_POSTCODE: &str = "101000";
    /// Normalized address cache entries, input and canonical keys both count
    pub const ADDRESS_CACHE_CAPACITY: usize = 1_024;
    pub const ADDRESS_CACHE_TTL_SECS: u64 = 3_600;
}

/// Service endpoints (defaults for local development)
pub mod endpoints {
    pub const SPEECH_BRIDGE_DEFAULT: &str = "http://127.0.0.1:8700/v1/calls";
    pub const SPEECH_TOKEN_DEFAULT: &str = "http://127.0.0.1:8700/v1/tokens";
    pub const CARRIER_DEFAULT: &str = "https://otpravka-api.pochta.ru";
}
