//! Voice Support Server
//!
//! Process wiring for the dialogue engine: telemetry setup, a console speech
//! provider for local calls, and offline stand-ins for the external
//! collaborators when no credentials are configured.

pub mod console;
pub mod offline;
pub mod telemetry;

pub use console::ConsoleSpeechProvider;
pub use offline::{LocalTokenSource, OfflineCarrier};
pub use telemetry::{init_metrics, init_tracing};
