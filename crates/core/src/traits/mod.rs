//! Collaborator traits
//!
//! Everything outside the dialogue engine sits behind one of these, so
//! sessions can run against real services or scripted test doubles.
//!
//! ```text
//! Speech:
//!   - SpeechProvider: Speak / Listen against one call
//!   - TokenSource: signed credential exchange for provider tokens
//!
//! Shipping:
//!   - CarrierApi: address cleanup and tariff lookup
//!
//! Orders:
//!   - OrderStore: read-only status lookup
//!
//! Notifications:
//!   - SmsNotifier: fire-and-forget SMS
//! ```

mod carrier;
mod notify;
mod orders;
mod speech;

pub use carrier::CarrierApi;
pub use notify::{SmsMessage, SmsNotifier};
pub use orders::OrderStore;
pub use speech::{AccessToken, EndOfSpeech, ListenOutcome, SpeakRequest, SpeechProvider, TokenSource};
