//! Caller utterances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One caller speech turn
///
/// `normalized` is produced by the text processing layer (lowercase,
/// `ё` folded, punctuation stripped). Entity spans refer to it, not to `raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Transcript as returned by the speech provider
    pub raw: String,
    /// Normalized transcript used for matching
    pub normalized: String,
    /// When the transcript was received
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(raw: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            normalized: normalized.into(),
            received_at: Utc::now(),
        }
    }

    /// Turn where nothing was heard (silence or listen timeout)
    pub fn silence() -> Self {
        Self::new(String::new(), String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.trim().is_empty()
    }
}

impl Default for Utterance {
    fn default() -> Self {
        Self::silence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_empty() {
        assert!(Utterance::silence().is_empty());
        assert!(Utterance::new("  ", "  ").is_empty());
        assert!(!Utterance::new("Да", "да").is_empty());
    }
}
