//! Session guards
//!
//! Two independent limits per call: the number of turns and the wall-clock
//! duration. Either one tripping ends the call with an explanation prompt.

use std::time::Duration;
use voice_support_config::SessionConfig;

use crate::session::Ending;

/// Which guard fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardTrip {
    TurnLimit,
    TimeLimit,
}

impl From<GuardTrip> for Ending {
    fn from(trip: GuardTrip) -> Self {
        match trip {
            GuardTrip::TurnLimit => Ending::TurnLimit,
            GuardTrip::TimeLimit => Ending::TimeLimit,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionGuards {
    max_turns: u32,
    max_duration: Duration,
}

impl SessionGuards {
    pub fn new(max_turns: u32, max_duration: Duration) -> Self {
        Self {
            max_turns,
            max_duration,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.max_turns,
            Duration::from_secs(config.max_duration_secs),
        )
    }

    /// Checked before each turn starts
    pub fn check(&self, turns: u32, elapsed: Duration) -> Option<GuardTrip> {
        if turns >= self.max_turns {
            Some(GuardTrip::TurnLimit)
        } else if elapsed >= self.max_duration {
            Some(GuardTrip::TimeLimit)
        } else {
            None
        }
    }

    /// Wall-clock time left
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.max_duration.saturating_sub(elapsed)
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }
}
