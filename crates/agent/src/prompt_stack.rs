//! Prompt Stack
//!
//! Turn-level conversational memory on top of the speech [`Invoker`]. Every
//! prompt that was played and every transcript that was heard is appended to
//! one ordered history; nothing in it is ever rewritten.
//!
//! Phrasing is picked from the catalog with a per-session RNG. A fixed seed
//! makes the whole call reproducible.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use voice_support_config::prompt_keys;
use voice_support_core::{EndOfSpeech, Utterance};
use voice_support_pipeline::Invoker;
use voice_support_text_processing::{normalize, PromptCatalog, PromptParams, RenderedPrompt};

use crate::AgentError;

/// One history record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Prompt {
        key: String,
        text: String,
        at: DateTime<Utc>,
    },
    Transcript {
        raw: String,
        normalized: String,
        at: DateTime<Utc>,
    },
}

impl HistoryEntry {
    /// Single line for operator notes
    pub fn line(&self) -> String {
        match self {
            HistoryEntry::Prompt { text, .. } => format!("assistant: {}", text),
            HistoryEntry::Transcript { raw, .. } if raw.trim().is_empty() => {
                "caller: (silence)".to_string()
            }
            HistoryEntry::Transcript { raw, .. } => format!("caller: {}", raw),
        }
    }

    pub fn is_prompt(&self) -> bool {
        matches!(self, HistoryEntry::Prompt { .. })
    }
}

pub struct PromptStack {
    catalog: Arc<PromptCatalog>,
    invoker: Invoker,
    rng: StdRng,
    history: Vec<HistoryEntry>,
    /// Prompts played in the open turn
    current_turn: Vec<RenderedPrompt>,
    /// Prompts of the turn before, kept for `repeat_last`
    previous_turn: Vec<RenderedPrompt>,
}

impl PromptStack {
    pub fn new(catalog: Arc<PromptCatalog>, invoker: Invoker, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            catalog,
            invoker,
            rng,
            history: Vec::new(),
            current_turn: Vec::new(),
            previous_turn: Vec::new(),
        }
    }

    /// Open a new turn
    pub fn begin_turn(&mut self) {
        if !self.current_turn.is_empty() {
            self.previous_turn = std::mem::take(&mut self.current_turn);
        }
        self.invoker.begin_turn();
    }

    /// Render a template and play it
    pub async fn say(&mut self, key: &str, params: &PromptParams) -> Result<(), AgentError> {
        let prompt = self.catalog.render(key, params, &mut self.rng)?;
        self.play(prompt).await
    }

    /// Play the previous turn's prompts again, exactly as rendered
    pub async fn repeat_last(&mut self) -> Result<(), AgentError> {
        if self.previous_turn.is_empty() {
            return self
                .say(prompt_keys::NOTHING_TO_REPEAT, &PromptParams::new())
                .await;
        }
        for prompt in self.previous_turn.clone() {
            self.play(prompt).await?;
        }
        Ok(())
    }

    /// Capture one caller utterance; a listen timeout yields silence
    pub async fn listen(&mut self, max_duration: Duration) -> Result<Utterance, AgentError> {
        let outcome = self.invoker.listen(max_duration).await?;

        let utterance = if outcome.end == EndOfSpeech::Timeout {
            tracing::debug!(max_ms = max_duration.as_millis() as u64, "Listen timed out");
            Utterance::silence()
        } else {
            normalize::utterance(&outcome.transcript)
        };

        self.history.push(HistoryEntry::Transcript {
            raw: utterance.raw.clone(),
            normalized: utterance.normalized.clone(),
            at: utterance.received_at,
        });
        Ok(utterance)
    }

    pub async fn say_then_listen(
        &mut self,
        key: &str,
        params: &PromptParams,
        max_duration: Duration,
    ) -> Result<Utterance, AgentError> {
        self.say(key, params).await?;
        self.listen(max_duration).await
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn into_history(self) -> Vec<HistoryEntry> {
        self.history
    }

    /// Most recently played prompt
    pub fn last_prompt(&self) -> Option<&RenderedPrompt> {
        self.current_turn
            .last()
            .or_else(|| self.previous_turn.last())
    }

    async fn play(&mut self, prompt: RenderedPrompt) -> Result<(), AgentError> {
        self.invoker.speak(&prompt.markup).await?;
        tracing::debug!(key = %prompt.key, variant = prompt.variant, "Prompt played");

        self.history.push(HistoryEntry::Prompt {
            key: prompt.key.clone(),
            text: prompt.text.clone(),
            at: Utc::now(),
        });
        self.current_turn.push(prompt);
        Ok(())
    }
}
