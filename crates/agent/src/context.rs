//! Session Context
//!
//! Drives one call from greeting to hang-up as a bounded loop. Each
//! iteration is one turn: play the planned prompts, listen once, analyze the
//! utterance and let the state machine decide what to say next.
//!
//! The loop stops when the session reaches `Termination`, either through the
//! dialogue (goodbye, operator transfer) or because a guard tripped. Speech
//! failures are not retried here; the invoker already did that, so the call
//! is handed to an operator instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use voice_support_config::prompt_keys;
use voice_support_core::{SpeechProvider, Utterance};
use voice_support_pipeline::Invoker;
use voice_support_text_processing::Recognizer;

use crate::dispatcher::SharedResources;
use crate::guards::SessionGuards;
use crate::prompt_stack::{HistoryEntry, PromptStack};
use crate::session::{Ending, EscalationReason, Session, SlotData};
use crate::state::{self, farewell_plan, PromptPlan, PromptStep, StateServices, StateTag};
use crate::AgentError;

/// What an operator receives on transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffContext {
    pub reason: EscalationReason,
    pub caller: String,
    /// Topic the caller was in before the transfer
    pub state: StateTag,
    pub slots: BTreeMap<String, String>,
    /// Last lines of the conversation, oldest first
    pub recent_history: Vec<String>,
}

/// Outcome of one finished call
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub caller: String,
    pub outcome: Ending,
    /// State the loop stopped in
    pub final_state: StateTag,
    /// Last topic before the call ended
    pub last_topic: StateTag,
    pub turns: u32,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub handoff: Option<HandoffContext>,
    pub slots: SlotData,
    pub history: Vec<HistoryEntry>,
}

impl SessionReport {
    pub fn escalation(&self) -> Option<EscalationReason> {
        self.outcome.escalation()
    }

    /// Keys of every prompt played, in order
    pub fn prompt_keys(&self) -> Vec<&str> {
        self.history
            .iter()
            .filter_map(|entry| match entry {
                HistoryEntry::Prompt { key, .. } => Some(key.as_str()),
                HistoryEntry::Transcript { .. } => None,
            })
            .collect()
    }
}

pub struct SessionContext {
    session: Session,
    recognizer: Recognizer,
    prompts: PromptStack,
    services: StateServices,
    guards: SessionGuards,
    listen_timeout: Duration,
    handoff_history_lines: usize,
    personalize: bool,
}

impl SessionContext {
    pub fn new(
        caller: impl Into<String>,
        resources: &SharedResources,
        provider: Arc<dyn SpeechProvider>,
    ) -> Self {
        let config = &resources.session;
        let invoker = Invoker::new(provider, resources.tokens.clone(), resources.invoker.clone());
        Self {
            session: Session::new(caller),
            recognizer: Recognizer::new(resources.patterns.clone()),
            prompts: PromptStack::new(resources.catalog.clone(), invoker, config.prompt_seed),
            services: resources.services(),
            guards: SessionGuards::from_config(config),
            listen_timeout: Duration::from_millis(config.listen_timeout_ms),
            handoff_history_lines: config.handoff_history_lines,
            personalize: config.personalize,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the call to completion
    pub async fn run(self) -> SessionReport {
        let span = tracing::info_span!(
            "session",
            session_id = %self.session.id,
            caller = %self.session.caller
        );
        self.drive().instrument(span).await
    }

    async fn drive(mut self) -> SessionReport {
        tracing::info!("Session started");
        let mut plan = PromptPlan::say(prompt_keys::GREETING);

        loop {
            if self.session.state == StateTag::Termination {
                self.farewell(&plan).await;
                break;
            }

            if let Some(trip) = self.guards.check(self.session.turns, self.session.elapsed()) {
                tracing::info!(
                    ?trip,
                    turns = self.session.turns,
                    elapsed_ms = self.session.elapsed().as_millis() as u64,
                    "Session guard tripped"
                );
                self.session.ending = Some(trip.into());
                self.session.enter(StateTag::Termination);
                continue;
            }

            self.session.turns += 1;
            metrics::counter!("voice_support_turns_total").increment(1);

            let utterance = match self.exchange(&plan).await {
                Ok(utterance) => utterance,
                Err(e) => {
                    tracing::error!(error = %e, turn = self.session.turns, "Speech exchange failed");
                    self.session.ending = Some(Ending::Transferred(EscalationReason::ProviderFailure));
                    self.session.enter(StateTag::Termination);
                    plan = PromptPlan::empty();
                    continue;
                }
            };

            let analysis = self.recognizer.analyze_utterance(utterance);
            tracing::debug!(
                turn = self.session.turns,
                intent = ?analysis.intent_tag(),
                entities = analysis.entities.len(),
                "Utterance analyzed"
            );

            let decision = state::handle(&mut self.session, &analysis, &self.services).await;
            if let Some(target) = decision.target {
                self.transition(target, decision.reason);
            }
            plan = decision.plan;
        }

        self.finish()
    }

    /// One speak/listen exchange
    async fn exchange(&mut self, plan: &PromptPlan) -> Result<Utterance, AgentError> {
        self.prompts.begin_turn();
        self.play(plan).await?;
        let remaining = self.guards.remaining(self.session.elapsed());
        self.prompts.listen(self.listen_timeout.min(remaining)).await
    }

    async fn play(&mut self, plan: &PromptPlan) -> Result<(), AgentError> {
        for step in &plan.steps {
            match step {
                PromptStep::Say { key, params } => self.prompts.say(key, params).await?,
                PromptStep::RepeatLast => self.prompts.repeat_last().await?,
            }
        }
        Ok(())
    }

    /// Closing words; the call ends whether or not they could be played
    ///
    /// `pending` is the answer decided on the last turn. A guard can trip
    /// before it was spoken, so it goes first.
    async fn farewell(&mut self, pending: &PromptPlan) {
        let mut plan = pending.clone();
        plan.steps
            .extend(farewell_plan(&self.session, self.personalize).steps);
        self.prompts.begin_turn();
        if let Err(e) = self.play(&plan).await {
            tracing::warn!(error = %e, "Farewell prompt failed");
        }
    }

    fn transition(&mut self, target: StateTag, reason: &'static str) {
        let from = self.session.state;
        if target == from {
            return;
        }
        if !from.can_transition_to(target) {
            tracing::warn!(from = %from, to = %target, reason, "Transition not allowed, staying");
            return;
        }
        tracing::info!(from = %from, to = %target, reason, "State transition");
        metrics::counter!(
            "voice_support_transitions_total",
            "from" => from.as_str(),
            "to" => target.as_str()
        )
        .increment(1);
        self.session.enter(target);
    }

    fn finish(self) -> SessionReport {
        let session = self.session;
        let history = self.prompts.into_history();
        let outcome = session.ending.unwrap_or(Ending::Goodbye);
        let duration = session.elapsed();

        let handoff = outcome.escalation().map(|reason| {
            let skip = history.len().saturating_sub(self.handoff_history_lines);
            HandoffContext {
                reason,
                caller: session.caller.clone(),
                state: session.last_topic,
                slots: session.slots.summary(),
                recent_history: history[skip..].iter().map(HistoryEntry::line).collect(),
            }
        });

        metrics::counter!("voice_support_sessions_total", "outcome" => outcome.as_str())
            .increment(1);
        if let Some(reason) = outcome.escalation() {
            metrics::counter!("voice_support_escalations_total", "reason" => reason.as_str())
                .increment(1);
        }
        metrics::histogram!("voice_support_session_duration_seconds").record(duration.as_secs_f64());

        tracing::info!(
            outcome = outcome.as_str(),
            escalation = outcome.escalation().map(|r| r.as_str()),
            turns = session.turns,
            duration_ms = duration.as_millis() as u64,
            "Session finished"
        );

        SessionReport {
            session_id: session.id,
            caller: session.caller,
            outcome,
            final_state: session.state,
            last_topic: session.last_topic,
            turns: session.turns,
            duration_ms: duration.as_millis() as u64,
            started_at: session.started_at,
            handoff,
            slots: session.slots,
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{resources, ScriptedSpeech};
    use voice_support_core::{ListenOutcome, SpeechError};

    #[tokio::test]
    async fn test_goodbye_on_first_turn() {
        let speech = ScriptedSpeech::new([ListenOutcome::heard("до свидания", 0.9)]);
        let report = SessionContext::new("+79990000000", &resources(), speech.clone())
            .run()
            .await;

        assert_eq!(report.outcome, Ending::Goodbye);
        assert_eq!(report.turns, 1);
        assert_eq!(report.final_state, StateTag::Termination);
        assert_eq!(report.prompt_keys(), vec![prompt_keys::GREETING, prompt_keys::FAREWELL]);
        assert!(report.handoff.is_none());
        assert_eq!(speech.spoken().len(), 2);
    }

    #[tokio::test]
    async fn test_disallowed_transition_is_ignored() {
        let speech = ScriptedSpeech::new(Vec::<ListenOutcome>::new());
        let mut context = SessionContext::new("c", &resources(), speech);
        context.session.enter(StateTag::Termination);
        context.transition(StateTag::Order, "test");
        assert_eq!(context.session.state, StateTag::Termination);
    }

    #[tokio::test]
    async fn test_provider_failure_hands_off() {
        let speech = ScriptedSpeech::with_results([Err(SpeechError::ProviderFailed {
            attempts: 2,
            message: "503".into(),
        })]);
        let report = SessionContext::new("c", &resources(), speech).run().await;

        assert_eq!(
            report.outcome,
            Ending::Transferred(EscalationReason::ProviderFailure)
        );
        let handoff = report.handoff.as_ref().expect("handoff context");
        assert_eq!(handoff.state, StateTag::Greeting);
        assert_eq!(report.prompt_keys().last(), Some(&prompt_keys::SPEECH_FAILURE));
    }

    #[tokio::test]
    async fn test_turn_limit_still_speaks_last_answer() {
        let mut resources = resources();
        resources.session.max_turns = 1;
        let speech = ScriptedSpeech::new([ListenOutcome::heard("где мой заказ 12345", 0.9)]);
        let report = SessionContext::new("c", &resources, speech).run().await;

        assert_eq!(report.outcome, Ending::TurnLimit);
        let keys = report.prompt_keys();
        let status = keys.iter().position(|k| *k == prompt_keys::ORDER_STATUS);
        assert!(status.is_some(), "{:?}", keys);
        assert_eq!(keys.last(), Some(&prompt_keys::GUARD_TURN_LIMIT));
        assert!(status < keys.iter().position(|k| *k == prompt_keys::GUARD_TURN_LIMIT));
    }

    #[test]
    fn test_report_serializes() {
        let report = SessionReport {
            session_id: "s".into(),
            caller: "c".into(),
            outcome: Ending::TimeLimit,
            final_state: StateTag::Termination,
            last_topic: StateTag::Shipping,
            turns: 4,
            duration_ms: 1000,
            started_at: Utc::now(),
            handoff: None,
            slots: SlotData::default(),
            history: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["kind"], "time_limit");
        assert_eq!(json["last_topic"], "shipping");
    }
}
