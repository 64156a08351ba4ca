//! Greeting: the initial state, routes the caller to a topic

use async_trait::async_trait;
use voice_support_config::prompt_keys;
use voice_support_core::{EntityKind, IntentTag};

use super::{common_reply, not_understood, topic_for_intent, PromptPlan, StateTag, Topic, TransitionDecision, Turn};
use crate::session::{mentions_street_level, Session};

pub(super) struct Greeting;

#[async_trait]
impl Topic for Greeting {
    fn tag(&self) -> StateTag {
        StateTag::Greeting
    }

    fn questions(&self) -> &'static [IntentTag] {
        &[]
    }

    /// Intents first; a bare order number or address also picks the topic
    fn navigate(&self, _session: &Session, turn: &Turn<'_>) -> Option<StateTag> {
        if let Some(target) = turn.intent().and_then(topic_for_intent) {
            return Some(target);
        }
        let analysis = turn.analysis;
        if analysis.has_entity(EntityKind::OrderNumber) {
            Some(StateTag::Order)
        } else if mentions_street_level(analysis) || analysis.has_entity(EntityKind::DeliveryMethod) {
            Some(StateTag::Shipping)
        } else {
            None
        }
    }

    async fn respond_basic(&self, session: &mut Session, turn: &Turn<'_>) -> TransitionDecision {
        if let Some(decision) = common_reply(session, turn) {
            return decision;
        }
        if turn.is_miss() {
            return not_understood(session, turn.awaiting);
        }
        TransitionDecision::stay(PromptPlan::say(prompt_keys::GREETING_AGAIN), "prompt for topic")
    }

    async fn respond_to_question(
        &self,
        session: &mut Session,
        turn: &Turn<'_>,
        _question: IntentTag,
    ) -> TransitionDecision {
        self.respond_basic(session, turn).await
    }
}
