//! Escalation: the caller was offered an operator and has to answer

use async_trait::async_trait;
use voice_support_config::prompt_keys;
use voice_support_core::IntentTag;

use super::{
    topic_for_intent, transfer, PromptPlan, StateTag, Topic, TransitionDecision, Turn,
};
use crate::session::{EscalationReason, Session};

pub(super) struct Escalation;

#[async_trait]
impl Topic for Escalation {
    fn tag(&self) -> StateTag {
        StateTag::Escalation
    }

    fn questions(&self) -> &'static [IntentTag] {
        &[]
    }

    /// A topic question means the caller wants to keep going with the bot
    fn navigate(&self, _session: &Session, turn: &Turn<'_>) -> Option<StateTag> {
        turn.intent().and_then(topic_for_intent)
    }

    async fn respond_basic(&self, session: &mut Session, turn: &Turn<'_>) -> TransitionDecision {
        let reason = session
            .escalation_reason
            .unwrap_or(EscalationReason::RepeatedMisses);

        match turn.intent() {
            Some(IntentTag::Affirm) => transfer(session, reason),
            Some(IntentTag::Deny) => {
                session.no_intent_streak = 0;
                TransitionDecision::to(
                    StateTag::Greeting,
                    PromptPlan::say(prompt_keys::ESCALATION_DECLINED),
                    "operator declined",
                )
            }
            // Still nothing understood after the offer
            _ if turn.is_miss() => transfer(session, reason),
            _ => TransitionDecision::stay(
                PromptPlan::say(prompt_keys::ESCALATION_OFFER),
                "offer operator again",
            ),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Ending;
    use crate::state::handle;
    use crate::testing::{heard, services};

    fn offered(reason: EscalationReason) -> Session {
        let mut session = Session::new("c");
        session.enter(StateTag::Order);
        session.escalation_reason = Some(reason);
        session.no_intent_streak = 3;
        session.enter(StateTag::Escalation);
        session
    }

    #[tokio::test]
    async fn test_accept_transfers_with_reason() {
        let services = services();
        let mut session = offered(EscalationReason::RepeatedMisses);
        let decision = handle(&mut session, &heard("да"), &services).await;
        assert_eq!(decision.target, Some(StateTag::Termination));
        assert_eq!(
            session.ending,
            Some(Ending::Transferred(EscalationReason::RepeatedMisses))
        );
    }

    #[tokio::test]
    async fn test_decline_returns_to_greeting() {
        let services = services();
        let mut session = offered(EscalationReason::RepeatedMisses);
        let decision = handle(&mut session, &heard("нет не надо"), &services).await;
        assert_eq!(decision.target, Some(StateTag::Greeting));
        assert_eq!(decision.plan.keys(), vec![prompt_keys::ESCALATION_DECLINED]);
        assert_eq!(session.no_intent_streak, 0);
        assert_eq!(session.ending, None);
    }

    #[tokio::test]
    async fn test_silence_after_offer_transfers() {
        let services = services();
        let mut session = offered(EscalationReason::CallerRequest);
        let decision = handle(&mut session, &heard(""), &services).await;
        assert_eq!(decision.target, Some(StateTag::Termination));
        assert_eq!(
            session.ending,
            Some(Ending::Transferred(EscalationReason::CallerRequest))
        );
    }

    #[tokio::test]
    async fn test_topic_question_resumes_dialogue() {
        let services = services();
        let mut session = offered(EscalationReason::RepeatedMisses);
        let decision = handle(&mut session, &heard("где мой заказ"), &services).await;
        assert_eq!(decision.target, Some(StateTag::Order));
        assert!(decision.plan.contains(prompt_keys::ORDER_INTRO));
    }
}
