//! Payment: methods, refunds and whether an order is paid

use async_trait::async_trait;
use voice_support_config::prompt_keys;
use voice_support_core::IntentTag;
use voice_support_text_processing::PromptParams;

use super::order::{lookup_order, Lookup};
use super::{
    common_reply, not_understood, offer_escalation, topic_for_intent, PromptPlan, StateTag, Topic,
    TransitionDecision, Turn,
};
use crate::session::{Awaiting, EscalationReason, Session};

pub(super) struct Payment;

impl Payment {
    async fn payment_status(session: &mut Session, turn: &Turn<'_>) -> TransitionDecision {
        match lookup_order(session, turn.services).await {
            Lookup::Found(order) => {
                let plan = if order.paid {
                    PromptPlan::say_with(
                        prompt_keys::PAYMENT_PAID,
                        PromptParams::new().with("order_id", &order.order_id),
                    )
                } else {
                    PromptPlan::say_with(
                        prompt_keys::PAYMENT_UNPAID,
                        PromptParams::new()
                            .with("order_id", &order.order_id)
                            .with("total", order.total_rubles()),
                    )
                };
                TransitionDecision::stay(plan.then(prompt_keys::ANYTHING_ELSE), "payment status")
            }
            Lookup::NotFound(id) => {
                session.awaiting = Awaiting::OrderForPayment;
                TransitionDecision::stay(
                    PromptPlan::say_with(
                        prompt_keys::ORDER_NOT_FOUND,
                        PromptParams::new().with("order_id", id),
                    ),
                    "order not found",
                )
            }
            Lookup::Failed => TransitionDecision::stay(
                PromptPlan::say(prompt_keys::ORDER_LOOKUP_FAILED),
                "order store unavailable",
            ),
            Lookup::NoNumber => {
                session.awaiting = Awaiting::OrderForPayment;
                let plan = if turn.entering {
                    PromptPlan::say(prompt_keys::PAYMENT_INTRO).then(prompt_keys::PAYMENT_ASK_ORDER)
                } else {
                    PromptPlan::say(prompt_keys::PAYMENT_ASK_ORDER)
                };
                TransitionDecision::stay(plan, "ask order for payment")
            }
        }
    }
}

#[async_trait]
impl Topic for Payment {
    fn tag(&self) -> StateTag {
        StateTag::Payment
    }

    fn questions(&self) -> &'static [IntentTag] {
        &[
            IntentTag::PaymentMethods,
            IntentTag::PaymentProblem,
            IntentTag::Refund,
        ]
    }

    fn navigate(&self, _session: &Session, turn: &Turn<'_>) -> Option<StateTag> {
        turn.intent()
            .and_then(topic_for_intent)
            .filter(|target| *target != StateTag::Payment)
    }

    async fn respond_basic(&self, session: &mut Session, turn: &Turn<'_>) -> TransitionDecision {
        if let Some(decision) = common_reply(session, turn) {
            return decision;
        }
        if turn.is_miss() {
            return not_understood(session, turn.awaiting);
        }
        Self::payment_status(session, turn).await
    }

    async fn respond_to_question(
        &self,
        session: &mut Session,
        _turn: &Turn<'_>,
        question: IntentTag,
    ) -> TransitionDecision {
        match question {
            IntentTag::PaymentProblem => {
                // Failed or double charges need an operator
                offer_escalation(session, EscalationReason::CallerRequest)
            }
            IntentTag::Refund => TransitionDecision::stay(
                PromptPlan::say(prompt_keys::PAYMENT_REFUND).then(prompt_keys::ANYTHING_ELSE),
                "refund",
            ),
            _ => TransitionDecision::stay(
                PromptPlan::say(prompt_keys::PAYMENT_METHODS).then(prompt_keys::ANYTHING_ELSE),
                "payment methods",
            ),
        }
    }
}
