//! Order: status and cancellation questions

use async_trait::async_trait;
use voice_support_config::prompt_keys;
use voice_support_core::{IntentTag, OrderStatus, StoreError};
use voice_support_text_processing::PromptParams;

use super::{
    common_reply, not_understood, topic_for_intent, transfer, PromptPlan, StateServices, StateTag,
    Topic, TransitionDecision, Turn,
};
use crate::session::{Awaiting, EscalationReason, Session};

pub(super) struct Order;

/// Result of resolving the session's order number
pub(super) enum Lookup {
    Found(OrderStatus),
    NotFound(String),
    Failed,
    NoNumber,
}

/// Read the current order, reusing the snapshot when the number is unchanged
pub(super) async fn lookup_order(session: &mut Session, services: &StateServices) -> Lookup {
    let Some(id) = session.slots.order_id.clone() else {
        return Lookup::NoNumber;
    };
    if let Some(order) = session
        .slots
        .last_order
        .as_ref()
        .filter(|order| order.order_id == id)
    {
        return Lookup::Found(order.clone());
    }

    match services.orders.get_order(&id).await {
        Ok(Some(order)) => {
            tracing::debug!(order_id = %id, state = ?order.state, "Order found");
            session.slots.last_order = Some(order.clone());
            Lookup::Found(order)
        }
        Ok(None) | Err(StoreError::InvalidId(_)) => {
            tracing::info!(order_id = %id, "Order not found");
            session.slots.order_id = None;
            Lookup::NotFound(id)
        }
        Err(e) => {
            tracing::warn!(order_id = %id, error = %e, "Order lookup failed");
            Lookup::Failed
        }
    }
}

fn status_params(order: &OrderStatus) -> PromptParams {
    PromptParams::new()
        .with("order_id", &order.order_id)
        .with("status", order.state.spoken())
}

impl Order {
    fn ask_number(session: &mut Session, turn: &Turn<'_>) -> TransitionDecision {
        session.awaiting = Awaiting::OrderNumber;
        let key = if turn.entering {
            prompt_keys::ORDER_INTRO
        } else {
            prompt_keys::ORDER_ASK_NUMBER
        };
        TransitionDecision::stay(PromptPlan::say(key), "ask order number")
    }

    async fn answer(
        session: &mut Session,
        turn: &Turn<'_>,
        question: IntentTag,
    ) -> TransitionDecision {
        let order = match lookup_order(session, turn.services).await {
            Lookup::Found(order) => order,
            Lookup::NotFound(id) => {
                session.awaiting = Awaiting::OrderNumber;
                session.pending_question = Some(question);
                return TransitionDecision::stay(
                    PromptPlan::say_with(
                        prompt_keys::ORDER_NOT_FOUND,
                        PromptParams::new().with("order_id", id),
                    ),
                    "order not found",
                );
            }
            Lookup::Failed => {
                return TransitionDecision::stay(
                    PromptPlan::say(prompt_keys::ORDER_LOOKUP_FAILED),
                    "order store unavailable",
                )
            }
            Lookup::NoNumber => {
                session.pending_question = Some(question);
                return Self::ask_number(session, turn);
            }
        };

        if question == IntentTag::OrderCancel {
            // Cancellation itself is done by an operator
            if order.state.is_cancellable() {
                return transfer(session, EscalationReason::CallerRequest);
            }
            return TransitionDecision::stay(
                PromptPlan::say_with(prompt_keys::ORDER_CANCEL_DENIED, status_params(&order))
                    .then(prompt_keys::ANYTHING_ELSE),
                "cancel denied",
            );
        }

        let mut plan = PromptPlan::say_with(prompt_keys::ORDER_STATUS, status_params(&order));
        if let Some(eta) = &order.eta {
            plan = plan.then_with(prompt_keys::ORDER_ETA, PromptParams::new().with("eta", eta));
        }
        turn.services.notify(
            &session.caller,
            prompt_keys::SMS_ORDER_STATUS,
            &status_params(&order),
        );
        TransitionDecision::stay(plan.then(prompt_keys::ORDER_FOLLOWUP), "order status")
    }
}

#[async_trait]
impl Topic for Order {
    fn tag(&self) -> StateTag {
        StateTag::Order
    }

    fn questions(&self) -> &'static [IntentTag] {
        &[IntentTag::OrderStatus, IntentTag::OrderCancel]
    }

    fn navigate(&self, _session: &Session, turn: &Turn<'_>) -> Option<StateTag> {
        turn.intent()
            .and_then(topic_for_intent)
            .filter(|target| *target != StateTag::Order)
    }

    /// Restate the status of the known order, or ask for its number
    async fn respond_basic(&self, session: &mut Session, turn: &Turn<'_>) -> TransitionDecision {
        if let Some(decision) = common_reply(session, turn) {
            return decision;
        }
        if turn.is_miss() {
            return not_understood(session, turn.awaiting);
        }
        if session.slots.order_id.is_none() {
            return Self::ask_number(session, turn);
        }
        let question = session
            .pending_question
            .take()
            .unwrap_or(IntentTag::OrderStatus);
        Self::answer(session, turn, question).await
    }

    async fn respond_to_question(
        &self,
        session: &mut Session,
        turn: &Turn<'_>,
        question: IntentTag,
    ) -> TransitionDecision {
        session.pending_question = None;
        Self::answer(session, turn, question).await
    }
}
