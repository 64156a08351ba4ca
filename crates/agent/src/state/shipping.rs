//! Shipping: address collection, delivery methods and quotes
//!
//! The address is collected first and normalized through the carrier; only
//! then is a delivery method asked for and a quote computed. A failed
//! normalization is a valid attempt, not a miss: it counts toward
//! `address_attempts` instead of the no-intent streak.

use async_trait::async_trait;
use voice_support_config::prompt_keys;
use voice_support_core::{DeliveryQuote, IntentTag};
use voice_support_text_processing::PromptParams;
use voice_support_tools::ShippingError;

use super::{
    common_reply, not_understood, topic_for_intent, transfer, PromptPlan, StateTag, Topic,
    TransitionDecision, Turn,
};
use crate::session::{mentions_street_level, Awaiting, EscalationReason, Session};

pub(super) struct Shipping;

fn quote_params(quote: &DeliveryQuote) -> PromptParams {
    PromptParams::new()
        .with("method", quote.method.spoken())
        .with("cost", quote.cost_rubles().to_string())
        .with("days", quote.days_text())
}

impl Shipping {
    fn ask_address(session: &mut Session, turn: &Turn<'_>, plan: PromptPlan) -> TransitionDecision {
        session.awaiting = Awaiting::Address;
        let key = if turn.entering && plan.is_empty() {
            prompt_keys::SHIPPING_INTRO
        } else {
            prompt_keys::SHIPPING_ASK_ADDRESS
        };
        TransitionDecision::stay(plan.then(key), "ask address")
    }

    /// Move the caller one step closer to a quote
    async fn progress(session: &mut Session, turn: &Turn<'_>, plan: PromptPlan) -> TransitionDecision {
        let mut plan = plan;

        if !session.slots.address.normalized {
            let attempt = (turn.free_text || mentions_street_level(turn.analysis))
                && !session.slots.address.line.is_empty();
            if !attempt {
                return Self::ask_address(session, turn, plan);
            }

            let line = session.slots.address.line.clone();
            match turn.services.shipping.normalize_address(&line).await {
                Ok(address) => {
                    session.address_failures = 0;
                    plan = plan.then_with(
                        prompt_keys::SHIPPING_ADDRESS_CONFIRMED,
                        PromptParams::new().with("address", address.text()),
                    );
                    session.slots.address = address;
                }
                Err(ShippingError::Unavailable { attempts, message }) => {
                    tracing::warn!(attempts, error = %message, "Carrier unavailable during address cleanup");
                    return TransitionDecision::stay(
                        plan.then(prompt_keys::SHIPPING_QUOTE_UNAVAILABLE),
                        "carrier unavailable",
                    );
                }
                Err(e) => {
                    session.address_failures += 1;
                    tracing::info!(
                        failures = session.address_failures,
                        error = %e,
                        "Address not normalized"
                    );
                    if session.address_failures >= turn.services.limits.address_attempts {
                        return transfer(session, EscalationReason::AddressUnresolved);
                    }
                    session.awaiting = Awaiting::Address;
                    return TransitionDecision::stay(
                        plan.then(prompt_keys::SHIPPING_ADDRESS_NOT_FOUND),
                        "address not found",
                    );
                }
            }
        }

        let Some(method) = session.slots.delivery_method else {
            session.awaiting = Awaiting::DeliveryMethod;
            return TransitionDecision::stay(
                plan.then(prompt_keys::SHIPPING_ASK_METHOD),
                "ask delivery method",
            );
        };

        let address = &session.slots.address;
        let quote = match session.last_quote.as_ref().filter(|q| q.is_for(address, method)) {
            Some(cached) => cached.clone(),
            None => match turn.services.shipping.quote(address, method).await {
                Ok(quote) => {
                    turn.services.notify(
                        &session.caller,
                        prompt_keys::SMS_QUOTE,
                        &quote_params(&quote).with("address", &quote.address_text),
                    );
                    session.last_quote = Some(quote.clone());
                    quote
                }
                Err(ShippingError::NotNormalized) => {
                    return Self::ask_address(session, turn, plan);
                }
                Err(e) => {
                    tracing::warn!(error = %e, method = method.as_str(), "Quote failed");
                    return TransitionDecision::stay(
                        plan.then(prompt_keys::SHIPPING_QUOTE_UNAVAILABLE),
                        "quote unavailable",
                    );
                }
            },
        };

        TransitionDecision::stay(
            plan.then_with(prompt_keys::SHIPPING_QUOTE, quote_params(&quote))
                .then(prompt_keys::ANYTHING_ELSE),
            "quote",
        )
    }

    fn methods(session: &mut Session) -> TransitionDecision {
        let plan = PromptPlan::say(prompt_keys::SHIPPING_METHODS);
        if session.slots.address.normalized && session.slots.delivery_method.is_none() {
            session.awaiting = Awaiting::DeliveryMethod;
            return TransitionDecision::stay(plan.then(prompt_keys::SHIPPING_ASK_METHOD), "methods");
        }
        TransitionDecision::stay(plan.then(prompt_keys::ANYTHING_ELSE), "methods")
    }

    async fn change_address(session: &mut Session, turn: &Turn<'_>) -> TransitionDecision {
        tracing::debug!(previous = %session.slots.address.line, "Caller changes address");
        session.slots.address = Default::default();
        session.last_quote = None;
        session.address_failures = 0;

        if mentions_street_level(turn.analysis) {
            session.slots.absorb(turn.analysis, Awaiting::Address, false);
            return Self::progress(session, turn, PromptPlan::empty()).await;
        }
        session.awaiting = Awaiting::Address;
        TransitionDecision::stay(PromptPlan::say(prompt_keys::SHIPPING_CHANGE), "change address")
    }
}

#[async_trait]
impl Topic for Shipping {
    fn tag(&self) -> StateTag {
        StateTag::Shipping
    }

    fn questions(&self) -> &'static [IntentTag] {
        &[
            IntentTag::DeliveryCost,
            IntentTag::DeliveryTime,
            IntentTag::DeliveryMethods,
            IntentTag::ShippingChange,
        ]
    }

    fn navigate(&self, _session: &Session, turn: &Turn<'_>) -> Option<StateTag> {
        turn.intent()
            .and_then(topic_for_intent)
            .filter(|target| *target != StateTag::Shipping)
    }

    async fn respond_basic(&self, session: &mut Session, turn: &Turn<'_>) -> TransitionDecision {
        if turn.free_text {
            return Self::progress(session, turn, PromptPlan::empty()).await;
        }
        if let Some(decision) = common_reply(session, turn) {
            return decision;
        }
        if turn.is_miss() {
            return not_understood(session, turn.awaiting);
        }
        Self::progress(session, turn, PromptPlan::empty()).await
    }

    async fn respond_to_question(
        &self,
        session: &mut Session,
        turn: &Turn<'_>,
        question: IntentTag,
    ) -> TransitionDecision {
        match question {
            IntentTag::DeliveryMethods => Self::methods(session),
            IntentTag::ShippingChange => Self::change_address(session, turn).await,
            IntentTag::DeliveryTime => {
                // Known order with an expected date answers "when" directly
                let eta = session
                    .slots
                    .last_order
                    .as_ref()
                    .and_then(|order| order.eta.clone());
                match eta {
                    Some(eta) if !turn.free_text && !mentions_street_level(turn.analysis) => {
                        TransitionDecision::stay(
                            PromptPlan::say_with(
                                prompt_keys::ORDER_ETA,
                                PromptParams::new().with("eta", eta),
                            )
                            .then(prompt_keys::ANYTHING_ELSE),
                            "order eta",
                        )
                    }
                    _ => Self::progress(session, turn, PromptPlan::empty()).await,
                }
            }
            _ => Self::progress(session, turn, PromptPlan::empty()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::handle;
    use crate::testing::{heard, services, services_with, FakeCarrier, RecordingSms};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use voice_support_core::DeliveryMethod;

    fn waiting_for_address() -> Session {
        let mut session = Session::new("+79990000000");
        session.enter(StateTag::Shipping);
        session.awaiting = Awaiting::Address;
        session
    }

    #[tokio::test]
    async fn test_entering_asks_for_address() {
        let services = services();
        let mut session = Session::new("c");
        let decision = handle(&mut session, &heard("сколько стоит доставка"), &services).await;
        assert_eq!(decision.target, Some(StateTag::Shipping));
        assert_eq!(decision.plan.keys(), vec![prompt_keys::SHIPPING_INTRO]);
        assert_eq!(session.awaiting, Awaiting::Address);
    }

    #[tokio::test]
    async fn test_unrecognized_address_is_not_a_miss() {
        let carrier = Arc::new(FakeCarrier::default());
        let services = services_with(carrier.clone(), Arc::new(RecordingSms::default()));
        let mut session = waiting_for_address();
        session.no_intent_streak = 1;

        let decision = handle(&mut session, &heard("где-то за рекой у моста"), &services).await;
        assert_eq!(decision.target, None);
        assert_eq!(decision.plan.keys(), vec![prompt_keys::SHIPPING_ADDRESS_NOT_FOUND]);
        assert_eq!(session.no_intent_streak, 1);
        assert_eq!(session.address_failures, 1);
        assert_eq!(session.awaiting, Awaiting::Address);
        assert_eq!(carrier.clean_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unresolved_address_transfers() {
        let services = services();
        let mut session = waiting_for_address();

        for attempt in ["за рекой", "у моста", "возле леса"] {
            let decision = handle(&mut session, &heard(attempt), &services).await;
            if session.address_failures < 3 {
                assert_eq!(decision.target, None);
            } else {
                assert_eq!(decision.target, Some(StateTag::Termination));
            }
        }
        assert_eq!(
            session.ending.and_then(|e| e.escalation()),
            Some(EscalationReason::AddressUnresolved)
        );
        assert_eq!(session.no_intent_streak, 0);
    }

    #[tokio::test]
    async fn test_address_then_method_then_quote() {
        let sms = Arc::new(RecordingSms::default());
        let carrier = Arc::new(FakeCarrier::default());
        let services = services_with(carrier.clone(), sms.clone());
        let mut session = waiting_for_address();

        let decision = handle(&mut session, &heard("москва мясницкая 1"), &services).await;
        assert_eq!(
            decision.plan.keys(),
            vec![prompt_keys::SHIPPING_ADDRESS_CONFIRMED, prompt_keys::SHIPPING_ASK_METHOD]
        );
        assert!(session.slots.address.normalized);
        assert_eq!(session.slots.address.postcode.as_deref(), Some("101000"));
        assert_eq!(session.awaiting, Awaiting::DeliveryMethod);

        let decision = handle(&mut session, &heard("курьером"), &services).await;
        assert_eq!(
            decision.plan.keys(),
            vec![prompt_keys::SHIPPING_QUOTE, prompt_keys::ANYTHING_ELSE]
        );
        let quote = session.last_quote.clone().expect("quote stored");
        assert_eq!(quote.method, DeliveryMethod::Courier);
        assert_eq!(quote.cost_rubles(), 350);

        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(sms.sent.lock().len(), 1);

        // same address and method: no second tariff call
        let decision = handle(&mut session, &heard("сколько стоит доставка"), &services).await;
        assert!(decision.plan.contains(prompt_keys::SHIPPING_QUOTE));
        assert_eq!(carrier.tariff_calls.load(Ordering::SeqCst), 1);

        // another method is quoted again
        handle(&mut session, &heard("а экспресс"), &services).await;
        assert_eq!(carrier.tariff_calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.last_quote.map(|q| q.cost_rubles()), Some(900));
    }

    #[tokio::test]
    async fn test_carrier_down_offers_to_continue() {
        let carrier = Arc::new(FakeCarrier::default());
        carrier.down.store(true, Ordering::SeqCst);
        let services = services_with(carrier.clone(), Arc::new(RecordingSms::default()));
        let mut session = waiting_for_address();

        let decision = handle(&mut session, &heard("москва мясницкая 1"), &services).await;
        assert_eq!(decision.plan.keys(), vec![prompt_keys::SHIPPING_QUOTE_UNAVAILABLE]);
        assert_eq!(session.address_failures, 0);
        assert_eq!(carrier.clean_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_change_address_drops_quote() {
        let services = services();
        let mut session = waiting_for_address();
        handle(&mut session, &heard("москва мясницкая 1"), &services).await;
        handle(&mut session, &heard("почтой"), &services).await;
        assert!(session.last_quote.is_some());

        let decision = handle(&mut session, &heard("хочу сменить адрес"), &services).await;
        assert_eq!(decision.plan.keys(), vec![prompt_keys::SHIPPING_CHANGE]);
        assert!(!session.slots.address.normalized);
        assert!(session.last_quote.is_none());
        assert_eq!(session.slots.delivery_method, Some(DeliveryMethod::Post));
        assert_eq!(session.awaiting, Awaiting::Address);
    }

    #[tokio::test]
    async fn test_methods_question() {
        let services = services();
        let mut session = Session::new("c");
        session.enter(StateTag::Shipping);
        let decision = handle(&mut session, &heard("какие есть способы доставки"), &services).await;
        assert_eq!(
            decision.plan.keys(),
            vec![prompt_keys::SHIPPING_METHODS, prompt_keys::ANYTHING_ELSE]
        );
    }
}
