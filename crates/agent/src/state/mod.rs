//! Topic state machine
//!
//! One handler per support topic behind the small [`Topic`] interface:
//! `navigate` may hand the turn to another topic, otherwise `respond`
//! dispatches to `respond_to_question` for the topic's own question intents
//! and to `respond_basic` for everything else.
//!
//! [`handle`] is the single per-turn entry point. Before any topic runs it
//! folds the turn into the session (miss streak, slots) and applies the
//! rules shared by every state: the operator offer after repeated misses,
//! goodbye, operator/complaint transfers, help and repeat.

mod escalation;
mod greeting;
mod order;
mod payment;
mod shipping;
mod termination;

pub use termination::farewell_plan;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use voice_support_config::{prompt_keys, SessionConfig};
use voice_support_core::{AnalysisResult, EntityKind, IntentTag, OrderStore, SmsMessage, SmsNotifier};
use voice_support_text_processing::{PromptCatalog, PromptParams};
use voice_support_tools::{notify_detached, ShippingClient};

use crate::session::{
    bare_order_number, mentions_address, mentions_street_level, Awaiting, Ending,
    EscalationReason, Session,
};

/// Dialogue states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateTag {
    #[default]
    Greeting,
    Order,
    Shipping,
    Payment,
    /// Operator offer pending
    Escalation,
    Termination,
}

static STATE_TRANSITIONS: Lazy<HashMap<StateTag, &'static [StateTag]>> = Lazy::new(|| {
    use StateTag::*;
    let mut map = HashMap::new();
    map.insert(
        Greeting,
        &[Order, Shipping, Payment, Termination, Escalation] as &[_],
    );
    map.insert(
        Order,
        &[Shipping, Payment, Greeting, Termination, Escalation] as &[_],
    );
    map.insert(
        Shipping,
        &[Order, Payment, Greeting, Termination, Escalation] as &[_],
    );
    map.insert(
        Payment,
        &[Order, Shipping, Greeting, Termination, Escalation] as &[_],
    );
    map.insert(
        Escalation,
        &[Greeting, Order, Shipping, Payment, Termination] as &[_],
    );
    map.insert(Termination, &[] as &[_]);
    map
});

impl StateTag {
    pub fn allowed_transitions(&self) -> &'static [StateTag] {
        STATE_TRANSITIONS.get(self).copied().unwrap_or(&[])
    }

    pub fn can_transition_to(&self, target: StateTag) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Support topic the caller can be "in"
    pub fn is_topic(&self) -> bool {
        matches!(
            self,
            StateTag::Greeting | StateTag::Order | StateTag::Shipping | StateTag::Payment
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateTag::Greeting => "greeting",
            StateTag::Order => "order",
            StateTag::Shipping => "shipping",
            StateTag::Payment => "payment",
            StateTag::Escalation => "escalation",
            StateTag::Termination => "termination",
        }
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a prompt plan
#[derive(Debug, Clone, PartialEq)]
pub enum PromptStep {
    Say {
        key: &'static str,
        params: PromptParams,
    },
    /// Replay the previous turn's prompts verbatim
    RepeatLast,
}

/// Prompts to play at the start of the next turn, before listening
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptPlan {
    pub steps: Vec<PromptStep>,
}

impl PromptPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn say(key: &'static str) -> Self {
        Self::empty().then(key)
    }

    pub fn say_with(key: &'static str, params: PromptParams) -> Self {
        Self::empty().then_with(key, params)
    }

    pub fn repeat_last() -> Self {
        Self {
            steps: vec![PromptStep::RepeatLast],
        }
    }

    pub fn then(self, key: &'static str) -> Self {
        self.then_with(key, PromptParams::new())
    }

    pub fn then_with(mut self, key: &'static str, params: PromptParams) -> Self {
        self.steps.push(PromptStep::Say { key, params });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Template keys in order; `RepeatLast` shows as "repeat"
    pub fn keys(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .map(|step| match step {
                PromptStep::Say { key, .. } => *key,
                PromptStep::RepeatLast => "repeat",
            })
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys().contains(&key)
    }
}

/// Outcome of one `handle` call
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionDecision {
    /// State to enter; `None` stays
    pub target: Option<StateTag>,
    pub plan: PromptPlan,
    /// Short label for logs
    pub reason: &'static str,
}

impl TransitionDecision {
    pub fn stay(plan: PromptPlan, reason: &'static str) -> Self {
        Self {
            target: None,
            plan,
            reason,
        }
    }

    pub fn to(target: StateTag, plan: PromptPlan, reason: &'static str) -> Self {
        Self {
            target: Some(target),
            plan,
            reason,
        }
    }
}

/// Dialogue thresholds taken from the session config
#[derive(Debug, Clone, Copy)]
pub struct DialogueLimits {
    pub no_intent_threshold: u32,
    pub address_attempts: u32,
    pub personalize: bool,
}

impl From<&SessionConfig> for DialogueLimits {
    fn from(config: &SessionConfig) -> Self {
        Self {
            no_intent_threshold: config.no_intent_threshold,
            address_attempts: config.address_attempts,
            personalize: config.personalize,
        }
    }
}

/// Collaborators the topic handlers may call
#[derive(Clone)]
pub struct StateServices {
    pub orders: Arc<dyn OrderStore>,
    pub shipping: Arc<ShippingClient>,
    pub sms: Arc<dyn SmsNotifier>,
    pub catalog: Arc<PromptCatalog>,
    pub limits: DialogueLimits,
}

impl StateServices {
    /// Fire-and-forget SMS rendered from the first phrasing of `key`
    pub fn notify(&self, to: &str, key: &str, params: &PromptParams) {
        match self.catalog.render_variant(key, 0, params) {
            Ok(rendered) => {
                notify_detached(
                    self.sms.clone(),
                    SmsMessage {
                        to: to.to_string(),
                        text: rendered.text,
                    },
                );
            }
            Err(e) => tracing::warn!(key, error = %e, "SMS template failed"),
        }
    }
}

/// Everything a handler knows about the current turn
#[derive(Clone, Copy)]
pub struct Turn<'a> {
    pub analysis: &'a AnalysisResult,
    pub services: &'a StateServices,
    /// What the previous prompt asked for
    pub awaiting: Awaiting,
    /// The utterance is a free-text address attempt
    pub free_text: bool,
    /// The turn carried something the dialogue can act on
    pub recognized: bool,
    /// The topic was entered on this turn
    pub entering: bool,
}

impl Turn<'_> {
    pub fn intent(&self) -> Option<IntentTag> {
        self.analysis.intent_tag()
    }

    /// Nothing usable was heard, even if some entity matched
    pub fn is_miss(&self) -> bool {
        !self.recognized
    }
}

#[async_trait]
pub trait Topic: Send + Sync {
    fn tag(&self) -> StateTag;

    /// Question intents this topic answers itself
    fn questions(&self) -> &'static [IntentTag];

    /// Another topic that should take this turn
    fn navigate(&self, session: &Session, turn: &Turn<'_>) -> Option<StateTag>;

    async fn respond_basic(&self, session: &mut Session, turn: &Turn<'_>) -> TransitionDecision;

    async fn respond_to_question(
        &self,
        session: &mut Session,
        turn: &Turn<'_>,
        question: IntentTag,
    ) -> TransitionDecision;

    async fn respond(&self, session: &mut Session, turn: &Turn<'_>) -> TransitionDecision {
        match turn.intent() {
            Some(tag) if self.questions().contains(&tag) => {
                self.respond_to_question(session, turn, tag).await
            }
            _ => self.respond_basic(session, turn).await,
        }
    }
}

fn topic(tag: StateTag) -> Option<&'static dyn Topic> {
    match tag {
        StateTag::Greeting => Some(&greeting::Greeting),
        StateTag::Order => Some(&order::Order),
        StateTag::Shipping => Some(&shipping::Shipping),
        StateTag::Payment => Some(&payment::Payment),
        StateTag::Escalation => Some(&escalation::Escalation),
        StateTag::Termination => None,
    }
}

/// Topic that owns an intent
pub(crate) fn topic_for_intent(tag: IntentTag) -> Option<StateTag> {
    use IntentTag::*;
    match tag {
        OrderStatus | OrderCancel => Some(StateTag::Order),
        ShippingInquiry | DeliveryCost | DeliveryTime | DeliveryMethods | ShippingChange => {
            Some(StateTag::Shipping)
        }
        PaymentInquiry | PaymentMethods | PaymentProblem | Refund => Some(StateTag::Payment),
        _ => None,
    }
}

/// Whether the utterance should be taken as a free-text delivery address
///
/// Only while Shipping is waiting for an address: anything mentioning an
/// address part qualifies, as does unrecognized speech that carries no other
/// kind of slot value.
pub fn consumes_free_text(session: &Session, analysis: &AnalysisResult) -> bool {
    if session.state != StateTag::Shipping
        || session.awaiting != Awaiting::Address
        || session.slots.address.normalized
        || analysis.utterance.is_empty()
    {
        return false;
    }
    if mentions_address(analysis) {
        return true;
    }
    analysis.intent.is_none()
        && !analysis.entities.iter().any(|e| {
            matches!(
                e.kind,
                EntityKind::OrderNumber
                    | EntityKind::DeliveryMethod
                    | EntityKind::PaymentMethod
                    | EntityKind::PersonName
            )
        })
}

/// Whether the turn gives the dialogue something to act on
///
/// Any intent counts. Without one, only slot values the current topic can
/// use count: an order number (bare digits only while one was asked for), a
/// delivery method or address while shipping can use it, and a newly given
/// name. A product, a city or stray digits in the greeting are misses.
pub fn is_actionable(session: &Session, analysis: &AnalysisResult) -> bool {
    if analysis.intent.is_some() || analysis.has_entity(EntityKind::OrderNumber) {
        return true;
    }
    if session.awaiting.wants_order_number() && bare_order_number(analysis).is_some() {
        return true;
    }

    let shipping = match session.state {
        StateTag::Greeting => {
            analysis.has_entity(EntityKind::DeliveryMethod) || mentions_street_level(analysis)
        }
        StateTag::Shipping => {
            analysis.has_entity(EntityKind::DeliveryMethod)
                || (!session.slots.address.normalized && mentions_address(analysis))
        }
        _ => false,
    };
    if shipping {
        return true;
    }

    analysis
        .entity_value(EntityKind::PersonName)
        .is_some_and(|name| session.slots.caller_name.as_deref() != Some(name))
}

/// Run one turn through the state machine
pub async fn handle(
    session: &mut Session,
    analysis: &AnalysisResult,
    services: &StateServices,
) -> TransitionDecision {
    let Some(current) = topic(session.state) else {
        return TransitionDecision::stay(PromptPlan::empty(), "terminal");
    };

    let free_text = consumes_free_text(session, analysis);
    let recognized = free_text || is_actionable(session, analysis);
    session.track_recognition(recognized, free_text);
    let awaiting = std::mem::take(&mut session.awaiting);
    session.slots.absorb(analysis, awaiting, free_text);

    let turn = Turn {
        analysis,
        services,
        awaiting,
        free_text,
        recognized,
        entering: false,
    };

    // The streak already counts this turn, so the offer comes on the threshold miss itself
    if session.no_intent_streak >= services.limits.no_intent_threshold
        && session.state != StateTag::Escalation
    {
        tracing::info!(
            streak = session.no_intent_streak,
            state = %session.state,
            "Repeated misses, offering operator"
        );
        return offer_escalation(session, EscalationReason::RepeatedMisses);
    }

    if let Some(decision) = shared_navigation(session, &turn) {
        return decision;
    }

    if let Some(target) = current
        .navigate(session, &turn)
        .filter(|target| *target != session.state)
    {
        tracing::debug!(from = %current.tag(), to = %target, "Topic change");
        let Some(next) = topic(target) else {
            return TransitionDecision::to(target, PromptPlan::empty(), "navigate");
        };
        let entering = Turn {
            awaiting: Awaiting::Nothing,
            entering: true,
            ..turn
        };
        let decision = next.respond(session, &entering).await;
        return TransitionDecision {
            target: decision.target.or(Some(target)),
            ..decision
        };
    }

    current.respond(session, &turn).await
}

/// Rules that apply in every state
fn shared_navigation(session: &mut Session, turn: &Turn<'_>) -> Option<TransitionDecision> {
    match turn.intent()? {
        IntentTag::Goodbye => Some(goodbye(session)),
        IntentTag::Operator => Some(transfer(session, EscalationReason::CallerRequest)),
        IntentTag::Complaint => Some(transfer(session, EscalationReason::Complaint)),
        IntentTag::Help => {
            session.awaiting = turn.awaiting;
            Some(TransitionDecision::stay(
                PromptPlan::say(prompt_keys::HELP),
                "help",
            ))
        }
        IntentTag::Repeat => {
            session.awaiting = turn.awaiting;
            Some(TransitionDecision::stay(PromptPlan::repeat_last(), "repeat"))
        }
        _ => None,
    }
}

/// Replies every topic gives to yes/no/hello when nothing was asked
fn common_reply(session: &mut Session, turn: &Turn<'_>) -> Option<TransitionDecision> {
    if turn.awaiting != Awaiting::Nothing {
        return None;
    }
    match turn.intent()? {
        IntentTag::Deny => Some(goodbye(session)),
        IntentTag::Affirm | IntentTag::Greeting => Some(TransitionDecision::to(
            StateTag::Greeting,
            PromptPlan::say(prompt_keys::GREETING_AGAIN),
            "restart",
        )),
        _ => None,
    }
}

/// "Not understood", followed by the pending question if there was one
fn not_understood(session: &mut Session, awaiting: Awaiting) -> TransitionDecision {
    let plan = PromptPlan::say(prompt_keys::NOT_UNDERSTOOD);
    let plan = match awaiting {
        Awaiting::Nothing => plan,
        Awaiting::OrderNumber => plan.then(prompt_keys::ORDER_ASK_NUMBER),
        Awaiting::Address => plan.then(prompt_keys::SHIPPING_ASK_ADDRESS),
        Awaiting::DeliveryMethod => plan.then(prompt_keys::SHIPPING_ASK_METHOD),
        Awaiting::OrderForPayment => plan.then(prompt_keys::PAYMENT_ASK_ORDER),
    };
    session.awaiting = awaiting;
    TransitionDecision::stay(plan, "not understood")
}

fn goodbye(session: &mut Session) -> TransitionDecision {
    session.ending = Some(Ending::Goodbye);
    TransitionDecision::to(StateTag::Termination, PromptPlan::empty(), "goodbye")
}

fn transfer(session: &mut Session, reason: EscalationReason) -> TransitionDecision {
    tracing::info!(reason = reason.as_str(), state = %session.state, "Transferring to operator");
    session.ending = Some(Ending::Transferred(reason));
    TransitionDecision::to(StateTag::Termination, PromptPlan::empty(), reason.as_str())
}

fn offer_escalation(session: &mut Session, reason: EscalationReason) -> TransitionDecision {
    session.escalation_reason = Some(reason);
    TransitionDecision::to(
        StateTag::Escalation,
        PromptPlan::say(prompt_keys::ESCALATION_OFFER),
        "offer operator",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{heard, services};

    fn session_in(state: StateTag) -> Session {
        let mut session = Session::new("+79990000000");
        session.enter(state);
        session
    }

    #[test]
    fn test_transition_table() {
        use StateTag::*;
        assert!(Greeting.can_transition_to(Order));
        assert!(Order.can_transition_to(Shipping));
        assert!(Shipping.can_transition_to(Order));
        assert!(Shipping.can_transition_to(Payment));
        assert!(Payment.can_transition_to(Order));
        assert!(Escalation.can_transition_to(Greeting));
        assert!(!Order.can_transition_to(Order));
        assert!(!Escalation.can_transition_to(Escalation));
        for state in [Greeting, Order, Shipping, Payment, Escalation] {
            assert!(state.can_transition_to(Termination), "{} -> termination", state);
        }
        assert!(Termination.allowed_transitions().is_empty());
    }

    #[test]
    fn test_topic_tags() {
        for tag in [
            StateTag::Greeting,
            StateTag::Order,
            StateTag::Shipping,
            StateTag::Payment,
            StateTag::Escalation,
        ] {
            assert_eq!(topic(tag).map(|t| t.tag()), Some(tag));
        }
        assert!(topic(StateTag::Termination).is_none());
    }

    #[tokio::test]
    async fn test_three_misses_offer_operator_in_any_state() {
        let services = services();
        for state in [StateTag::Greeting, StateTag::Order, StateTag::Shipping, StateTag::Payment] {
            let mut session = session_in(state);
            let silence = heard("");

            for _ in 0..2 {
                let decision = handle(&mut session, &silence, &services).await;
                assert!(!decision.plan.contains(prompt_keys::ESCALATION_OFFER));
            }
            let decision = handle(&mut session, &silence, &services).await;
            assert_eq!(decision.target, Some(StateTag::Escalation), "from {}", state);
            assert!(decision.plan.contains(prompt_keys::ESCALATION_OFFER));
            assert_eq!(session.escalation_reason, Some(EscalationReason::RepeatedMisses));
        }
    }

    #[tokio::test]
    async fn test_unused_entities_count_as_misses() {
        let services = services();
        let mut session = session_in(StateTag::Greeting);
        let product = heard("ноутбук");
        assert!(!product.entities.is_empty());
        assert!(product.intent.is_none());

        let decision = handle(&mut session, &product, &services).await;
        assert_eq!(decision.plan.keys(), vec![prompt_keys::NOT_UNDERSTOOD]);
        handle(&mut session, &product, &services).await;
        let decision = handle(&mut session, &product, &services).await;
        assert_eq!(decision.target, Some(StateTag::Escalation));
        assert_eq!(decision.plan.keys(), vec![prompt_keys::ESCALATION_OFFER]);
        assert_eq!(session.escalation_reason, Some(EscalationReason::RepeatedMisses));
    }

    #[test]
    fn test_actionable_turns() {
        let mut session = session_in(StateTag::Greeting);
        assert!(is_actionable(&session, &heard("№12345")));
        assert!(is_actionable(&session, &heard("курьером")));
        assert!(!is_actionable(&session, &heard("12345")));
        assert!(!is_actionable(&session, &heard("")));

        session.awaiting = Awaiting::OrderNumber;
        assert!(is_actionable(&session, &heard("12345")));

        let name = heard("меня зовут Анна");
        session.awaiting = Awaiting::Nothing;
        assert!(is_actionable(&session, &name));
        session.slots.absorb(&name, Awaiting::Nothing, false);
        assert!(!is_actionable(&session, &name));
    }

    #[tokio::test]
    async fn test_recognized_turn_resets_streak() {
        let services = services();
        let mut session = session_in(StateTag::Greeting);
        handle(&mut session, &heard("ммм"), &services).await;
        handle(&mut session, &heard("ммм"), &services).await;
        handle(&mut session, &heard("здравствуйте"), &services).await;
        assert_eq!(session.no_intent_streak, 0);
        let decision = handle(&mut session, &heard("ммм"), &services).await;
        assert_ne!(decision.target, Some(StateTag::Escalation));
    }

    #[tokio::test]
    async fn test_goodbye_from_any_state() {
        let services = services();
        for state in [
            StateTag::Greeting,
            StateTag::Order,
            StateTag::Shipping,
            StateTag::Payment,
            StateTag::Escalation,
        ] {
            let mut session = session_in(state);
            let decision = handle(&mut session, &heard("До свидания"), &services).await;
            assert_eq!(decision.target, Some(StateTag::Termination));
            assert_eq!(session.ending, Some(Ending::Goodbye));
        }
    }

    #[tokio::test]
    async fn test_operator_and_complaint_transfer() {
        let services = services();
        let mut session = session_in(StateTag::Order);
        let decision = handle(&mut session, &heard("соедините с оператором"), &services).await;
        assert_eq!(decision.target, Some(StateTag::Termination));
        assert_eq!(
            session.ending,
            Some(Ending::Transferred(EscalationReason::CallerRequest))
        );

        let mut session = session_in(StateTag::Payment);
        handle(&mut session, &heard("хочу оставить жалобу"), &services).await;
        assert_eq!(
            session.ending,
            Some(Ending::Transferred(EscalationReason::Complaint))
        );
    }

    #[tokio::test]
    async fn test_help_and_repeat_keep_pending_question() {
        let services = services();
        let mut session = session_in(StateTag::Order);
        session.awaiting = Awaiting::OrderNumber;

        let decision = handle(&mut session, &heard("повторите пожалуйста"), &services).await;
        assert_eq!(decision.plan, PromptPlan::repeat_last());
        assert_eq!(session.awaiting, Awaiting::OrderNumber);

        let decision = handle(&mut session, &heard("что вы умеете"), &services).await;
        assert!(decision.plan.contains(prompt_keys::HELP));
        assert_eq!(session.awaiting, Awaiting::OrderNumber);
    }

    #[tokio::test]
    async fn test_terminal_state_is_inert() {
        let services = services();
        let mut session = session_in(StateTag::Termination);
        let decision = handle(&mut session, &heard("где мой заказ"), &services).await;
        assert_eq!(decision.target, None);
        assert!(decision.plan.is_empty());
    }

    #[test]
    fn test_free_text_only_when_waiting_for_address() {
        let mut session = session_in(StateTag::Shipping);
        let text = heard("где-то за рекой");
        assert!(!consumes_free_text(&session, &text));

        session.awaiting = Awaiting::Address;
        assert!(consumes_free_text(&session, &text));
        assert!(consumes_free_text(&session, &heard("москва мясницкая 1")));
        assert!(!consumes_free_text(&session, &heard("курьером")));
        assert!(!consumes_free_text(&session, &heard("")));
        assert!(!consumes_free_text(&session, &heard("как можно оплатить")));
    }

    #[test]
    fn test_intent_topics() {
        assert_eq!(topic_for_intent(IntentTag::DeliveryTime), Some(StateTag::Shipping));
        assert_eq!(topic_for_intent(IntentTag::Refund), Some(StateTag::Payment));
        assert_eq!(topic_for_intent(IntentTag::OrderCancel), Some(StateTag::Order));
        assert_eq!(topic_for_intent(IntentTag::Affirm), None);
    }
}
