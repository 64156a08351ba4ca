//! Per-call session data
//!
//! Owned exclusively by one `SessionContext`; created on call start, mutated
//! once per turn and handed back in the session report when the call ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use voice_support_core::{
    Address, AnalysisResult, DeliveryMethod, DeliveryQuote, Entity, EntityKind, IntentTag,
    OrderStatus, Span,
};

use crate::state::StateTag;

/// Why a call is handed to an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    RepeatedMisses,
    CallerRequest,
    Complaint,
    AddressUnresolved,
    ProviderFailure,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::RepeatedMisses => "repeated_misses",
            EscalationReason::CallerRequest => "caller_request",
            EscalationReason::Complaint => "complaint",
            EscalationReason::AddressUnresolved => "address_unresolved",
            EscalationReason::ProviderFailure => "provider_failure",
        }
    }
}

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Ending {
    Goodbye,
    TurnLimit,
    TimeLimit,
    Transferred(EscalationReason),
}

impl Ending {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ending::Goodbye => "goodbye",
            Ending::TurnLimit => "turn_limit",
            Ending::TimeLimit => "time_limit",
            Ending::Transferred(_) => "transferred",
        }
    }

    pub fn escalation(&self) -> Option<EscalationReason> {
        match self {
            Ending::Transferred(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// What the last prompt asked the caller for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Awaiting {
    #[default]
    Nothing,
    OrderNumber,
    Address,
    DeliveryMethod,
    OrderForPayment,
}

impl Awaiting {
    pub(crate) fn wants_order_number(&self) -> bool {
        matches!(self, Awaiting::OrderNumber | Awaiting::OrderForPayment)
    }
}

const ADDRESS_PARTS: [EntityKind; 5] = [
    EntityKind::City,
    EntityKind::Postcode,
    EntityKind::Street,
    EntityKind::House,
    EntityKind::Apartment,
];

/// Whether the utterance carries any part of an address
pub fn mentions_address(analysis: &AnalysisResult) -> bool {
    ADDRESS_PARTS.iter().any(|kind| analysis.has_entity(*kind))
}

/// Caller data accumulated over the call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotData {
    pub address: Address,
    pub delivery_method: Option<DeliveryMethod>,
    pub order_id: Option<String>,
    pub caller_name: Option<String>,
    /// Snapshot of the last order read from the store
    pub last_order: Option<OrderStatus>,
}

impl SlotData {
    /// Fold one turn's entities into the slots
    ///
    /// Bare digit runs count as an order number only while one was asked
    /// for. Address parts are only taken while the address is not yet
    /// normalized; `free_text` makes the whole utterance the address line.
    pub fn absorb(&mut self, analysis: &AnalysisResult, awaiting: Awaiting, free_text: bool) {
        if let Some(name) = analysis.entity_value(EntityKind::PersonName) {
            self.caller_name = Some(name.to_string());
        }

        let order = analysis.entity(EntityKind::OrderNumber).or_else(|| {
            awaiting
                .wants_order_number()
                .then(|| bare_order_number(analysis))
                .flatten()
        });
        let order_span = order.map(|e| e.span);
        if let Some(id) = order.map(|e| e.value.as_str()) {
            if self.order_id.as_deref() != Some(id) {
                self.last_order = None;
            }
            self.order_id = Some(id.to_string());
        }

        if let Some(method) = analysis
            .entity_value(EntityKind::DeliveryMethod)
            .and_then(DeliveryMethod::from_key)
        {
            self.delivery_method = Some(method);
        }

        if self.address.normalized {
            return;
        }
        let address = &mut self.address;
        for entity in &analysis.entities {
            if order_span.is_some_and(|span| overlaps(span, entity.span)) {
                continue;
            }
            let value = Some(entity.value.clone());
            match entity.kind {
                EntityKind::City => address.city = value,
                EntityKind::Postcode => address.postcode = value,
                EntityKind::Street => address.street = value,
                EntityKind::House => address.house = value,
                EntityKind::Apartment => address.apartment = value,
                _ => {}
            }
        }
        if free_text || mentions_street_level(analysis) {
            let utterance = &analysis.utterance;
            let line = if utterance.raw.trim().is_empty() {
                &utterance.normalized
            } else {
                &utterance.raw
            };
            address.line = line.trim().to_string();
        }
    }

    /// Flat view for operator handoff
    pub fn summary(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if !self.address.line.is_empty() {
            out.insert("address".to_string(), self.address.text());
            out.insert(
                "address_normalized".to_string(),
                self.address.normalized.to_string(),
            );
        }
        if let Some(city) = &self.address.city {
            out.insert("city".to_string(), city.clone());
        }
        if let Some(method) = self.delivery_method {
            out.insert("delivery_method".to_string(), method.as_str().to_string());
        }
        if let Some(id) = &self.order_id {
            out.insert("order_id".to_string(), id.clone());
        }
        if let Some(order) = &self.last_order {
            out.insert("order_state".to_string(), order.state.spoken().to_string());
        }
        if let Some(name) = &self.caller_name {
            out.insert("caller_name".to_string(), name.clone());
        }
        out
    }
}

/// Street, house or postcode: enough to try the carrier
pub fn mentions_street_level(analysis: &AnalysisResult) -> bool {
    [EntityKind::Street, EntityKind::House, EntityKind::Postcode]
        .iter()
        .any(|kind| analysis.has_entity(*kind))
}

pub(crate) fn bare_order_number(analysis: &AnalysisResult) -> Option<&Entity> {
    analysis
        .entities_of(EntityKind::DigitSequence)
        .find(|e| (3..=12).contains(&e.value.len()))
}

fn overlaps(a: Span, b: Span) -> bool {
    a.start < b.end && b.start < a.end
}

/// One active call
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub caller: String,
    pub state: StateTag,
    /// Last topic state the caller was in (never Escalation or Termination)
    pub last_topic: StateTag,
    pub slots: SlotData,
    /// Completed speak/listen exchanges; never decreases
    pub turns: u32,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
    /// Consecutive turns with nothing recognized
    pub no_intent_streak: u32,
    /// Failed address normalizations since the last success
    pub address_failures: u32,
    pub awaiting: Awaiting,
    /// Question to answer once the missing slot arrives
    pub pending_question: Option<IntentTag>,
    /// Last quote, reused only while it matches address and method
    pub last_quote: Option<DeliveryQuote>,
    /// Reason behind a pending operator offer
    pub escalation_reason: Option<EscalationReason>,
    pub ending: Option<Ending>,
}

impl Session {
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            caller: caller.into(),
            state: StateTag::Greeting,
            last_topic: StateTag::Greeting,
            slots: SlotData::default(),
            turns: 0,
            started: Instant::now(),
            started_at: Utc::now(),
            no_intent_streak: 0,
            address_failures: 0,
            awaiting: Awaiting::Nothing,
            pending_question: None,
            last_quote: None,
            escalation_reason: None,
            ending: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Make `target` current
    pub fn enter(&mut self, target: StateTag) {
        if target.is_topic() {
            self.last_topic = target;
        }
        if target != StateTag::Escalation {
            self.escalation_reason = None;
        }
        self.state = target;
    }

    /// Update the miss streak for one turn
    ///
    /// A turn consumed as a free-text address is a valid attempt and leaves
    /// the streak as it was.
    pub fn track_recognition(&mut self, recognized: bool, free_text: bool) {
        if free_text {
            return;
        }
        if recognized {
            self.no_intent_streak = 0;
        } else {
            self.no_intent_streak += 1;
        }
    }

    /// Caller name when prompts may use it
    pub fn name_for_prompts(&self, personalize: bool) -> Option<&str> {
        self.slots
            .caller_name
            .as_deref()
            .filter(|_| personalize)
    }
}
