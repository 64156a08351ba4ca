//! Recognition types: intents, entities and analysis results

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::transcript::Utterance;

/// Intent tags understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTag {
    Greeting,
    OrderStatus,
    OrderCancel,
    ShippingInquiry,
    DeliveryCost,
    DeliveryTime,
    DeliveryMethods,
    ShippingChange,
    PaymentInquiry,
    PaymentMethods,
    PaymentProblem,
    Refund,
    Operator,
    Complaint,
    Help,
    Affirm,
    Deny,
    Repeat,
    Goodbye,
}

impl IntentTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentTag::Greeting => "greeting",
            IntentTag::OrderStatus => "order_status",
            IntentTag::OrderCancel => "order_cancel",
            IntentTag::ShippingInquiry => "shipping_inquiry",
            IntentTag::DeliveryCost => "delivery_cost",
            IntentTag::DeliveryTime => "delivery_time",
            IntentTag::DeliveryMethods => "delivery_methods",
            IntentTag::ShippingChange => "shipping_change",
            IntentTag::PaymentInquiry => "payment_inquiry",
            IntentTag::PaymentMethods => "payment_methods",
            IntentTag::PaymentProblem => "payment_problem",
            IntentTag::Refund => "refund",
            IntentTag::Operator => "operator",
            IntentTag::Complaint => "complaint",
            IntentTag::Help => "help",
            IntentTag::Affirm => "affirm",
            IntentTag::Deny => "deny",
            IntentTag::Repeat => "repeat",
            IntentTag::Goodbye => "goodbye",
        }
    }
}

impl fmt::Display for IntentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary intent of an utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub tag: IntentTag,
    /// Match strength: priority of the winning rule. Not a probability.
    pub strength: u32,
    /// Registration index of the winning rule
    pub rule: usize,
}

/// Entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    OrderNumber,
    Product,
    PersonName,
    City,
    DigitSequence,
    Postcode,
    Street,
    House,
    Apartment,
    DeliveryMethod,
    PaymentMethod,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::OrderNumber => "order_number",
            EntityKind::Product => "product",
            EntityKind::PersonName => "person_name",
            EntityKind::City => "city",
            EntityKind::DigitSequence => "digit_sequence",
            EntityKind::Postcode => "postcode",
            EntityKind::Street => "street",
            EntityKind::House => "house",
            EntityKind::Apartment => "apartment",
            EntityKind::DeliveryMethod => "delivery_method",
            EntityKind::PaymentMethod => "payment_method",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte range in the normalized transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extracted entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    /// Canonical value (e.g. city name in nominative case, method key)
    pub value: String,
    pub span: Span,
}

/// Output of one `analyze` call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub utterance: Utterance,
    pub intent: Option<Intent>,
    pub entities: Vec<Entity>,
}

impl AnalysisResult {
    /// Nothing recognized at all
    pub fn is_miss(&self) -> bool {
        self.intent.is_none() && self.entities.is_empty()
    }

    pub fn intent_tag(&self) -> Option<IntentTag> {
        self.intent.as_ref().map(|i| i.tag)
    }

    pub fn has_intent(&self, tag: IntentTag) -> bool {
        self.intent_tag() == Some(tag)
    }

    pub fn has_entity(&self, kind: EntityKind) -> bool {
        self.entities.iter().any(|e| e.kind == kind)
    }

    /// First entity of a kind, in transcript order
    pub fn entity(&self, kind: EntityKind) -> Option<&Entity> {
        self.entities.iter().find(|e| e.kind == kind)
    }

    pub fn entity_value(&self, kind: EntityKind) -> Option<&str> {
        self.entity(kind).map(|e| e.value.as_str())
    }

    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }
}
