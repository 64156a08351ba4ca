//! Addresses, delivery methods and quotes

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the parcel reaches the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Courier,
    Pickup,
    Post,
    Express,
}

impl DeliveryMethod {
    pub const ALL: [DeliveryMethod; 4] = [
        DeliveryMethod::Courier,
        DeliveryMethod::Pickup,
        DeliveryMethod::Post,
        DeliveryMethod::Express,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Courier => "courier",
            DeliveryMethod::Pickup => "pickup",
            DeliveryMethod::Post => "post",
            DeliveryMethod::Express => "express",
        }
    }

    /// Parse the canonical key stored in entity values and slots
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == key)
    }

    /// Phrase used inside prompts ("доставка курьером")
    pub fn spoken(&self) -> &'static str {
        match self {
            DeliveryMethod::Courier => "курьером",
            DeliveryMethod::Pickup => "в пункт выдачи",
            DeliveryMethod::Post => "почтой",
            DeliveryMethod::Express => "экспресс-доставкой",
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery address accumulated over the call
///
/// Only the Shipping Client sets `normalized`; a quote may only be requested
/// for a normalized address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    /// Free-text line as spoken, or the canonical line once normalized
    pub line: String,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub region: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub apartment: Option<String>,
    pub normalized: bool,
}

impl Address {
    /// Unnormalized address from caller speech
    pub fn from_free_text(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            ..Default::default()
        }
    }

    /// Text form of the address
    ///
    /// For a normalized address this is the canonical carrier form
    /// ("101000, Москва, ул. Мясницкая, д. 1, кв. 2"), which normalizes to
    /// itself.
    pub fn text(&self) -> String {
        if !self.normalized {
            return self.line.clone();
        }

        let mut parts: Vec<String> = Vec::new();
        if let Some(postcode) = &self.postcode {
            parts.push(postcode.clone());
        }
        if let Some(city) = &self.city {
            parts.push(city.clone());
        }
        if let Some(street) = &self.street {
            parts.push(format!("ул. {}", street));
        }
        if let Some(house) = &self.house {
            parts.push(format!("д. {}", house));
        }
        if let Some(apartment) = &self.apartment {
            parts.push(format!("кв. {}", apartment));
        }

        if parts.is_empty() {
            self.line.clone()
        } else {
            parts.join(", ")
        }
    }
}

/// Structured address returned by the carrier cleanup call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanAddress {
    pub postcode: String,
    pub region: Option<String>,
    pub place: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub room: Option<String>,
}

impl CleanAddress {
    /// Promote to a normalized `Address`
    pub fn into_address(self) -> Address {
        let mut address = Address {
            line: String::new(),
            city: self.place,
            postcode: Some(self.postcode),
            region: self.region,
            street: self.street,
            house: self.house,
            apartment: self.room,
            normalized: true,
        };
        address.line = address.text();
        address
    }
}

/// Tariff lookup request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffRequest {
    pub from_postcode: String,
    pub to_postcode: String,
    pub method: DeliveryMethod,
    pub mass_grams: u32,
}

/// Carrier tariff answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
    /// Total cost including VAT, in kopecks
    pub total_kopecks: u64,
    pub min_days: u32,
    pub max_days: u32,
}

/// Cost and duration for one address/method pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryQuote {
    pub method: DeliveryMethod,
    pub cost_kopecks: u64,
    pub min_days: u32,
    pub max_days: u32,
    /// Canonical text of the address the quote was computed for
    pub address_text: String,
}

impl DeliveryQuote {
    /// Cost rounded up to whole rubles
    pub fn cost_rubles(&self) -> u64 {
        self.cost_kopecks.div_ceil(100)
    }

    /// Whether this quote still describes `address` with `method`
    pub fn is_for(&self, address: &Address, method: DeliveryMethod) -> bool {
        address.normalized && self.method == method && self.address_text == address.text()
    }

    /// "3" or "3-5" days
    pub fn days_text(&self) -> String {
        if self.min_days == self.max_days {
            self.max_days.to_string()
        } else {
            format!("{}-{}", self.min_days, self.max_days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean() -> CleanAddress {
        CleanAddress {
            postcode: "101000".into(),
            region: Some("Москва".into()),
            place: Some("Москва".into()),
            street: Some("Мясницкая".into()),
            house: Some("1".into()),
            room: Some("2".into()),
        }
    }

    #[test]
    fn test_canonical_text() {
        let address = clean().into_address();
        assert!(address.normalized);
        assert_eq!(address.text(), "101000, Москва, ул. Мясницкая, д. 1, кв. 2");
        assert_eq!(address.line, address.text());
    }

    #[test]
    fn test_free_text_not_normalized() {
        let address = Address::from_free_text("ленина 5");
        assert!(!address.normalized);
        assert_eq!(address.text(), "ленина 5");
    }

    #[test]
    fn test_quote_bound_to_address() {
        let address = clean().into_address();
        let quote = DeliveryQuote {
            method: DeliveryMethod::Courier,
            cost_kopecks: 45_050,
            min_days: 2,
            max_days: 4,
            address_text: address.text(),
        };
        assert!(quote.is_for(&address, DeliveryMethod::Courier));
        assert!(!quote.is_for(&address, DeliveryMethod::Post));
        assert_eq!(quote.cost_rubles(), 451);
        assert_eq!(quote.days_text(), "2-4");

        let mut moved = address.clone();
        moved.house = Some("3".into());
        assert!(!quote.is_for(&moved, DeliveryMethod::Courier));
    }

    #[test]
    fn test_method_keys() {
        for method in DeliveryMethod::ALL {
            assert_eq!(DeliveryMethod::from_key(method.as_str()), Some(method));
        }
        assert_eq!(DeliveryMethod::from_key("drone"), None);
    }
}
