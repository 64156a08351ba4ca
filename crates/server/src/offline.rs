//! Offline collaborators
//!
//! Deterministic stand-ins for the speech credential exchange and the postal
//! carrier, used when no credentials are configured. They let the whole
//! dialogue run locally, including address cleanup and tariff quotes.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use voice_support_core::{
    AccessToken, CarrierApi, CarrierError, CleanAddress, DeliveryMethod, SpeechError, Tariff,
    TariffRequest, TokenSource,
};

/// Issues local tokens valid for one hour
pub struct LocalTokenSource;

#[async_trait]
impl TokenSource for LocalTokenSource {
    async fn fetch(&self) -> Result<AccessToken, SpeechError> {
        Ok(AccessToken {
            value: format!("local-{}", uuid::Uuid::new_v4()),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }
}

/// Known cities: stem as spoken, canonical name, main post office, region
const CITIES: &[(&str, &str, &str, &str)] = &[
    ("москв", "Москва", "101000", "Москва"),
    ("петербург", "Санкт-Петербург", "190000", "Санкт-Петербург"),
    ("питер", "Санкт-Петербург", "190000", "Санкт-Петербург"),
    ("казан", "Казань", "420111", "Республика Татарстан"),
    ("новосибирск", "Новосибирск", "630099", "Новосибирская область"),
    ("екатеринбург", "Екатеринбург", "620014", "Свердловская область"),
    ("нижн", "Нижний Новгород", "603000", "Нижегородская область"),
];

static POSTCODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)([1-6]\d{5})(?:\D|$)").expect("postcode pattern"));

static STREET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bул\.|\bул\b|\bулиц[аеуы]\b)\s*([^,\d]+?)\s*(?:,|\bд\.|\bдом\b|\d|$)")
        .expect("street pattern")
});

static HOUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bд\.|\bдом\b)\s*(\d+[а-яё]?(?:/\d+)?)").expect("house pattern")
});

static ROOM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bкв\.|\bкв\b|\bквартир[аеуы]\b)\s*(\d+)").expect("room pattern")
});

/// Carrier simulation with a zone tariff table
///
/// Cleanup accepts an address with a postcode, or a known city together with
/// a street and a house. The canonical text of a cleaned address cleans to
/// the same address again.
#[derive(Debug, Clone)]
pub struct OfflineCarrier {
    /// Surcharge per zone between origin and destination, in kopecks
    zone_surcharge: u64,
}

impl OfflineCarrier {
    pub fn new() -> Self {
        Self {
            zone_surcharge: 5_000,
        }
    }

    fn base(method: DeliveryMethod) -> (u64, u32, u32) {
        match method {
            DeliveryMethod::Pickup => (25_000, 2, 4),
            DeliveryMethod::Post => (30_000, 3, 7),
            DeliveryMethod::Courier => (45_000, 1, 3),
            DeliveryMethod::Express => (90_000, 1, 1),
        }
    }
}

impl Default for OfflineCarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CarrierApi for OfflineCarrier {
    async fn clean_address(&self, free_text: &str) -> Result<Option<CleanAddress>, CarrierError> {
        Ok(clean(free_text))
    }

    async fn tariff(&self, request: &TariffRequest) -> Result<Tariff, CarrierError> {
        let from = zone(&request.from_postcode)?;
        let to = zone(&request.to_postcode)?;
        let distance = from.abs_diff(to);

        let (base, min_days, max_days) = Self::base(request.method);
        // Every started kilogram above the first
        let extra_kg = u64::from(request.mass_grams.saturating_sub(1) / 1000);
        let total_kopecks = base + u64::from(distance) * self.zone_surcharge + extra_kg * 2_000;

        let (min_days, max_days) = match request.method {
            DeliveryMethod::Express => (min_days, max_days + distance / 2),
            DeliveryMethod::Post => (min_days + 2 * distance, max_days + 2 * distance),
            _ => (min_days + distance, max_days + distance),
        };

        Ok(Tariff {
            total_kopecks,
            min_days,
            max_days,
        })
    }
}

fn zone(postcode: &str) -> Result<u32, CarrierError> {
    let valid = postcode.len() == 6 && postcode.chars().all(|c| c.is_ascii_digit());
    match postcode.chars().next().and_then(|c| c.to_digit(10)) {
        Some(zone) if valid => Ok(zone),
        _ => Err(CarrierError::Rejected {
            status: 400,
            message: format!("invalid postcode {:?}", postcode),
        }),
    }
}

fn clean(free_text: &str) -> Option<CleanAddress> {
    let lower = free_text.to_lowercase();
    let city = CITIES.iter().find(|(stem, ..)| lower.contains(stem));
    let postcode = POSTCODE.captures(free_text).map(|c| c[1].to_string());
    let street = STREET
        .captures(free_text)
        .map(|c| title_case(c[1].trim()))
        .filter(|s| !s.is_empty());
    let house = HOUSE.captures(free_text).map(|c| c[1].to_lowercase());
    let room = ROOM.captures(free_text).map(|c| c[1].to_string());

    let postcode = match (postcode, city) {
        (Some(postcode), _) => postcode,
        (None, Some((_, _, main_office, _))) if street.is_some() && house.is_some() => {
            main_office.to_string()
        }
        _ => return None,
    };

    Some(CleanAddress {
        postcode,
        region: city.map(|(_, _, _, region)| region.to_string()),
        place: city.map(|(_, name, ..)| name.to_string()),
        street,
        house,
        room,
    })
}

fn title_case(words: &str) -> String {
    words
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_spoken_address() {
        let carrier = OfflineCarrier::new();
        let clean = carrier
            .clean_address("москва улица мясницкая дом 1 квартира 5")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(clean.postcode, "101000");
        assert_eq!(clean.place.as_deref(), Some("Москва"));
        assert_eq!(clean.street.as_deref(), Some("Мясницкая"));
        assert_eq!(clean.house.as_deref(), Some("1"));
        assert_eq!(clean.room.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_canonical_text_cleans_to_itself() {
        let carrier = OfflineCarrier::new();
        let first = carrier
            .clean_address("казань ул. баумана д. 12")
            .await
            .unwrap()
            .unwrap()
            .into_address();
        let second = carrier
            .clean_address(&first.text())
            .await
            .unwrap()
            .unwrap()
            .into_address();

        assert_eq!(first.text(), "420111, Казань, ул. Баумана, д. 12");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_address_is_not_recognized() {
        let carrier = OfflineCarrier::new();
        assert_eq!(carrier.clean_address("где-то у реки").await.unwrap(), None);
        // Known city without a house is not deliverable
        assert_eq!(carrier.clean_address("москва улица тверская").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tariff_grows_with_distance() {
        let carrier = OfflineCarrier::new();
        let request = |to: &str| TariffRequest {
            from_postcode: "101000".into(),
            to_postcode: to.into(),
            method: DeliveryMethod::Courier,
            mass_grams: 1000,
        };

        let near = carrier.tariff(&request("101000")).await.unwrap();
        let far = carrier.tariff(&request("630099")).await.unwrap();
        assert_eq!(near.total_kopecks, 45_000);
        assert_eq!((near.min_days, near.max_days), (1, 3));
        assert_eq!(far.total_kopecks, 45_000 + 5 * 5_000);
        assert_eq!((far.min_days, far.max_days), (6, 8));
    }

    #[tokio::test]
    async fn test_invalid_postcode_is_rejected() {
        let carrier = OfflineCarrier::new();
        let result = carrier
            .tariff(&TariffRequest {
                from_postcode: "101000".into(),
                to_postcode: "abc".into(),
                method: DeliveryMethod::Post,
                mass_grams: 500,
            })
            .await;
        assert!(matches!(result, Err(CarrierError::Rejected { status: 400, .. })));
    }
}
