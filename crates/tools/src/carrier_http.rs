//! Postal carrier over HTTP
//!
//! Two endpoints of the carrier's shipping API:
//! - `POST /1.0/clean/address` turns free text into a structured address
//! - `POST /1.0/tariff` prices a parcel between two postcodes
//!
//! Requests carry the application token (`AccessToken` scheme) and the
//! user key (`X-User-Authorization: Basic ...`).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use voice_support_config::CarrierConfig;
use voice_support_core::{CarrierApi, CarrierError, CleanAddress, DeliveryMethod, Tariff, TariffRequest};

/// Quality codes the carrier can deliver to
const ACCEPTED_QUALITY: &[&str] = &["GOOD", "POSTAL_BOX", "ON_DEMAND", "UNDEF_05"];

#[derive(Serialize)]
struct CleanRequest<'a> {
    id: &'static str,
    #[serde(rename = "original-address")]
    original_address: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CleanResponse {
    #[serde(default)]
    quality_code: String,
    #[serde(default)]
    index: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    place: Option<String>,
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    house: Option<String>,
    #[serde(default)]
    room: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct TariffBody<'a> {
    index_from: &'a str,
    index_to: &'a str,
    mail_category: &'static str,
    mail_type: &'static str,
    mass: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TariffResponse {
    total_rate: u64,
    #[serde(default)]
    total_vat: u64,
    #[serde(default)]
    delivery_time: Option<DeliveryTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeliveryTime {
    #[serde(default)]
    min_days: Option<u32>,
    max_days: u32,
}

/// Carrier mail type per delivery method
fn mail_type(method: DeliveryMethod) -> &'static str {
    match method {
        DeliveryMethod::Courier => "ONLINE_COURIER",
        DeliveryMethod::Pickup => "ECOM",
        DeliveryMethod::Post => "POSTAL_PARCEL",
        DeliveryMethod::Express => "EMS",
    }
}

/// HTTP carrier transport
pub struct HttpCarrierApi {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    user_key: String,
}

impl HttpCarrierApi {
    pub fn new(config: &CarrierConfig) -> Result<Self, CarrierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| CarrierError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            user_key: config.user_key.clone(),
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R, CarrierError> {
        let response = self
            .client
            .post(format!("{}{}", self.endpoint, path))
            .header("Authorization", format!("AccessToken {}", self.access_token))
            .header("X-User-Authorization", format!("Basic {}", self.user_key))
            .header("Accept", "application/json;charset=UTF-8")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CarrierError::Timeout
                } else {
                    CarrierError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, message));
        }

        response
            .json()
            .await
            .map_err(|e| CarrierError::InvalidResponse(e.to_string()))
    }
}

fn classify_status(status: StatusCode, message: String) -> CarrierError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        CarrierError::RateLimited
    } else if status.is_server_error() {
        CarrierError::Server {
            status: status.as_u16(),
            message,
        }
    } else {
        CarrierError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

/// `None` unless the carrier is confident enough to deliver there
fn accept_clean(response: CleanResponse) -> Option<CleanAddress> {
    if !ACCEPTED_QUALITY.contains(&response.quality_code.as_str()) {
        tracing::debug!(quality = %response.quality_code, "Address quality not deliverable");
        return None;
    }
    let postcode = response.index.filter(|i| !i.is_empty())?;

    Some(CleanAddress {
        postcode,
        region: response.region,
        place: bare(response.place, &["г", "г.", "город"]),
        street: bare(response.street, &["ул", "ул.", "улица"]),
        house: bare(response.house, &["д", "д.", "дом"]),
        room: bare(response.room, &["кв", "кв.", "квартира"]),
    })
}

/// Drop the carrier's type prefix ("г Казань" -> "Казань")
fn bare(value: Option<String>, prefixes: &[&str]) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    let stripped = match trimmed.split_once(' ') {
        Some((head, rest)) if prefixes.contains(&head) => rest.trim(),
        _ => trimmed,
    };
    (!stripped.is_empty()).then(|| stripped.to_string())
}

#[async_trait]
impl CarrierApi for HttpCarrierApi {
    async fn clean_address(&self, free_text: &str) -> Result<Option<CleanAddress>, CarrierError> {
        let body = [CleanRequest {
            id: "adr-1",
            original_address: free_text,
        }];
        let results: Vec<CleanResponse> = self.post("/1.0/clean/address", &body).await?;

        Ok(results.into_iter().next().and_then(accept_clean))
    }

    async fn tariff(&self, request: &TariffRequest) -> Result<Tariff, CarrierError> {
        let body = TariffBody {
            index_from: &request.from_postcode,
            index_to: &request.to_postcode,
            mail_category: "ORDINARY",
            mail_type: mail_type(request.method),
            mass: request.mass_grams,
        };
        let response: TariffResponse = self.post("/1.0/tariff", &body).await?;

        let (min_days, max_days) = match response.delivery_time {
            Some(t) => (t.min_days.unwrap_or(t.max_days), t.max_days),
            None => {
                return Err(CarrierError::InvalidResponse(
                    "tariff without delivery-time".to_string(),
                ))
            }
        };

        Ok(Tariff {
            total_kopecks: response.total_rate + response.total_vat,
            min_days,
            max_days,
        })
    }
}
